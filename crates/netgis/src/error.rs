//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use netgis_config::ConfigError;
use netgis_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to GIS service at {url}")]
    #[diagnostic(
        code(netgis::connection_failed),
        help(
            "Check that the service is reachable.\n\
             URL: {url}\n\
             Self-signed staging server? Try: netgis regions list --insecure"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Geometry validation is unavailable: {message}")]
    #[diagnostic(
        code(netgis::validation_unavailable),
        help("The validator did not answer. Nothing was saved; try again shortly.")
    )]
    ValidationUnavailable { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(netgis::auth_failed),
        help(
            "Verify your API token.\n\
             Run: netgis config set-token --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    #[error("No API token configured for profile '{profile}'")]
    #[diagnostic(
        code(netgis::no_credentials),
        help(
            "Configure a token with: netgis config init\n\
             Or set the NETGIS_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    #[error("Not allowed to {action} on layer {layer}")]
    #[diagnostic(
        code(netgis::permission_denied),
        help("Run: netgis layers permissions to see what this account may change")
    )]
    PermissionDenied { layer: String, action: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(netgis::not_found),
        help("Run: netgis {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Geometry ─────────────────────────────────────────────────────
    #[error("Geometry intersects {rings} existing feature(s)")]
    #[diagnostic(
        code(netgis::geometry_rejected),
        help("Move the geometry off the overlapping features and validate again.")
    )]
    GeometryRejected { rings: usize },

    #[error("Geometry is outside its boundary: {message}")]
    #[diagnostic(code(netgis::outside_boundary))]
    OutsideBoundary { message: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    #[diagnostic(code(netgis::api_error))]
    ApiError { status: Option<u16>, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(netgis::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(netgis::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: netgis config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No GIS service configured")]
    #[diagnostic(
        code(netgis::no_config),
        help(
            "Create a profile with: netgis config init\n\
             Or pass --server and --token.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(netgis::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(netgis::timeout),
        help("Increase timeout with --timeout or check service responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(netgis::json), help("Check the geometry JSON and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::ValidationUnavailable { .. } => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::PermissionDenied { .. } => exit_code::PERMISSION,
            Self::GeometryRejected { .. } | Self::OutsideBoundary { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { message: _ } => Self::AuthFailed {
                profile: "current".into(),
            },

            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },

            CoreError::FetchFailed { layer, message } => Self::ApiError {
                status: None,
                message: format!("fetching {layer} failed: {message}"),
            },

            CoreError::GeometryRejected { rings } => Self::GeometryRejected { rings },

            CoreError::OutsideBoundary { message } => Self::OutsideBoundary { message },

            CoreError::ValidationUnavailable { message } => {
                Self::ValidationUnavailable { message }
            }

            CoreError::FormFieldErrors(errors) => Self::Validation {
                field: errors
                    .iter()
                    .map(|e| e.field.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                reason: errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            },

            e @ (CoreError::StaleInteraction
            | CoreError::InvalidTransition { .. }
            | CoreError::IncompleteGeometry { .. }
            | CoreError::GeometryShapeMismatch { .. }) => Self::Validation {
                field: "geometry".into(),
                reason: e.to_string(),
            },

            CoreError::UnknownLayer { layer } => Self::NotFound {
                resource_type: "layer".into(),
                identifier: layer,
                list_command: "layers list".into(),
            },

            CoreError::PermissionDenied { layer, action } => {
                Self::PermissionDenied { layer, action }
            }

            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                list_command: format!("fetch {entity_type}"),
                resource_type: entity_type,
                identifier,
            },

            CoreError::Api { message, status } => Self::ApiError { status, message },

            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_rejection_is_a_conflict() {
        let err = CliError::from(CoreError::GeometryRejected { rings: 2 });
        assert_eq!(err.exit_code(), exit_code::CONFLICT);
        assert_eq!(err.to_string(), "Geometry intersects 2 existing feature(s)");
    }

    #[test]
    fn unknown_layer_points_at_layer_list() {
        let err = CliError::from(CoreError::UnknownLayer {
            layer: "p_olt".into(),
        });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert!(matches!(err, CliError::NotFound { ref list_command, .. } if list_command == "layers list"));
    }

    #[test]
    fn api_status_is_shown_when_known() {
        let err = CliError::from(CoreError::Api {
            message: "boom".into(),
            status: Some(502),
        });
        assert_eq!(err.to_string(), "API error (502): boom");
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn missing_token_maps_to_auth_exit_code() {
        let err = CliError::from(ConfigError::NoCredentials {
            profile: "default".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
