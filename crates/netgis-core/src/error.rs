// ── Core error types ──
//
// Domain errors from netgis-core. Consumers see what went wrong with the
// map workflow, not HTTP details; the `From<netgis_api::Error>` impl
// translates transport failures into these variants.

use thiserror::Error;

use crate::model::FeatureType;
use crate::registry::FormFieldError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach GIS service at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("GIS service timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Fetch errors ─────────────────────────────────────────────────
    #[error("Fetching layer {layer} failed: {message}")]
    FetchFailed { layer: String, message: String },

    // ── Validation errors ────────────────────────────────────────────
    #[error("Geometry intersects {rings} existing feature(s)")]
    GeometryRejected { rings: usize },

    #[error("Geometry is outside its boundary: {message}")]
    OutsideBoundary { message: String },

    #[error("Geometry validation is unavailable, try again: {message}")]
    ValidationUnavailable { message: String },

    #[error("Form rejected: {} field error(s)", .0.len())]
    FormFieldErrors(Vec<FormFieldError>),

    #[error("Interaction changed while a request was in flight")]
    StaleInteraction,

    // ── State machine errors ─────────────────────────────────────────
    #[error("Cannot {action} while {state}")]
    InvalidTransition { action: String, state: String },

    #[error("{feature_type} needs at least {required} vertices, got {actual}")]
    IncompleteGeometry {
        feature_type: FeatureType,
        required: usize,
        actual: usize,
    },

    #[error("Expected {expected} geometry, server sent a {found}")]
    GeometryShapeMismatch {
        expected: FeatureType,
        found: String,
    },

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Unknown layer: {layer}")]
    UnknownLayer { layer: String },

    #[error("Not allowed to {action} on layer {layer}")]
    PermissionDenied { layer: String, action: String },

    #[error("Not found: {entity_type} {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Whether the user can reasonably just try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
                | Self::ValidationUnavailable { .. }
                | Self::FetchFailed { .. }
        ) || matches!(self, Self::Api { status: Some(s), .. } if *s >= 500)
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<netgis_api::Error> for CoreError {
    fn from(err: netgis_api::Error) -> Self {
        match err {
            netgis_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            netgis_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            netgis_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            netgis_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            netgis_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            netgis_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            netgis_api::Error::NotFound { path } => CoreError::NotFound {
                entity_type: "resource".into(),
                identifier: path,
            },
            netgis_api::Error::FieldErrors(fields) => CoreError::FormFieldErrors(
                fields
                    .into_iter()
                    .map(|f| FormFieldError {
                        field: f.field,
                        message: f.message,
                    })
                    .collect(),
            ),
            netgis_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("Deserialization error: {message}"),
                status: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_survive_conversion() {
        let api = netgis_api::Error::FieldErrors(vec![netgis_api::FieldError {
            field: "name".into(),
            message: "required".into(),
        }]);
        match CoreError::from(api) {
            CoreError::FormFieldErrors(f) => assert_eq!(f[0].field, "name"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn server_errors_are_retryable() {
        let e = CoreError::from(netgis_api::Error::Api {
            status: 503,
            message: "down".into(),
        });
        assert!(e.is_retryable());
        assert!(!CoreError::StaleInteraction.is_retryable());
    }
}
