//! CLI configuration: thin wrapper around `netgis_config` shared types.
//!
//! Re-exports the shared types and layers `GlobalOpts` flag overrides
//! (--server, --token, --regions, ...) over the active profile.

use secrecy::SecretString;

use netgis_config::ConfigError;
use netgis_core::SessionConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use netgis_config::{
    Config, Profile, config_path, load_config_or_default, save_config, store_token,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-separated profile names, or `(none)`.
pub fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        "(none)".into()
    } else {
        config.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Build the session configuration from the config file, the active
/// profile and CLI flag overrides.
///
/// Without a matching profile the flags alone must name a server; an
/// explicitly requested profile that does not exist is an error.
pub fn resolve_session_config(global: &GlobalOpts) -> Result<SessionConfig, CliError> {
    let cfg = load_config_or_default();
    let (profile_name, base) = match cfg.profile(global.profile.as_deref()) {
        Ok((name, profile)) => (name.to_owned(), profile.clone()),
        Err(ConfigError::UnknownProfile { name }) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name,
                available: available_profiles(&cfg),
            });
        }
        Err(_) => {
            if global.server.is_none() {
                return Err(CliError::NoConfig {
                    path: config_path().display().to_string(),
                });
            }
            (active_profile_name(global, &cfg), Profile::default())
        }
    };

    let profile = apply_overrides(base, global);
    let mut session = netgis_config::profile_to_session_config(&profile, &profile_name, &cfg.defaults)?;

    // A token on the command line beats the keyring.
    if let Some(ref token) = global.token {
        session.token = Some(SecretString::from(token.clone()));
    }
    Ok(session)
}

/// Profile with CLI flags taking priority over its values.
fn apply_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref server) = global.server {
        profile.server.clone_from(server);
    }
    if let Some(ref token) = global.token {
        profile.token = Some(token.clone());
    }
    if !global.regions.is_empty() {
        profile.regions.clone_from(&global.regions);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    if let Some(threshold) = global.cache_threshold {
        profile.cache_threshold = Some(threshold);
    }
    profile
}
