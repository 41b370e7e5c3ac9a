//! Shared helpers for command handlers.

use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use netgis_core::{ElementStatus, RawCoordinates};

use crate::error::CliError;

pub fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.into()
}

/// `value`, or `-` when empty.
pub fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".into()
    } else {
        value.into()
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Spinner on stderr while a request runs; hidden in quiet mode.
pub fn spinner(message: String, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Parse status codes given on the command line (`P`, `IP`, `RFS`, `IA`).
pub fn parse_statuses(codes: &[String]) -> Result<Vec<ElementStatus>, CliError> {
    codes
        .iter()
        .map(|code| match ElementStatus::from_code(code) {
            ElementStatus::Unknown => Err(CliError::Validation {
                field: "status".into(),
                reason: format!("unknown status '{code}', expected P, IP, RFS or IA"),
            }),
            status => Ok(status),
        })
        .collect()
}

/// Geometry JSON from `--geometry` or `--from-file`.
pub fn read_geometry(inline: Option<&str>, file: Option<&Path>) -> Result<RawCoordinates, CliError> {
    let contents = match (inline, file) {
        (Some(json), _) => json.to_owned(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => {
            return Err(CliError::Validation {
                field: "geometry".into(),
                reason: "pass --geometry or --from-file".into(),
            });
        }
    };
    Ok(serde_json::from_str(&contents)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn statuses_accept_known_codes_only() {
        let ok = parse_statuses(&["p".into(), "RFS".into()]).unwrap();
        assert_eq!(
            ok,
            vec![ElementStatus::Planned, ElementStatus::ReadyForService]
        );
        assert!(parse_statuses(&["done".into()]).is_err());
    }

    #[test]
    fn inline_geometry_is_parsed() {
        let raw = read_geometry(Some("[[77.0, 12.0], [77.1, 12.1]]"), None).unwrap();
        assert_eq!(raw, RawCoordinates::Path(vec![[77.0, 12.0], [77.1, 12.1]]));
    }

    #[test]
    fn geometry_is_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("point.json");
        std::fs::write(&path, "[77.5, 12.9]").unwrap();
        let raw = read_geometry(None, Some(&path)).unwrap();
        assert_eq!(raw, RawCoordinates::Point([77.5, 12.9]));
    }

    #[test]
    fn geometry_is_required() {
        assert!(matches!(
            read_geometry(None, None),
            Err(CliError::Validation { .. })
        ));
    }
}
