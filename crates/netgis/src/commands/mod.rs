//! Command dispatch: bridges CLI args -> map session -> output formatting.

pub mod config_cmd;
pub mod fetch;
pub mod layers;
pub mod regions;
pub mod util;
pub mod validate;

use std::sync::Arc;

use netgis_core::{LayerRegistry, MapSession};

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Open a map session for the active profile and flag overrides.
pub fn open_session(
    global: &GlobalOpts,
    registry: Arc<LayerRegistry>,
) -> Result<MapSession, CliError> {
    let session_config = config::resolve_session_config(global)?;
    Ok(MapSession::new(session_config, registry)?)
}

/// Dispatch a service-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    session: &MapSession,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Regions(args) => regions::handle(session, args, global).await,
        Command::Fetch(args) => fetch::handle(session, args, global).await,
        Command::Validate(args) => validate::handle(session, args, global).await,
        // Layers, Config and Completions are handled before dispatch
        Command::Layers(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
