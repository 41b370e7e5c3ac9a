//! Clap derive structures for the `netgis` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// netgis -- headless map session for GIS network assets
#[derive(Debug, Parser)]
#[command(
    name = "netgis",
    version,
    about = "Browse and validate GIS network assets from the command line",
    long_about = "Runs a headless map session against a GIS service.\n\n\
        Lists layers and regions, fetches a layer into a viewport the way a\n\
        map would, and checks geometries with the remote validator.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Service profile to use
    #[arg(long, short = 'p', env = "NETGIS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Service URL (overrides profile)
    #[arg(long, short = 's', env = "NETGIS_SERVER", global = true)]
    pub server: Option<String>,

    /// API token
    #[arg(long, env = "NETGIS_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Region ids to scope fetches and validation to (comma-separated)
    #[arg(long, short = 'r', env = "NETGIS_REGIONS", value_delimiter = ',', global = true)]
    pub regions: Vec<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "NETGIS_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "NETGIS_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "NETGIS_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Largest layer kept inline; bigger layers are filtered to the viewport
    #[arg(long, global = true)]
    pub cache_threshold: Option<usize>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect asset layers
    #[command(alias = "l")]
    Layers(LayersArgs),

    /// Inspect regions
    #[command(alias = "rg")]
    Regions(RegionsArgs),

    /// Fetch a layer and show the elements a map would display
    #[command(alias = "f")]
    Fetch(FetchArgs),

    /// Check a geometry with the remote validator
    Validate(ValidateArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Layers ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LayersArgs {
    #[command(subcommand)]
    pub command: LayersCommand,
}

#[derive(Debug, Subcommand)]
pub enum LayersCommand {
    /// List known layers
    #[command(alias = "ls")]
    List,

    /// Show a layer's geometry kind, topology and form
    Show {
        /// Layer key (e.g. p_dp)
        layer: String,
    },

    /// Show add/edit permissions granted by the service
    Permissions,
}

// ── Regions ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RegionsArgs {
    #[command(subcommand)]
    pub command: RegionsCommand,
}

#[derive(Debug, Subcommand)]
pub enum RegionsCommand {
    /// List regions known to the service
    #[command(alias = "ls")]
    List,

    /// Show one region
    Show {
        /// Region id
        id: u64,
    },
}

// ── Fetch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Layer key (e.g. p_dp)
    pub layer: String,

    /// Viewport as south,west,north,east in degrees
    #[arg(long, short = 'b', value_parser = parse_bbox, allow_hyphen_values = true)]
    pub bbox: Option<[f64; 4]>,

    /// Zoom level of the viewport
    #[arg(long, short = 'z', default_value = "15")]
    pub zoom: f64,

    /// Only show elements with these status codes (P, IP, RFS, IA)
    #[arg(long, value_delimiter = ',')]
    pub status: Vec<String>,
}

fn parse_bbox(raw: &str) -> Result<[f64; 4], String> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("'{p}': {e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        &[south, west, north, east] if south < north && west < east => {
            Ok([south, west, north, east])
        }
        [_, _, _, _] => Err("expected south < north and west < east".into()),
        _ => Err("expected four comma-separated numbers: south,west,north,east".into()),
    }
}

// ── Validate ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Layer key (e.g. p_cable)
    pub layer: String,

    /// Geometry as JSON `[lng, lat]` coordinates in server order
    #[arg(long, short = 'g', conflicts_with = "from_file", allow_hyphen_values = true)]
    pub geometry: Option<String>,

    /// Read the geometry JSON from a file
    #[arg(long, short = 'F')]
    pub from_file: Option<PathBuf>,

    /// Id of the element being moved (omit for a new element)
    #[arg(long)]
    pub element_id: Option<u64>,

    /// Validate against a ticket's work area instead of the regions
    #[arg(long, short = 't')]
    pub ticket: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Set a configuration value on the active profile
    Set {
        /// Config key (server, regions, token_env, ca_cert, insecure, timeout, cache_threshold)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store an API token in the system keyring
    SetToken {
        /// Profile to store the token for (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bbox_parses_four_ordered_numbers() {
        assert_eq!(
            parse_bbox("11.9, 76.9,12.1,77.1").unwrap(),
            [11.9, 76.9, 12.1, 77.1]
        );
        assert!(parse_bbox("12.1,76.9,11.9,77.1").is_err());
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
    }

    #[test]
    fn regions_split_on_commas() {
        let cli = Cli::try_parse_from(["netgis", "--regions", "1,2,3", "layers", "list"]).unwrap();
        assert_eq!(cli.global.regions, vec![1, 2, 3]);
    }
}
