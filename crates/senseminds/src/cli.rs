//! Clap derive structures for the `senseminds` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// senseminds -- terminal client for the SenseMinds 360 realtime stream
#[derive(Debug, Parser)]
#[command(
    name = "senseminds",
    version,
    about = "Watch SenseMinds 360 sensor, ML and alert events from the command line",
    long_about = "Connects to a SenseMinds 360 deployment over Socket.IO and streams its\n\
        realtime events. When the live channel cannot be established the client\n\
        falls back to polling the REST API on a fixed interval.",
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
    /// Deployment profile to use
    #[arg(long, short = 'p', env = "SENSEMINDS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Realtime server URL (overrides profile and SENSEMINDS_REALTIME_URL)
    #[arg(long, short = 'u', global = true)]
    pub realtime_url: Option<String>,

    /// REST API root (overrides profile and SENSEMINDS_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SENSEMINDS_OUTPUT",
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
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines and tables (default)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON (one event per line when streaming)
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
    /// Stream realtime events until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Connect, report connection diagnostics, and exit
    Status(StatusArgs),

    /// Run one REST poll cycle and print what it returned
    Poll,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch / Status ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this long (e.g. "90s", "5m"); runs until Ctrl-C otherwise
    #[arg(long, short = 'd', value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Only show these event kinds (comma-separated, e.g. new_alert,sensor_update)
    #[arg(long = "event", short = 'e', value_delimiter = ',')]
    pub events: Vec<String>,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// How long to wait for the connection to settle
    #[arg(long, short = 'w', default_value = "30s", value_parser = humantime::parse_duration)]
    pub wait: Duration,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Create or replace a profile
    Init(InitArgs),

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Profile name
    #[arg(long, short = 'n', default_value = "default")]
    pub name: String,

    /// Realtime server URL for this profile
    #[arg(long = "url", required = true)]
    pub realtime_url: String,

    /// REST API root (defaults to <url>/api/v1)
    #[arg(long = "api")]
    pub api_url: Option<String>,

    /// Room to join after connecting
    #[arg(long)]
    pub room: Option<String>,

    /// Replace an existing profile with the same name
    #[arg(long, short = 'f')]
    pub force: bool,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
