//! Clap derive structures for the `inspectctl` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// inspectctl -- drive a print-inspection node from the command line
#[derive(Debug, Parser)]
#[command(
    name = "inspectctl",
    version,
    about = "Drive print-inspection nodes from the command line",
    long_about = "Log in to an inspection node, switch it between editing and running,\n\
        load jobs, fetch inspection reports and watch its event stream.",
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
    /// Node profile to use
    #[arg(long, short = 'p', env = "INSPECT_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Station host (overrides profile)
    #[arg(long, short = 'H', env = "INSPECT_HOST", global = true)]
    pub host: Option<String>,

    /// Station system port
    #[arg(long, env = "INSPECT_PORT", global = true)]
    pub port: Option<u16>,

    /// Node index on the station
    #[arg(long, short = 'n', env = "INSPECT_NODE", global = true)]
    pub node: Option<u16>,

    /// Login user
    #[arg(long, short = 'u', env = "INSPECT_USERNAME", global = true, hide_env = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "INSPECT_OUTPUT",
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

    /// Request timeout ("30s", "2m")
    #[arg(long, env = "INSPECT_TIMEOUT", global = true)]
    pub timeout: Option<humantime::Duration>,
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
    /// Show node identity, state and loaded job
    #[command(alias = "st")]
    Status,

    /// List jobs stored on the node
    Jobs,

    /// Replace the loaded job
    Load {
        /// Job name as listed by `jobs`
        job: String,
    },

    /// Stop the running job and wait for editing
    Edit,

    /// Start the loaded job and wait for running
    Run,

    /// Inspect (when editing) and print a repeat's report
    Report(ReportArgs),

    /// Stream node events until interrupted
    Watch(WatchArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Repeat number (default: newest)
    pub repeat: Option<u32>,

    /// Write the repeat image (BMP) to this path
    #[arg(long)]
    pub image: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many events
    #[arg(long, short = 'c')]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration file path
    Path,
    /// Print the effective configuration (passwords redacted)
    Show,
    /// Store a profile's password in the system keyring
    SetPassword,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
