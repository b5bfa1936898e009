//! Clap derive structures for the `bluesync` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// bluesync -- live Bluetooth device management from the command line
#[derive(Debug, Parser)]
#[command(
    name = "bluesync",
    version,
    about = "Manage Bluetooth devices through a Bluetooth manager backend",
    long_about = "Talks to a Bluetooth manager backend over REST and its push channel.\n\n\
        Scan for nearby devices, pair and connect them, and watch the paired\n\
        set change live.",
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
    /// Backend profile to use
    #[arg(long, short = 'p', env = "BLUESYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Backend base URL, including any proxy path prefix (overrides profile)
    #[arg(long, short = 's', env = "BLUESYNC_SERVER", global = true)]
    pub server: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "BLUESYNC_OUTPUT",
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
    #[arg(long, short = 'k', env = "BLUESYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "BLUESYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
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
    /// Follow live device changes until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// List paired devices
    #[command(alias = "ls")]
    Devices,

    /// Run a discovery scan and list what was found
    Scan(ScanArgs),

    /// Pair, trust and connect a device
    Pair(MacArgs),

    /// Connect a paired device
    Connect(MacArgs),

    /// Disconnect a device
    Disconnect(MacArgs),

    /// Remove (unpair) a device
    #[command(alias = "rm")]
    Remove(MacArgs),

    /// Mark a device as trusted
    Trust(MacArgs),

    /// Revoke trust for a device
    Untrust(MacArgs),

    /// Show full details for a device
    Info(MacArgs),

    /// Switch the adapter on or off
    Power(PowerArgs),

    /// Show the adapter state
    Adapter,

    /// Check backend health
    Health,

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Command arguments ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MacArgs {
    /// Device MAC address (AA:BB:CC:DD:EE:FF, '-' separators accepted)
    pub mac: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Start a scan session on launch
    #[arg(long)]
    pub scan: bool,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Only list devices whose name looks like audio equipment
    #[arg(long)]
    pub audio_only: bool,

    /// Scan duration in seconds (overrides profile)
    #[arg(long, short = 'd')]
    pub duration: Option<u64>,
}

#[derive(Debug, Args)]
pub struct PowerArgs {
    #[arg(value_enum)]
    pub state: PowerState,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PowerState {
    On,
    Off,
    Toggle,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create the config file with a default profile for --server
    /// (prompted when omitted)
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Display the loaded configuration
    Show,

    /// Print the config file path
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
