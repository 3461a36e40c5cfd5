//! Clap derive structures for the `htfleet` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// htfleet -- command-line client for the homething fleet manager
#[derive(Debug, Parser)]
#[command(
    name = "htfleet",
    version,
    about = "Manage a homething device fleet from the command line",
    long_about = "A CLI for the homething fleet manager.\n\n\
        Lists and inspects devices, edits profiles, triggers firmware\n\
        updates and restarts, and streams live telemetry over the\n\
        manager's push WebSocket.",
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
    /// Fleet manager URL (e.g. http://fleet.local:8080)
    #[arg(long, short = 's', env = "HTFLEET_SERVER", global = true)]
    pub server: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HTFLEET_OUTPUT",
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
    #[arg(long, short = 'k', env = "HTFLEET_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "HTFLEET_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,
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
    /// Inspect and manage fleet devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Stream live directory changes and device telemetry
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List all devices in the fleet
    #[command(alias = "ls")]
    List,

    /// Show one device's record
    Get {
        /// Device id
        device: String,
    },

    /// Show device diagnostics (uptime, heap, task stacks)
    Diag {
        /// Device id
        device: String,
    },

    /// Show the device's free-form status line
    Status {
        /// Device id
        device: String,
    },

    /// Show or replace the device's configuration profile
    Profile(ProfileArgs),

    /// Show the topics a device publishes and subscribes to
    Topics {
        /// Device id
        device: String,

        /// Include the last published value for each topic
        #[arg(long)]
        values: bool,
    },

    /// List firmware versions available for a device
    Versions {
        /// Device id
        device: String,
    },

    /// Restart a device
    #[command(alias = "restart")]
    Reboot {
        /// Device id
        device: String,
    },

    /// Update a device's firmware
    Update {
        /// Device id
        device: String,

        /// Target firmware version
        // "version" as an arg name collides with the --version flag
        // propagated from the top-level command.
        #[arg(value_name = "VERSION")]
        firmware_version: String,
    },

    /// Remove a device from the fleet directory
    #[command(alias = "rm")]
    Delete {
        /// Device id
        device: String,
    },
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Print the device's profile text
    Get {
        /// Device id
        device: String,
    },

    /// Replace the device's profile
    Set {
        /// Device id
        device: String,

        /// Read the new profile from this file instead of stdin
        #[arg(long, short = 'f')]
        file: Option<std::path::PathBuf>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Follow one device's telemetry instead of the whole directory
    #[arg(long, short = 'd')]
    pub device: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the resolved configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Write a starter configuration file
    Init {
        /// Fleet manager URL to store
        #[arg(long)]
        server: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
