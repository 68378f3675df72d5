//! CLI argument definitions
//!
//! All Clap derive structs for `signclash` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Two-player sign-clash match server.
#[derive(Parser, Debug)]
#[command(name = "signclash", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "SIGNCLASH_COLOR")]
    pub color: ColorChoice,
}

impl Cli {
    /// Log format requested by the subcommand, if it takes one.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        match &self.command {
            Commands::Serve(args) => args.log_format,
            _ => LogFormat::Human,
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the match server.
    Serve(ServeArgs),

    /// Validate configuration files without starting the server.
    Validate(ValidateArgs),

    /// Print the sign ring and what each sign beats.
    Signs(SignsArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Arguments for `serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, env = "SIGNCLASH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen on `[host:]port`, overriding `server.bind`.
    #[arg(long, env = "SIGNCLASH_BIND")]
    pub bind: Option<String>,

    /// Write the JSONL audit trail here (`-` for stderr).
    #[arg(long, env = "SIGNCLASH_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "SIGNCLASH_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Log output format.
    #[arg(long, default_value = "human", env = "SIGNCLASH_LOG_FORMAT")]
    pub log_format: LogFormat,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `signs`.
#[derive(Args, Debug)]
pub struct SignsArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}
