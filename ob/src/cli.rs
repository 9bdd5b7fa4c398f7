//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::service::BREAKDOWN_FEATURE;

/// ob - break text into actionable steps, in the cloud or on-device
#[derive(Parser)]
#[command(
    name = "ob",
    about = "Consent-gated AI breakdowns with on-device fallback",
    version,
    after_help = "Logs are written to: ~/.local/share/offload/logs/ob.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Break text into steps
    Breakdown {
        /// Text to break down
        text: String,

        /// How finely to split the text
        #[arg(short, long, default_value = "2")]
        granularity: u32,

        /// Context hint passed to the generator (repeatable)
        #[arg(long = "hint", value_name = "HINT")]
        hints: Vec<String>,

        /// Template ID passed to the generator (repeatable)
        #[arg(long = "template", value_name = "ID")]
        templates: Vec<String>,

        /// Allow cloud AI for this call, overriding config
        #[arg(long, conflicts_with = "no_cloud")]
        cloud: bool,

        /// Forbid cloud AI for this call, overriding config
        #[arg(long)]
        no_cloud: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Reconcile local usage with the server
    Reconcile {
        /// Feature to reconcile
        #[arg(long, default_value = BREAKDOWN_FEATURE)]
        feature: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Create an anonymous session
    Session,

    /// Show local usage counters
    Usage {
        /// Feature to show
        #[arg(long, default_value = BREAKDOWN_FEATURE)]
        feature: String,
    },

    /// Check backend health
    Health,
}

impl Command {
    /// Resolve the per-call consent override, if any
    pub fn cloud_override(&self) -> Option<bool> {
        match self {
            Command::Breakdown { cloud: true, .. } => Some(true),
            Command::Breakdown { no_cloud: true, .. } => Some(false),
            _ => None,
        }
    }
}

/// Output format for breakdown/reconcile commands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}
