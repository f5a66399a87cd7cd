//! CLI module for Edge Copilot.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Edge Copilot - streaming chat-agent server
///
/// Serves an AI chat agent over HTTP with tool calling, human-in-the-loop
/// tool confirmation, and SSE response streaming.
#[derive(Parser, Debug)]
#[command(name = "edgecopilot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP chat-agent server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "model.max_steps")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Show configuration file path
    Path,
}
