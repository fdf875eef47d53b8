//! Command-line interface definitions using clap
//!
//! This module defines the CLI structure for micro-geoip using clap's derive macros.

use clap::{Parser, Subcommand};

/// micro-geoip - IP to country lookups backed by a self-updating MaxMind DB
#[derive(Parser)]
#[command(name = "micro-geoip")]
#[command(version)]
#[command(about = "IP to country lookups backed by a self-updating MaxMind DB", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Load the database, keep it updated and wait for Ctrl+C (default)
    ///
    /// On Unix, SIGUSR1 triggers an immediate update.
    Serve,

    /// Download the database once and exit
    Update,

    /// Look up the country of one or more IP addresses
    Lookup {
        /// IPv4 or IPv6 addresses
        #[arg(required = true)]
        ips: Vec<String>,

        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
