//! CLI interface using clap.
//!
//! Provides the server entry point and maintenance commands that work on
//! the same store as the server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::OutputFormat;

/// Cookie Relay - Sync browser cookie snapshots per user and domain.
///
/// Run `serve` for the HTTP API used by the extension; the other commands
/// inspect or repair the store directly.
#[derive(Parser, Debug)]
#[command(name = "cookie-relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format: table or json.
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,

    /// Configuration file (defaults to ~/.cookie-relay/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API.
    Serve {
        /// Listen address, overriding the config file.
        #[arg(short, long)]
        bind: Option<String>,

        /// Keep records in memory only.
        #[arg(long)]
        in_memory: bool,
    },

    /// Push a local storage snapshot (JSON file) for a user.
    Sync {
        /// Owner user id.
        #[arg(short, long)]
        user: String,

        /// Path to a JSON object of domain -> cached payload.
        #[arg(short, long)]
        snapshot: PathBuf,
    },

    /// List a user's saved domains.
    Domains {
        /// Owner user id.
        #[arg(short, long)]
        user: String,
    },

    /// Show cookie statistics for a user.
    Stats {
        /// Owner user id.
        #[arg(short, long)]
        user: String,
    },

    /// Reconcile the domain index with stored records.
    Sweep {
        /// Limit the sweep to one user.
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Write a commented default configuration file.
    InitConfig,
}

impl Cli {
    /// Parse the output format argument.
    pub fn output_format(&self) -> Result<OutputFormat, String> {
        self.format.parse()
    }

    /// Whether the command runs the long-lived server.
    #[must_use]
    pub const fn is_server(&self) -> bool {
        matches!(self.command, Commands::Serve { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::parse_from(["cookie-relay", "-v", "serve", "--bind", "127.0.0.1:9000", "--in-memory"]);
        assert!(cli.is_server());
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Serve { bind, in_memory } => {
                assert_eq!(bind.as_deref(), Some("127.0.0.1:9000"));
                assert!(in_memory);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_sync_with_global_flags() {
        let cli = Cli::parse_from([
            "cookie-relay",
            "sync",
            "--user",
            "u1",
            "--snapshot",
            "dump.json",
            "--format",
            "json",
        ]);
        assert_eq!(cli.output_format(), Ok(OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Sync { ref user, .. } if user == "u1"));
    }

    #[test]
    fn test_sweep_user_optional() {
        let cli = Cli::parse_from(["cookie-relay", "sweep"]);
        assert!(matches!(cli.command, Commands::Sweep { user: None }));
    }
}
