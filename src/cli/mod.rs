//! CLI module for medroute
//!
//! Provides command-line interface parsing for the medroute binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// medroute - multi-agent concierge for doctor appointments and lab tests
#[derive(Parser, Debug)]
#[command(
    name = "medroute",
    version,
    about = "Multi-agent concierge for doctor appointments and lab tests",
    after_help = "EXAMPLES:\n    \
                  medroute ask --patient 1000082 \"Is Dr. Sarah Wilson free on 18-12-2024?\"\n    \
                  medroute ask --patient 1000082 --json \"Book a lipid panel\"\n    \
                  medroute memory --patient 1000082\n    \
                  medroute config --validate"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "medroute.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one patient turn through the agent hierarchy
    Ask {
        /// Patient identifier the turn acts for
        #[arg(short, long)]
        patient: i64,

        /// Print the full message log as JSON
        #[arg(long)]
        json: bool,

        /// The patient's message
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Show the stored memory for a patient
    Memory {
        /// Patient identifier
        #[arg(short, long)]
        patient: i64,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask_joins_words() {
        let cli = Cli::parse_from(["medroute", "ask", "--patient", "42", "book", "dr", "wilson"]);
        match cli.command {
            Commands::Ask {
                patient,
                json,
                message,
            } => {
                assert_eq!(patient, 42);
                assert!(!json);
                assert_eq!(message.join(" "), "book dr wilson");
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.config, PathBuf::from("medroute.toml"));
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::parse_from([
            "medroute",
            "memory",
            "--patient",
            "7",
            "--config",
            "other.toml",
            "--no-color",
        ]);
        assert!(cli.no_color);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert!(matches!(cli.command, Commands::Memory { patient: 7 }));
    }

    #[test]
    fn test_ask_requires_message() {
        assert!(Cli::try_parse_from(["medroute", "ask", "--patient", "1"]).is_err());
    }
}
