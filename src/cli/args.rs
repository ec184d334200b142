//! Command-line argument parsing
//!
//! Clap-based CLI with subcommands mirroring the service surface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// answerdesk - multi-domain knowledge assistant
#[derive(Parser, Debug)]
#[command(name = "answerdesk")]
#[command(version = "0.3.0")]
#[command(about = "Ask questions over per-category document knowledge bases", long_about = None)]
pub struct Args {
    /// Owner id operations act on behalf of
    #[arg(short, long, default_value = "default")]
    pub owner: String,

    /// Verbosity level: -v (debug), -vv (trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a document into a category
    Upload {
        /// File to upload (txt, md, csv)
        file: PathBuf,

        /// Category to file it under (created if unknown)
        #[arg(short, long)]
        category: String,
    },

    /// Ask a question
    Ask {
        /// The question text
        question: String,

        /// Session id to continue (new session if omitted)
        #[arg(long)]
        session: Option<String>,

        /// Clear the session's message log first
        #[arg(long)]
        reset: bool,
    },

    /// List uploaded documents
    Documents,

    /// List known categories
    Categories,

    /// Delete a document and all of its indexed chunks
    Delete {
        /// Document id to delete
        document_id: String,
    },

    /// Clear a session's message log
    Reset {
        /// Session id to reset
        session_id: String,
    },

    /// Display current configuration
    Config,
}

impl Args {
    /// Tracing filter directive for the chosen verbosity
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "answerdesk=info",
            1 => "answerdesk=debug",
            _ => "answerdesk=trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload() {
        let args = Args::parse_from([
            "answerdesk", "upload", "policy.txt", "--category", "HR",
        ]);
        match args.command {
            Commands::Upload { file, category } => {
                assert_eq!(file, PathBuf::from("policy.txt"));
                assert_eq!(category, "HR");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_ask_with_reset() {
        let args = Args::parse_from([
            "answerdesk", "--owner", "alice", "ask", "how much leave?", "--reset",
        ]);
        assert_eq!(args.owner, "alice");
        match args.command {
            Commands::Ask { question, reset, session } => {
                assert_eq!(question, "how much leave?");
                assert!(reset);
                assert!(session.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_log_filter_levels() {
        let quiet = Args::parse_from(["answerdesk", "categories"]);
        assert_eq!(quiet.log_filter(), "answerdesk=info");

        let loud = Args::parse_from(["answerdesk", "-vv", "categories"]);
        assert_eq!(loud.log_filter(), "answerdesk=trace");
    }
}
