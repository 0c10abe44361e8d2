//! CLI module for statechat
//!
//! Provides command-line interface parsing for the statechat binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// statechat - declarative state-machine workflows for LLM conversations
#[derive(Parser, Debug)]
#[command(
    name = "statechat",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "statechat - declarative state-machine workflows for LLM conversations",
    long_about = "Runs YAML workflows in which every agent is a state machine driving a\n\
                  conversation with a language model. Message templates can execute the\n\
                  model's Python code blocks and answer its documentation queries.",
    after_help = "EXAMPLES:\n    \
                  statechat validate workflows/python.yaml   # Check a workflow without running it\n    \
                  statechat run workflows/python.yaml        # Run every agent of a workflow\n    \
                  statechat index ./docs                     # Add documents to the snippet index\n    \
                  statechat --config my.toml run flow.yaml   # Use a custom config file"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "statechat.toml", global = true)]
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
    /// Run every agent of a workflow until it ends
    Run {
        /// Workflow YAML file
        workflow: PathBuf,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,

        /// Do not echo messages as they are appended
        #[arg(short, long)]
        quiet: bool,
    },

    /// Load and validate a workflow without running it
    Validate {
        /// Workflow YAML file
        workflow: PathBuf,
    },

    /// Chunk, embed and store documents in the snippet index
    ///
    /// Every regular file under the directory is read as UTF-8 text.
    Index {
        /// Directory of documents to index
        dir: PathBuf,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
