use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "cdpqa",
    about = "Answer how-to questions about customer data platforms from their documentation"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rebuild the index from the acquisition job's docs files
    Rebuild(RebuildArgs),
    /// Answer one question
    Ask(AskArgs),
    /// Answer questions interactively
    Chat,
    /// Show index status and statistics
    Status(StatusArgs),
    /// Manage persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Start MCP server for AI agent integration
    Mcp,
    /// Serve answers over HTTP
    Serve(ServeArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Rebuild --

#[derive(Debug, Parser)]
pub struct RebuildArgs {
    /// Directory holding the docs files (default: <data dir>/docs)
    #[arg(long)]
    pub docs: Option<PathBuf>,

    /// File-name glob of the docs files
    #[arg(long, default_value = crate::walker::DEFAULT_PATTERN)]
    pub pattern: String,
}

// -- Ask --

#[derive(Debug, Parser)]
pub struct AskArgs {
    /// The question
    pub question: String,

    /// Output the answer as JSON
    #[arg(long)]
    pub json: bool,

    /// Chunks retrieved per platform
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Rejection threshold for questions naming no platform
    #[arg(long)]
    pub threshold: Option<f32>,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Config --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Persist a setting in config.redb
    Set {
        /// Setting name (see `cdpqa config list`)
        key: String,
        value: String,
    },
    /// Show the resolved value of a setting
    Get { key: String },
    /// Show every setting with its resolved value
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a persisted setting (revert to default)
    Unset { key: String },
}

// -- Serve --

#[derive(Debug, Parser)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = crate::web::DEFAULT_ADDR)]
    pub addr: String,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "cdpqa",
            &mut std::io::stdout(),
        );
    }
}
