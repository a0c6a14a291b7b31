//! CLI command definitions and argument parsing

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(name = "loilibre")]
#[command(about = "Question answering over French law codes")]
#[command(version)]
pub struct Cli {
    /// Enable verbose debug logging (default: info level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file (default: config.toml, then config.example.toml)
    #[arg(short, long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a question and stream the answer
    Ask {
        /// The question
        query: String,
        /// Source selector (e.g. "code civil"); unknown selectors search everything
        #[arg(short, long, default_value = "all")]
        report_type: String,
        /// Similarity threshold (default: retrieval.threshold)
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Identifier used in conversation logs (default: random)
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Show the passages that would ground an answer
    Retrieve {
        /// The question
        query: String,
        /// Source selector (e.g. "code civil"); unknown selectors search everything
        #[arg(short, long, default_value = "all")]
        report_type: String,
        /// Similarity threshold (default: retrieval.threshold)
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Characters of passage content to show
        #[arg(long, default_value = "200")]
        preview: usize,
    },
    /// Start the HTTP API server
    Serve {
        /// Host to bind (default: server.host)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (default: server.port)
        #[arg(short, long)]
        port: Option<u16>,
        /// Enable CORS
        #[arg(long)]
        cors: bool,
    },
    /// Show current configuration
    Config,
}
