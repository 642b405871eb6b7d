//! Grappler CLI - ask a grappling coach backed by your transcript corpus.

mod backends;
mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[command(name = "grappler")]
#[command(author, version, about = "Grappler - a grappling coach grounded in instructional transcripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new Grappler project
    Init {
        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Chunk, embed and persist a transcript corpus
    Ingest {
        /// Transcript file or directory (.txt, .json)
        path: String,

        /// Re-embed even if a persisted index exists
        #[arg(short, long)]
        rebuild: bool,
    },

    /// Ask a single question
    Ask {
        /// The question
        question: String,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,

        /// Corpus to index if no persisted index exists
        #[arg(short, long, default_value = "transcripts")]
        corpus: String,
    },

    /// Start an interactive conversation
    Chat {
        /// Corpus to index if no persisted index exists
        #[arg(short, long, default_value = "transcripts")]
        corpus: String,
    },

    /// Show index statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { path } => commands::init::run(path),
        Commands::Ingest { path, rebuild } => commands::ingest::run(&path, rebuild).await,
        Commands::Ask { question, session, corpus } => {
            commands::ask::run(&question, session, &corpus).await
        }
        Commands::Chat { corpus } => commands::chat::run(&corpus).await,
        Commands::Stats => commands::stats::run(),
    }
}
