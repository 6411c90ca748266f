//! # MindCare CLI (`mindcare`)
//!
//! The `mindcare` binary drives the offline pipeline (ingest, index,
//! evaluate), runs single chat turns from the terminal and starts the web
//! server.
//!
//! ## Usage
//!
//! ```bash
//! mindcare --config ./config/mindcare.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mindcare init` | Create the vector index database and schema |
//! | `mindcare ingest` | Chunk, summarize and embed the sources into the cache |
//! | `mindcare index` | Load the cache into the `vector` collection |
//! | `mindcare query "<text>"` | Nearest DSM-5 passages for a query |
//! | `mindcare chat "<message>"` | One conversation turn against the saved transcript |
//! | `mindcare clear` | Delete the conversation history |
//! | `mindcare scores [--time <ts>]` | Score history, or one entry |
//! | `mindcare serve` | Start the web UI and JSON API |
//! | `mindcare evaluate` | Run the RAG evaluation |
//!
//! `OPENAI_API_KEY` is read from the environment or a `.env` file.
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mindcare::config;
use mindcare::embedding::{EmbeddingProvider, OpenAIProvider};
use mindcare::llm::{ChatModel, OpenAIChatModel};
use mindcare::{engine, evaluate, index, ingest, migrate, scores, server};

#[derive(Parser)]
#[command(
    name = "mindcare",
    about = "MindCare: a DSM-5 grounded mental-health support chatbot",
    version,
    long_about = "MindCare chunks, summarizes and embeds a DSM-5 reference into a local vector \
    index and serves a tool-calling conversational agent that retrieves from it, tracks a \
    mental health score and keeps the conversation history on disk."
)]
struct Cli {
    /// Path to the TOML configuration file (defaults apply when it is missing).
    #[arg(long, global = true, default_value = "./config/mindcare.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vector index database and schema.
    Init,

    /// Chunk, summarize and embed the configured sources into the cache.
    Ingest,

    /// Populate the `vector` collection from the ingestion cache.
    Index,

    /// Show the DSM-5 passages nearest to a query.
    Query {
        /// Query text.
        text: String,

        /// Number of passages (default: `retrieval.top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Send one message to the chatbot and print the reply.
    Chat {
        /// The message to send.
        message: String,
    },

    /// Delete the conversation history.
    Clear,

    /// Show the score history.
    Scores {
        /// Show the entry recorded at this time (`YYYY-MM-DD HH:MM:SS`).
        #[arg(long)]
        time: Option<String>,
    },

    /// Start the web UI and JSON API.
    Serve,

    /// Evaluate retrieval and answer quality.
    Evaluate,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn chat_model(cfg: &config::Config) -> anyhow::Result<Arc<dyn ChatModel>> {
    Ok(Arc::new(OpenAIChatModel::new(&cfg.llm)?))
}

fn embedder(cfg: &config::Config) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::new(OpenAIProvider::new(&cfg.embedding)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Index database initialized successfully.");
        }
        Commands::Ingest => {
            let chat = chat_model(&cfg)?;
            let embedder = embedder(&cfg)?;
            ingest::run_ingest(&cfg, chat.as_ref(), embedder.as_ref()).await?;
        }
        Commands::Index => {
            let embedder = embedder(&cfg)?;
            index::run_index(&cfg, embedder.as_ref()).await?;
        }
        Commands::Query { text, limit } => {
            let embedder = embedder(&cfg)?;
            index::run_query(&cfg, embedder.as_ref(), &text, limit).await?;
        }
        Commands::Chat { message } => {
            let chat = chat_model(&cfg)?;
            let embedder = embedder(&cfg)?;
            engine::run_chat(Arc::new(cfg), chat, embedder, &message).await?;
        }
        Commands::Clear => {
            engine::run_clear(&cfg)?;
        }
        Commands::Scores { time } => {
            scores::run_scores(&cfg.paths.scores_file, time.as_deref())?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Evaluate => {
            let chat = chat_model(&cfg)?;
            let embedder = embedder(&cfg)?;
            evaluate::run_evaluate(&cfg, chat.as_ref(), embedder.as_ref()).await?;
        }
    }

    Ok(())
}
