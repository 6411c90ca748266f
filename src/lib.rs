//! # MindCare
//!
//! A mental-health support chatbot grounded in the DSM-5 diagnostic
//! criteria.
//!
//! A DSM-5 reference document is chunked into token windows, summarized,
//! embedded and stored in a local SQLite vector collection. A tool-calling
//! agent answers the user with passages retrieved from that collection,
//! records a coarse mental health score, and keeps the conversation on disk.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │  Sources     │──▶│  Ingest pipeline │──▶│  Cache file  │
//! │  PDF / text  │   │ chunk+sum+embed  │   │  (JSON)      │
//! └──────────────┘   └──────────────────┘   └──────┬───────┘
//!                                                  ▼
//!                                           ┌──────────────┐
//!                                           │ SQLite index │
//!                                           │  "vector"    │
//!                                           └──────┬───────┘
//!                      ┌───────────────────────────┤
//!                      ▼                           ▼
//!               ┌─────────────┐             ┌─────────────┐
//!               │ ChatSession │◀── HTTP ───▶│  Web UI /   │
//!               │ agent+tools │             │  JSON API   │
//!               └─────────────┘             └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mindcare ingest                 # chunk, summarize, embed into the cache
//! mindcare index                  # load the cache into the vector collection
//! mindcare chat "Tôi cảm thấy lo lắng"
//! mindcare serve                  # web UI on http://127.0.0.1:8501
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF and text loading |
//! | [`chunk`] | Token-window chunking |
//! | [`cache`] | Versioned ingestion cache |
//! | [`ingest`] | Ingestion pipeline |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Chat-completion client with tool calling |
//! | [`prompts`] | Prompt templates |
//! | [`db`] | Database connection |
//! | [`migrate`] | Index schema |
//! | [`index`] | Vector collection and index builder |
//! | [`transcript`] | JSON Lines conversation log |
//! | [`scores`] | Score history file |
//! | [`tools`] | Agent tools |
//! | [`agent`] | Tool-calling agent loop |
//! | [`engine`] | Conversation session |
//! | [`pages`] | HTML pages |
//! | [`server`] | HTTP server |
//! | [`evaluate`] | RAG evaluation harness |

pub mod agent;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod evaluate;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod pages;
pub mod prompts;
pub mod scores;
pub mod server;
pub mod tools;
pub mod transcript;
