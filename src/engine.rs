//! Conversation session.
//!
//! A [`ChatSession`] owns the transcript and, once initialized, the agent
//! bound to the `dsm5_query` and `save_score` tools.
//!
//! ```text
//!   Uninitialized ──initialize()──▶ Initialized ──run_turn()──▶ Initialized
//!         ▲                                                        │
//!         └────────────────────────── clear() ─────────────────────┘
//! ```
//!
//! Initialization opens the `vector` collection (failing if the index was
//! never built). The welcome message is tied to the transcript, not to the
//! process: it is recorded only when the persisted transcript is empty, so
//! restarting against an existing conversation does not greet again. A
//! fresh or cleared transcript therefore gets exactly one welcome. A turn
//! that fails leaves the transcript untouched.

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::agent::AgentExecutor;
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::index;
use crate::llm::ChatModel;
use crate::models::ChatMessage;
use crate::prompts;
use crate::tools::{Dsm5QueryTool, SaveScoreTool, ToolRegistry};
use crate::transcript::Transcript;

pub struct ChatSession {
    config: Arc<Config>,
    chat: Arc<dyn ChatModel>,
    embedder: Arc<dyn EmbeddingProvider>,
    transcript: Transcript,
    agent: Option<AgentExecutor>,
}

impl ChatSession {
    /// Create an uninitialized session over the persisted transcript.
    pub fn new(
        config: Arc<Config>,
        chat: Arc<dyn ChatModel>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let transcript = Transcript::load(&config.paths.conversation_file);
        Self {
            config,
            chat,
            embedder,
            transcript,
            agent: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.agent.is_some()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.transcript.messages()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Build the agent if not done yet. Emits the welcome message into an
    /// empty transcript.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.agent.is_some() {
            return Ok(());
        }

        let collection = Arc::new(index::open_collection(&self.config).await?);

        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(Dsm5QueryTool::new(
            collection,
            self.embedder.clone(),
            self.config.retrieval.top_k,
        )));
        tools.register(Arc::new(SaveScoreTool::new(
            self.config.paths.scores_file.clone(),
        )));

        self.agent = Some(AgentExecutor::new(self.chat.clone(), tools, &self.config));

        if self.transcript.is_empty() {
            self.transcript
                .push(ChatMessage::assistant(prompts::WELCOME_MESSAGE));
            self.transcript.flush()?;
        }

        tracing::info!(
            messages = self.transcript.len(),
            "chat session initialized"
        );
        Ok(())
    }

    /// Run one user turn. On success the transcript gains the user message
    /// and the response, and is persisted.
    pub async fn run_turn(&mut self, input: &str) -> Result<String> {
        let input = input.trim();
        if input.is_empty() {
            bail!("message must not be empty");
        }

        self.initialize().await?;
        let Some(agent) = self.agent.as_ref() else {
            bail!("chat session is not initialized");
        };

        let response = agent.run(self.transcript.messages(), input).await?;

        self.transcript.push(ChatMessage::user(input));
        self.transcript.push(ChatMessage::assistant(response.clone()));
        self.transcript.flush()?;

        Ok(response)
    }

    /// Delete the conversation file and return to the uninitialized state.
    pub fn clear(&mut self) -> Result<()> {
        self.transcript.clear()?;
        self.agent = None;
        tracing::info!("conversation history cleared");
        Ok(())
    }
}

/// CLI entry point for `mindcare chat`.
pub async fn run_chat(
    config: Arc<Config>,
    chat: Arc<dyn ChatModel>,
    embedder: Arc<dyn EmbeddingProvider>,
    message: &str,
) -> Result<()> {
    let mut session = ChatSession::new(config, chat, embedder);
    let fresh = session.messages().is_empty();
    session.initialize().await?;
    if fresh {
        println!("{}", prompts::WELCOME_MESSAGE);
        println!();
    }
    let response = session.run_turn(message).await?;
    println!("{}", response);
    Ok(())
}

/// CLI entry point for `mindcare clear`.
pub fn run_clear(config: &Config) -> Result<()> {
    let mut transcript = Transcript::load(&config.paths.conversation_file);
    transcript.clear()?;
    println!("Đã xóa lịch sử hội thoại!");
    Ok(())
}
