//! Tools the conversational agent can call.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │             ToolRegistry             │
//! │  ┌────────────┐     ┌─────────────┐  │
//! │  │ dsm5_query │     │ save_score  │  │
//! │  │ (vector    │     │ (scores     │  │
//! │  │  search)   │     │  file)      │  │
//! │  └────────────┘     └─────────────┘  │
//! └─────────────────┬────────────────────┘
//!                   ▼
//!        AgentExecutor tool-calling loop
//! ```
//!
//! Each tool describes its parameters as a JSON Schema object, which is
//! handed to the model verbatim as an OpenAI function definition.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Timelike;
use serde_json::{Number, Value};
use std::path::PathBuf;
use std::sync::Arc;

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::index::VectorCollection;
use crate::llm::ToolSpec;
use crate::models::{ScoreEntry, ScoreLevel};
use crate::prompts;
use crate::scores;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls the tool by.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the tool's arguments.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, params: Value) -> Result<Value>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ToolRegistry
// ═══════════════════════════════════════════════════════════════════════

pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// dsm5_query
// ═══════════════════════════════════════════════════════════════════════

/// Retrieves DSM-5 passages nearest to the query text.
pub struct Dsm5QueryTool {
    collection: Arc<VectorCollection>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl Dsm5QueryTool {
    pub fn new(
        collection: Arc<VectorCollection>,
        embedder: Arc<dyn EmbeddingProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            collection,
            embedder,
            top_k,
        }
    }

    /// Passages nearest to `query`, joined with newlines.
    pub async fn retrieve(&self, query: &str) -> Result<String> {
        let vector = embed_query(self.embedder.as_ref(), query).await?;
        let hits = self.collection.query(&vector, self.top_k).await?;
        tracing::info!(query, results = hits.len(), "dsm5 retrieval");
        Ok(hits
            .into_iter()
            .map(|h| h.document)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[async_trait]
impl Tool for Dsm5QueryTool {
    fn name(&self) -> &str {
        "dsm5_query"
    }

    fn description(&self) -> &str {
        prompts::DSM5_TOOL_DESCRIPTION
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input": { "type": "string", "description": "Search query" }
            },
            "required": ["input"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let query = params["input"]
            .as_str()
            .or_else(|| params["query"].as_str())
            .unwrap_or("");
        if query.trim().is_empty() {
            bail!("input must not be empty");
        }
        Ok(Value::String(self.retrieve(query).await?))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// save_score
// ═══════════════════════════════════════════════════════════════════════

/// Appends an assessment to the scores file, stamped with local time.
pub struct SaveScoreTool {
    path: PathBuf,
}

impl SaveScoreTool {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Tool for SaveScoreTool {
    fn name(&self) -> &str {
        "save_score"
    }

    fn description(&self) -> &str {
        prompts::SAVE_SCORE_TOOL_DESCRIPTION
    }

    fn parameters_schema(&self) -> Value {
        let levels: Vec<&str> = ScoreLevel::ALL.iter().map(|l| l.label()).collect();
        serde_json::json!({
            "type": "object",
            "properties": {
                "score": { "type": "number", "description": "Numeric mental health score" },
                "level": { "type": "string", "enum": levels },
                "content": { "type": "string", "description": "What the user shared" },
                "total_guess": { "type": "string", "description": "Overall assessment" }
            },
            "required": ["score", "level", "content", "total_guess"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let score = parse_score(&params["score"])?;
        let level_raw = params["level"].as_str().unwrap_or("");
        let Some(level) = ScoreLevel::from_label(level_raw) else {
            bail!(
                "invalid level '{}': expected one of kém, trung bình, bình thường, tốt",
                level_raw
            );
        };

        let now = chrono::Local::now().naive_local();
        let entry = ScoreEntry {
            time: now.with_nanosecond(0).unwrap_or(now),
            score: score.clone(),
            level: level.label().to_string(),
            content: text_param(&params["content"]),
            total_guess: text_param(&params["total_guess"]),
        };
        scores::append_score(&self.path, entry)?;
        tracing::info!(score = %score, level = level.label(), "score saved");

        Ok(Value::String("Score saved successfully.".into()))
    }
}

fn parse_score(value: &Value) -> Result<Number> {
    if let Value::Number(n) = value {
        return Ok(n.clone());
    }
    if let Some(raw) = value.as_str().map(str::trim) {
        if let Ok(n) = raw.parse::<i64>() {
            return Ok(n.into());
        }
        if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
            return Ok(n);
        }
    }
    bail!("score must be a number, got {}", value)
}

/// Free text argument; non-string values are kept in their JSON form.
fn text_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
