//! Shared fakes for the integration tests: a deterministic embedder and a
//! chat model that answers prompts by shape and replays scripted agent
//! replies.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use mindcare::config::Config;
use mindcare::embedding::EmbeddingProvider;
use mindcare::llm::{AgentMessage, ChatModel, Completion, CompletionRequest, LlmError, ToolCall};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

pub const DIMS: usize = 8;

/// Character-histogram embedding: texts sharing characters land close.
pub struct FakeEmbedder {
    pub calls: AtomicUsize,
    pub texts_embedded: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn fake_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for b in text.bytes() {
        v[(b as usize) % DIMS] += 1.0;
    }
    v[0] += 1.0;
    v
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-embedding"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| fake_vector(t)).collect())
    }
}

/// Plain prompts are answered by their shape; requests offering tools
/// (agent turns) pop the next scripted completion, falling back to a fixed
/// text reply when the script is exhausted.
pub struct FakeChat {
    script: Mutex<VecDeque<Result<Completion, String>>>,
    pub plain_calls: AtomicUsize,
    pub agent_calls: AtomicUsize,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

pub const DEFAULT_REPLY: &str = "Mình luôn ở đây lắng nghe bạn. 🧡";

impl FakeChat {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            plain_calls: AtomicUsize::new(0),
            agent_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, completion: Completion) {
        self.script.lock().unwrap().push_back(Ok(completion));
    }

    pub fn push_error(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn plain_calls(&self) -> usize {
        self.plain_calls.load(Ordering::SeqCst)
    }
}

pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> Completion {
    Completion {
        content: None,
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }],
    }
}

pub fn text(content: &str) -> Completion {
    Completion {
        content: Some(content.to_string()),
        tool_calls: Vec::new(),
    }
}

fn last_user_prompt(request: &CompletionRequest) -> &str {
    request
        .messages
        .iter()
        .rev()
        .find_map(|m| match m {
            AgentMessage::User(s) => Some(s.as_str()),
            _ => None,
        })
        .unwrap_or("")
}

#[async_trait]
impl ChatModel for FakeChat {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        self.requests.lock().unwrap().push(request.clone());

        if !request.tools.is_empty() {
            self.agent_calls.fetch_add(1, Ordering::SeqCst);
            return match self.script.lock().unwrap().pop_front() {
                Some(Ok(c)) => Ok(c),
                Some(Err(message)) => Err(LlmError::Api {
                    status: 500,
                    message,
                }),
                None => Ok(text(DEFAULT_REPLY)),
            };
        }

        self.plain_calls.fetch_add(1, Ordering::SeqCst);
        let prompt = last_user_prompt(request);
        let reply = if prompt.contains("summarize") {
            "Tóm tắt: tiêu chuẩn chẩn đoán rối loạn lo âu và trầm cảm."
        } else if prompt.contains("generate") {
            "Questions:\n1. Rối loạn lo âu là gì?\n2. Triệu chứng trầm cảm?\n\n4. Điều trị?\n5. Thời gian?\n6. ignored"
        } else if prompt.contains("Output 'Yes' or 'No'") {
            "Yes"
        } else {
            "Theo DSM-5, cần ít nhất 6 tháng triệu chứng."
        };
        Ok(text(reply))
    }
}

/// Config rooted in `tmp` with two small text sources.
pub fn test_config(tmp: &TempDir) -> Config {
    let root = tmp.path();
    let sources = root.join("sources");
    std::fs::create_dir_all(&sources).unwrap();
    std::fs::write(
        sources.join("anxiety.txt"),
        "Rối loạn lo âu lan tỏa: lo âu và lo lắng quá mức, xảy ra nhiều ngày hơn không trong ít nhất 6 tháng. "
            .repeat(6),
    )
    .unwrap();
    std::fs::write(
        sources.join("depression.md"),
        "# Rối loạn trầm cảm chủ yếu\n\nTâm trạng trầm cảm gần như cả ngày, mất hứng thú, mất ngủ hoặc ngủ nhiều. "
            .repeat(6),
    )
    .unwrap();

    let mut config = Config::default();
    config.paths.sources = vec![sources, root.join("missing.pdf")];
    config.paths.cache_file = root.join("data/cache/pipeline_cache.json");
    config.paths.conversation_file = root.join("data/cache/chat_history.jsonl");
    config.paths.index_storage = root.join("data/index_storage");
    config.paths.scores_file = root.join("data/user_storage/scores.json");
    config.paths.eval_output_dir = root.join("eval_results");
    config.chunking.chunk_size = 32;
    config.chunking.chunk_overlap = 4;
    config.embedding.dims = DIMS;
    config.embedding.batch_size = 4;
    config
}

pub fn line_count(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .map(|s| s.lines().filter(|l| !l.trim().is_empty()).count())
        .unwrap_or(0)
}
