//! TOML configuration.
//!
//! Every setting has a default matching the stock deployment (the DSM-5 PDF
//! under `data/ingestion_storage/`, caches under `data/cache/`), so a missing
//! config file is not an error: [`load_config`] falls back to
//! [`Config::default`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub eval: EvalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,
    #[serde(default = "default_conversation_file")]
    pub conversation_file: PathBuf,
    /// Directory holding the SQLite vector index.
    #[serde(default = "default_index_storage")]
    pub index_storage: PathBuf,
    #[serde(default = "default_scores_file")]
    pub scores_file: PathBuf,
    /// Source documents (files or directories) fed to ingestion.
    #[serde(default = "default_sources")]
    pub sources: Vec<PathBuf>,
    #[serde(default = "default_eval_output_dir")]
    pub eval_output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_file: default_cache_file(),
            conversation_file: default_conversation_file(),
            index_storage: default_index_storage(),
            scores_file: default_scores_file(),
            sources: default_sources(),
            eval_output_dir: default_eval_output_dir(),
        }
    }
}

fn default_cache_file() -> PathBuf {
    PathBuf::from("data/cache/pipeline_cache.json")
}
fn default_conversation_file() -> PathBuf {
    PathBuf::from("data/cache/chat_history.jsonl")
}
fn default_index_storage() -> PathBuf {
    PathBuf::from("data/index_storage")
}
fn default_scores_file() -> PathBuf {
    PathBuf::from("data/user_storage/scores.json")
}
fn default_sources() -> Vec<PathBuf> {
    vec![PathBuf::from(
        "data/ingestion_storage/dsm-5-cac-tieu-chuan-chan-doan.pdf",
    )]
}
fn default_eval_output_dir() -> PathBuf {
    PathBuf::from("eval_results")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Upper bound on the document text handed to the summarizer.
    #[serde(default = "default_summary_max_input_tokens")]
    pub summary_max_input_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            summary_max_input_tokens: default_summary_max_input_tokens(),
        }
    }
}

fn default_chunk_size() -> usize {
    512
}
fn default_chunk_overlap() -> usize {
    20
}
fn default_summary_max_input_tokens() -> usize {
    12_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            base_url: default_base_url(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,
    /// Model used by the evaluation harness for questions, answers and judging.
    #[serde(default = "default_eval_model")]
    pub eval_model: String,
    #[serde(default = "default_question_temperature")]
    pub question_temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            chat_model: default_chat_model(),
            temperature: default_temperature(),
            summary_max_tokens: default_summary_max_tokens(),
            eval_model: default_eval_model(),
            question_temperature: default_question_temperature(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            base_url: default_base_url(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4o".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_summary_max_tokens() -> u32 {
    512
}
fn default_eval_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_question_temperature() -> f32 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_eval_top_k")]
    pub eval_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            eval_top_k: default_eval_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_eval_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_iterations() -> usize {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct EvalConfig {
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
    #[serde(default = "default_questions_per_document")]
    pub questions_per_document: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_documents: default_max_documents(),
            questions_per_document: default_questions_per_document(),
        }
    }
}

fn default_max_documents() -> usize {
    5
}
fn default_questions_per_document() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

impl PathsConfig {
    /// SQLite file backing the vector collection.
    pub fn index_db(&self) -> PathBuf {
        self.index_storage.join("chroma.sqlite")
    }
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.retrieval.top_k == 0 || config.retrieval.eval_top_k == 0 {
        anyhow::bail!("retrieval.top_k and retrieval.eval_top_k must be >= 1");
    }
    if config.agent.max_iterations == 0 {
        anyhow::bail!("agent.max_iterations must be >= 1");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = load_config(Path::new("/nonexistent/mindcare.toml")).unwrap();
        assert_eq!(cfg.chunking.chunk_size, 512);
        assert_eq!(cfg.chunking.chunk_overlap, 20);
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.llm.chat_model, "gpt-4o");
        assert_eq!(
            cfg.paths.scores_file,
            PathBuf::from("data/user_storage/scores.json")
        );
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("mindcare.toml");
        std::fs::write(
            &path,
            "[paths]\nscores_file = \"/tmp/s.json\"\n\n[chunking]\nchunk_size = 64\n",
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.paths.scores_file, PathBuf::from("/tmp/s.json"));
        assert_eq!(cfg.chunking.chunk_size, 64);
        assert_eq!(cfg.chunking.chunk_overlap, 20);
        assert_eq!(cfg.server.bind, "127.0.0.1:8501");
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("mindcare.toml");
        std::fs::write(&path, "[chunking]\nchunk_size = 10\nchunk_overlap = 10\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }
}
