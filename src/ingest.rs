//! Ingestion pipeline orchestration.
//!
//! Coordinates the offline flow: source files → text extraction (one
//! document per PDF page) → token chunking → one summary per document →
//! chunk embeddings → cache file.
//!
//! A readable cache short-circuits the whole pipeline: cached chunks are
//! returned unchanged, without checking whether the sources changed since.
//! Any cache read failure (missing, malformed, other format version) falls
//! through to full reprocessing.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cache;
use crate::chunk::TokenTextSplitter;
use crate::config::Config;
use crate::embedding::{embed_in_batches, EmbeddingProvider};
use crate::extract::{self, SUPPORTED_EXTENSIONS};
use crate::llm::{complete_text, AgentMessage, ChatModel, CompletionRequest};
use crate::models::{Chunk, Document};
use crate::prompts;

/// Produce summarized, embedded chunks for every configured source,
/// reading from and writing to the ingestion cache.
pub async fn ingest_documents(
    config: &Config,
    chat: &dyn ChatModel,
    embedder: &dyn EmbeddingProvider,
) -> Result<Vec<Chunk>> {
    let cache_path = &config.paths.cache_file;
    match cache::read_cache(cache_path) {
        Ok(chunks) => {
            tracing::info!(
                path = %cache_path.display(),
                chunks = chunks.len(),
                "loaded chunks from cache"
            );
            return Ok(chunks);
        }
        Err(e) => {
            tracing::info!("{}; processing documents", e);
        }
    }

    let documents = load_documents(&collect_sources(&config.paths.sources));
    tracing::info!(documents = documents.len(), "loaded source documents");

    let chunks = process_documents(config, chat, embedder, &documents).await?;

    cache::write_cache(cache_path, &chunks)
        .with_context(|| format!("Failed to write cache {}", cache_path.display()))?;
    tracing::info!(path = %cache_path.display(), chunks = chunks.len(), "cache written");

    Ok(chunks)
}

/// Split, summarize and embed already loaded documents. Each document
/// (each PDF page) gets its own summary; chunks never span documents.
pub async fn process_documents(
    config: &Config,
    chat: &dyn ChatModel,
    embedder: &dyn EmbeddingProvider,
    documents: &[Document],
) -> Result<Vec<Chunk>> {
    let splitter = TokenTextSplitter::new(
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    )?;

    let mut chunks = Vec::new();
    for doc in documents {
        let mut doc_chunks = splitter.split_document(&doc.id, &doc.text);
        if doc_chunks.is_empty() {
            tracing::warn!(document = %doc.id, page = ?doc.page, "document has no text, skipping");
            continue;
        }

        let summary = summarize_document(config, chat, &splitter, doc)
            .await
            .with_context(|| match doc.page {
                Some(page) => format!("Failed to summarize {} page {}", doc.id, page),
                None => format!("Failed to summarize {}", doc.id),
            })?;
        let page = doc.page.map(|p| p as i64);
        for chunk in &mut doc_chunks {
            chunk.page = page;
            chunk.summary = Some(summary.clone());
        }

        tracing::debug!(document = %doc.id, page = ?doc.page, chunks = doc_chunks.len(), "chunked document");
        chunks.extend(doc_chunks);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embed_in_batches(embedder, &texts, config.embedding.batch_size)
        .await
        .context("Failed to embed chunks")?;
    for (chunk, vector) in chunks.iter_mut().zip(vectors) {
        chunk.embedding = Some(vector);
    }
    Ok(chunks)
}

/// Expand configured sources into files. Directories are walked for
/// supported extensions; missing paths are logged and skipped.
pub fn collect_sources(sources: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for source in sources {
        if source.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(source)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| has_supported_extension(p))
                .collect();
            found.sort();
            files.extend(found);
        } else if source.is_file() {
            files.push(source.clone());
        } else {
            tracing::warn!(path = %source.display(), "source file not found, skipping");
        }
    }
    files
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

fn load_documents(files: &[PathBuf]) -> Vec<Document> {
    files
        .iter()
        .flat_map(|path| match extract::load_documents(path) {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to load document, skipping");
                Vec::new()
            }
        })
        .collect()
}

async fn summarize_document(
    config: &Config,
    chat: &dyn ChatModel,
    splitter: &TokenTextSplitter,
    doc: &Document,
) -> Result<String> {
    let text = splitter.truncate(&doc.text, config.chunking.summary_max_input_tokens);
    let request = CompletionRequest::new(
        config.llm.chat_model.clone(),
        vec![AgentMessage::User(prompts::summary_prompt(&text))],
    )
    .temperature(config.llm.temperature)
    .max_tokens(config.llm.summary_max_tokens);

    let summary = complete_text(chat, &request).await?;
    Ok(summary.trim().to_string())
}

/// CLI entry point for `mindcare ingest`.
pub async fn run_ingest(
    config: &Config,
    chat: &dyn ChatModel,
    embedder: &dyn EmbeddingProvider,
) -> Result<()> {
    let chunks = ingest_documents(config, chat, embedder).await?;
    let mut documents: Vec<&str> = chunks.iter().map(|c| c.source_id.as_str()).collect();
    documents.dedup();

    println!("ingest");
    println!("  documents: {}", documents.len());
    println!("  chunks: {}", chunks.len());
    println!("  cache: {}", config.paths.cache_file.display());
    Ok(())
}
