//! Embeddings for chunks and queries.
//!
//! [`EmbeddingProvider`] is the seam the pipeline, the index builder and the
//! `dsm5_query` tool embed through; [`OpenAIProvider`] talks to an
//! OpenAI-compatible `/embeddings` endpoint with the retry policy shared by
//! the chat client (see [`crate::llm`]). The byte and similarity helpers
//! at the bottom back the SQLite vector collection.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::llm::{is_retryable, retry_delay, LlmError};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_name(&self) -> &str;
    /// Expected vector length; cached vectors of another length are re-embedded.
    fn dims(&self) -> usize;
    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    match provider.embed_texts(&[text.to_string()]).await?.pop() {
        Some(vector) => Ok(vector),
        None => bail!("embedding provider returned no vector for the query"),
    }
}

/// Embed `texts` in batches of `batch_size`, preserving order.
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let vectors = provider.embed_texts(batch).await?;
        if vectors.len() != batch.len() {
            bail!(
                "Embedding provider returned {} vectors for {} inputs",
                vectors.len(),
                batch.len()
            );
        }
        out.extend(vectors);
    }
    Ok(out)
}

// ============ OpenAI Provider ============

/// `POST {base_url}/embeddings` with the key from `OPENAI_API_KEY`.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    api_key: String,
    base_url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            client,
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let body = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(retry_delay(attempt)).await;
            }

            let sent = self
                .client
                .post(format!("{}/embeddings", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;
            let response = match sent {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, attempt, texts = texts.len(), "embedding request failed");
                    last_err = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let parsed: EmbeddingsResponse = response.json().await?;
                return Ok(parsed.into_vectors());
            }
            let err = LlmError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            };
            if !is_retryable(status) {
                return Err(err);
            }
            tracing::warn!(%status, attempt, texts = texts.len(), "embedding request rejected");
            last_err = Some(err);
        }

        Err(last_err.unwrap_or_else(|| LlmError::Parse("embedding failed after retries".into())))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self
            .request(texts)
            .await
            .with_context(|| format!("embedding {} texts with {}", texts.len(), self.model))?;
        check_dims(&vectors, self.dims)?;
        Ok(vectors)
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl EmbeddingsResponse {
    /// Vectors in input order; items without an `index` keep their position.
    fn into_vectors(self) -> Vec<Vec<f32>> {
        let mut items: Vec<(usize, Vec<f32>)> = self
            .data
            .into_iter()
            .enumerate()
            .map(|(pos, item)| (item.index.unwrap_or(pos), item.embedding))
            .collect();
        items.sort_by_key(|(i, _)| *i);
        items.into_iter().map(|(_, v)| v).collect()
    }
}

/// Every vector must match the configured dimension, or the collection
/// would mix incomparable embeddings.
fn check_dims(vectors: &[Vec<f32>], dims: usize) -> Result<()> {
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        bail!(
            "embedding has {} dimensions, expected {} (check embedding.dims)",
            bad.len(),
            dims
        );
    }
    Ok(())
}

/// Little-endian `f32` bytes for the `embedding` BLOB column.
///
/// ```rust
/// use mindcare::embedding::{blob_to_vec, vec_to_blob};
///
/// let v = vec![0.25f32, -1.5];
/// assert_eq!(blob_to_vec(&vec_to_blob(&v)), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`vec_to_blob`]; a trailing partial value is ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .filter_map(|b| b.try_into().ok().map(f32::from_le_bytes))
        .collect()
}

/// Cosine of the angle between `a` and `b`. Zero when the lengths differ,
/// either vector is empty, or either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (dot, aa, bb) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, aa, bb), (x, y)| {
            (dot + x * y, aa + x * x, bb + y * y)
        });
    let norm = (aa * bb).sqrt();
    if norm < f32::EPSILON {
        0.0
    } else {
        dot / norm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_keeps_values_and_drops_partial_tail() {
        let v = vec![1.0f32, -2.5, 3.125, 0.0];
        let mut blob = vec_to_blob(&v);
        assert_eq!(blob.len(), 16);
        blob.push(0xff);
        assert_eq!(blob_to_vec(&blob), v);
    }

    #[test]
    fn cosine_of_parallel_orthogonal_and_opposite() {
        let x = [3.0f32, 4.0];
        assert!((cosine_similarity(&x, &[6.0, 8.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&x, &[-4.0, 3.0]).abs() < 1e-6);
        assert!((cosine_similarity(&x, &[-3.0, -4.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs_are_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_response_orders_by_index() {
        let parsed: EmbeddingsResponse = serde_json::from_value(serde_json::json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        }))
        .unwrap();
        assert_eq!(parsed.into_vectors(), vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_response_without_data_is_rejected() {
        let parsed = serde_json::from_value::<EmbeddingsResponse>(serde_json::json!({ "error": "nope" }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        assert!(check_dims(&[vec![0.0; 3], vec![0.0; 3]], 3).is_ok());
        let err = check_dims(&[vec![0.0; 3], vec![0.0; 2]], 3).unwrap_err();
        assert!(err.to_string().contains("expected 3"));
    }
}
