//! Persistent vector collection and the index builder.
//!
//! A collection is a named set of rows `(id, document, metadata, embedding)`
//! in the SQLite index database. Queries are brute-force: every vector of
//! the collection is scored against the query by cosine similarity in Rust,
//! and the closest `n` come back with `distance = 1 - similarity`.
//!
//! [`build_indexes`] fills the `vector` collection from the ingestion cache
//! exactly once; a collection that already holds entries is left untouched.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};

use crate::cache;
use crate::config::Config;
use crate::db;
use crate::embedding::{self, embed_in_batches, EmbeddingProvider};
use crate::migrate;

/// Name of the collection the chatbot retrieves from.
pub const COLLECTION_NAME: &str = "vector";
pub const COSINE_SPACE: &str = "cosine";

/// Metadata keys never stored alongside a vector.
const DROPPED_METADATA_KEYS: &[&str] = &["input_documents", "embedding"];

/// One nearest-neighbour result.
#[derive(Debug, Clone, Serialize)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: Map<String, Value>,
    pub distance: f32,
}

pub struct VectorCollection {
    pool: SqlitePool,
    name: String,
}

impl VectorCollection {
    /// Open the named collection, creating it (cosine space) if absent.
    pub async fn get_or_create(pool: &SqlitePool, name: &str) -> Result<Self> {
        sqlx::query(
            "INSERT OR IGNORE INTO collections (name, space, created_at) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(COSINE_SPACE)
        .bind(chrono::Utc::now().timestamp())
        .execute(pool)
        .await?;

        Ok(Self {
            pool: pool.clone(),
            name: name.to_string(),
        })
    }

    /// Open an existing collection. Fails if it was never created.
    pub async fn get(pool: &SqlitePool, name: &str) -> Result<Self> {
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM collections WHERE name = ?")
                .bind(name)
                .fetch_one(pool)
                .await?;
        if !exists {
            bail!(
                "Collection '{}' does not exist. Run `mindcare index` first.",
                name
            );
        }
        Ok(Self {
            pool: pool.clone(),
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings WHERE collection = ?")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Insert entries in one transaction. All slices must have equal length.
    pub async fn add(
        &self,
        ids: &[String],
        embeddings: &[Vec<f32>],
        documents: &[String],
        metadatas: &[Map<String, Value>],
    ) -> Result<()> {
        let n = ids.len();
        if embeddings.len() != n || documents.len() != n || metadatas.len() != n {
            bail!(
                "add: mismatched lengths (ids {}, embeddings {}, documents {}, metadatas {})",
                n,
                embeddings.len(),
                documents.len(),
                metadatas.len()
            );
        }

        let start: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(seq) + 1, 0) FROM embeddings WHERE collection = ?",
        )
        .bind(&self.name)
        .fetch_one(&self.pool)
        .await?;

        let mut tx = self.pool.begin().await?;
        for i in 0..n {
            let metadata_json = serde_json::to_string(&metadatas[i])?;
            sqlx::query(
                r#"
                INSERT INTO embeddings (collection, id, seq, document, metadata_json, dims, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&self.name)
            .bind(&ids[i])
            .bind(start + i as i64)
            .bind(&documents[i])
            .bind(metadata_json)
            .bind(embeddings[i].len() as i64)
            .bind(embedding::vec_to_blob(&embeddings[i]))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// The `n_results` entries closest to `embedding`, nearest first.
    pub async fn query(&self, embedding: &[f32], n_results: usize) -> Result<Vec<QueryHit>> {
        let rows = sqlx::query(
            r#"
            SELECT id, document, metadata_json, embedding
            FROM embeddings
            WHERE collection = ?
            ORDER BY seq
            "#,
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let vec = embedding::blob_to_vec(&blob);
            let similarity = embedding::cosine_similarity(embedding, &vec);
            let metadata_json: String = row.get("metadata_json");
            let metadata: Map<String, Value> =
                serde_json::from_str(&metadata_json).unwrap_or_default();
            hits.push(QueryHit {
                id: row.get("id"),
                document: row.get("document"),
                metadata,
                distance: 1.0 - similarity,
            });
        }

        // Stable sort keeps insertion order among equal distances
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(n_results);
        Ok(hits)
    }
}

/// Keep only primitive metadata values and drop keys that must not be
/// stored with a vector.
pub fn sanitize_metadata(metadata: &Map<String, Value>) -> Map<String, Value> {
    metadata
        .iter()
        .filter(|(k, _)| !DROPPED_METADATA_KEYS.contains(&k.as_str()))
        .filter(|(_, v)| !v.is_array() && !v.is_object())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Connect, ensure the schema, and open the retrieval collection.
/// Fails if the collection was never built.
pub async fn open_collection(config: &Config) -> Result<VectorCollection> {
    let pool = db::connect(config).await?;
    migrate::migrate(&pool).await?;
    VectorCollection::get(&pool, COLLECTION_NAME).await
}

/// Populate the retrieval collection from the ingestion cache.
///
/// A missing or unreadable cache is fatal. When the collection already
/// holds entries nothing is re-embedded or re-inserted. Chunks whose cached
/// embedding is absent or has the wrong dimension are embedded before
/// insertion.
pub async fn build_indexes(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
) -> Result<VectorCollection> {
    let chunks = cache::read_cache(&config.paths.cache_file)
        .context("Cannot build the index without an ingestion cache. Run `mindcare ingest` first")?;

    let pool = db::connect(config).await?;
    migrate::migrate(&pool).await?;
    let collection = VectorCollection::get_or_create(&pool, COLLECTION_NAME).await?;

    let existing = collection.count().await?;
    if existing > 0 {
        tracing::info!(
            collection = COLLECTION_NAME,
            count = existing,
            "collection already populated, skipping"
        );
        return Ok(collection);
    }

    let dims = embedder.dims();
    let stale: Vec<usize> = chunks
        .iter()
        .enumerate()
        .filter(|(_, c)| c.embedding.as_ref().map(|e| e.len()) != Some(dims))
        .map(|(i, _)| i)
        .collect();

    let mut embeddings: Vec<Vec<f32>> = chunks
        .iter()
        .map(|c| c.embedding.clone().unwrap_or_default())
        .collect();

    if !stale.is_empty() {
        tracing::info!(count = stale.len(), "embedding chunks without a cached vector");
        let texts: Vec<String> = stale.iter().map(|&i| chunks[i].text.clone()).collect();
        let vectors = embed_in_batches(embedder, &texts, config.embedding.batch_size).await?;
        for (&i, vector) in stale.iter().zip(vectors) {
            embeddings[i] = vector;
        }
    }

    let ids: Vec<String> = (0..chunks.len()).map(|i| i.to_string()).collect();
    let documents: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let metadatas: Vec<Map<String, Value>> = chunks
        .iter()
        .map(|c| sanitize_metadata(&c.metadata()))
        .collect();

    collection
        .add(&ids, &embeddings, &documents, &metadatas)
        .await?;
    tracing::info!(
        collection = COLLECTION_NAME,
        count = ids.len(),
        "collection populated"
    );

    Ok(collection)
}

/// CLI entry point for `mindcare index`.
pub async fn run_index(config: &Config, embedder: &dyn EmbeddingProvider) -> Result<()> {
    let collection = build_indexes(config, embedder).await?;
    println!("index");
    println!("  collection: {}", collection.name());
    println!("  entries: {}", collection.count().await?);
    println!("  storage: {}", config.paths.index_db().display());
    Ok(())
}

/// CLI entry point for `mindcare query`.
pub async fn run_query(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    text: &str,
    top_k: Option<usize>,
) -> Result<()> {
    if text.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let collection = open_collection(config).await?;
    let query_vec = embedding::embed_query(embedder, text).await?;
    let hits = collection
        .query(&query_vec, top_k.unwrap_or(config.retrieval.top_k))
        .await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let source = hit
            .metadata
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        let snippet: String = hit.document.chars().take(240).collect();
        println!(
            "{}. [{:.4}] {} #{}",
            i + 1,
            1.0 - hit.distance,
            source,
            hit.id
        );
        println!("    {}", snippet.replace('\n', " "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn test_pool(tmp: &TempDir) -> SqlitePool {
        let mut config = Config::default();
        config.paths.index_storage = tmp.path().join("index");
        let pool = db::connect(&config).await.unwrap();
        migrate::migrate(&pool).await.unwrap();
        pool
    }

    #[test]
    fn sanitize_keeps_primitives_only() {
        let meta = json!({
            "id": "dsm5.pdf",
            "chunk_index": 3,
            "flag": true,
            "none": null,
            "embedding": [0.1, 0.2],
            "input_documents": "raw",
            "nested": { "a": 1 },
            "list": ["a"]
        });
        let clean = sanitize_metadata(meta.as_object().unwrap());
        let mut keys: Vec<&str> = clean.keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(keys, vec!["chunk_index", "flag", "id", "none"]);
    }

    #[tokio::test]
    async fn get_missing_collection_fails() {
        let tmp = TempDir::new().unwrap();
        let pool = test_pool(&tmp).await;
        let err = VectorCollection::get(&pool, COLLECTION_NAME)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn query_returns_nearest_first() {
        let tmp = TempDir::new().unwrap();
        let pool = test_pool(&tmp).await;
        let col = VectorCollection::get_or_create(&pool, COLLECTION_NAME)
            .await
            .unwrap();

        let ids: Vec<String> = vec!["0".into(), "1".into(), "2".into()];
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]];
        let docs: Vec<String> = vec!["east".into(), "north".into(), "diagonal".into()];
        let metas = vec![Map::new(), Map::new(), Map::new()];
        col.add(&ids, &embeddings, &docs, &metas).await.unwrap();
        assert_eq!(col.count().await.unwrap(), 3);

        let hits = col.query(&[0.0, 1.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document, "north");
        assert_eq!(hits[1].document, "diagonal");
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn add_rejects_mismatched_lengths() {
        let tmp = TempDir::new().unwrap();
        let pool = test_pool(&tmp).await;
        let col = VectorCollection::get_or_create(&pool, COLLECTION_NAME)
            .await
            .unwrap();
        let res = col
            .add(&["0".into()], &[], &["d".into()], &[Map::new()])
            .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let pool = test_pool(&tmp).await;
        VectorCollection::get_or_create(&pool, COLLECTION_NAME)
            .await
            .unwrap();
        VectorCollection::get_or_create(&pool, COLLECTION_NAME)
            .await
            .unwrap();
        assert!(VectorCollection::get(&pool, COLLECTION_NAME).await.is_ok());
    }
}
