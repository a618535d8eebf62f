//! Vector store clients
//!
//! A single global collection holds one embedding record per chunk. Chunk
//! identifiers are content hashes, so re-ingesting the same source with the
//! same chunking parameters upserts in place instead of duplicating.

use crate::config::VectorStoreConfig;
use crate::errors::{AppError, Result, StoreKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// A chunk's text plus the metadata stored alongside its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Stable chunk identifier (content hash)
    pub id: String,

    /// Chunk text
    pub content: String,

    /// Source identifier (dataset path)
    pub source: String,

    /// Sequential index within the source
    pub chunk_index: usize,
}

impl ChunkRecord {
    /// Build a record with a stable identifier derived from source, index,
    /// and content. Identical inputs always map to the same id.
    pub fn new(source: &str, chunk_index: usize, content: String) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(chunk_index.to_le_bytes());
        hasher.update(content.as_bytes());
        let id = hex::encode(&hasher.finalize()[..16]);

        Self {
            id,
            content,
            source: source.to_string(),
            chunk_index,
        }
    }
}

/// A retrieved chunk with its similarity score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub record: ChunkRecord,
    pub score: f32,
}

/// Trait for vector similarity stores
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert embedding records keyed by chunk id
    async fn upsert(&self, records: &[(ChunkRecord, Vec<f32>)]) -> Result<()>;

    /// Top-k nearest-neighbor lookup
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of records in the collection
    async fn count(&self) -> Result<usize>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<()>;
}

/// Chroma HTTP client
pub struct ChromaStore {
    client: reqwest::Client,
    base_url: String,
    collection_id: String,
}

#[derive(Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    get_or_create: bool,
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Serialize)]
struct UpsertRequest {
    ids: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    documents: Vec<String>,
    metadatas: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_embeddings: Vec<&'a [f32]>,
    n_results: usize,
    include: Vec<&'static str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    documents: Vec<Vec<String>>,
    metadatas: Vec<Vec<serde_json::Value>>,
    distances: Vec<Vec<f32>>,
}

impl ChromaStore {
    /// Connect to Chroma and resolve (or create) the collection
    pub async fn connect(config: &VectorStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let url = format!("{}/api/v1/collections", config.url);
        let response = client
            .post(&url)
            .json(&CreateCollectionRequest {
                name: &config.collection,
                get_or_create: true,
            })
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable {
                store: StoreKind::Vector,
                message: format!("Failed to reach Chroma: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StoreUnavailable {
                store: StoreKind::Vector,
                message: format!("Collection setup failed {}: {}", status, body),
            });
        }

        let collection: CollectionResponse =
            response.json().await.map_err(|e| AppError::StoreUnavailable {
                store: StoreKind::Vector,
                message: format!("Failed to parse collection response: {}", e),
            })?;

        tracing::info!(
            collection = %config.collection,
            collection_id = %collection.id,
            "Connected to Chroma"
        );

        Ok(Self {
            client,
            base_url: config.url.clone(),
            collection_id: collection.id,
        })
    }

    fn store_error(e: reqwest::Error) -> AppError {
        AppError::StoreUnavailable {
            store: StoreKind::Vector,
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn upsert(&self, records: &[(ChunkRecord, Vec<f32>)]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/api/v1/collections/{}/upsert",
            self.base_url, self.collection_id
        );

        let request = UpsertRequest {
            ids: records.iter().map(|(r, _)| r.id.clone()).collect(),
            embeddings: records.iter().map(|(_, e)| e.clone()).collect(),
            documents: records.iter().map(|(r, _)| r.content.clone()).collect(),
            metadatas: records
                .iter()
                .map(|(r, _)| {
                    serde_json::json!({
                        "source": r.source,
                        "chunk_index": r.chunk_index,
                    })
                })
                .collect(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(Self::store_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StoreUnavailable {
                store: StoreKind::Vector,
                message: format!("Upsert failed {}: {}", status, body),
            });
        }

        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let url = format!(
            "{}/api/v1/collections/{}/query",
            self.base_url, self.collection_id
        );

        let request = QueryRequest {
            query_embeddings: vec![embedding],
            n_results: k,
            include: vec!["documents", "metadatas", "distances"],
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(Self::store_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StoreUnavailable {
                store: StoreKind::Vector,
                message: format!("Query failed {}: {}", status, body),
            });
        }

        let result: QueryResponse =
            response.json().await.map_err(|e| AppError::StoreUnavailable {
                store: StoreKind::Vector,
                message: format!("Failed to parse query response: {}", e),
            })?;

        let (Some(ids), Some(documents), Some(metadatas), Some(distances)) = (
            result.ids.into_iter().next(),
            result.documents.into_iter().next(),
            result.metadatas.into_iter().next(),
            result.distances.into_iter().next(),
        ) else {
            return Ok(vec![]);
        };

        let chunks = ids
            .into_iter()
            .zip(documents)
            .zip(metadatas)
            .zip(distances)
            .map(|(((id, content), metadata), distance)| {
                let source = metadata
                    .get("source")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let chunk_index = metadata
                    .get("chunk_index")
                    .and_then(|v| v.as_u64())
                    .unwrap_or_default() as usize;

                ScoredChunk {
                    record: ChunkRecord {
                        id,
                        content,
                        source,
                        chunk_index,
                    },
                    // Chroma returns distances; invert to a similarity score
                    score: 1.0 - distance,
                }
            })
            .collect();

        Ok(chunks)
    }

    async fn count(&self) -> Result<usize> {
        let url = format!(
            "{}/api/v1/collections/{}/count",
            self.base_url, self.collection_id
        );

        let response = self.client.get(&url).send().await.map_err(Self::store_error)?;

        if !response.status().is_success() {
            return Err(AppError::StoreUnavailable {
                store: StoreKind::Vector,
                message: format!("Count failed: {}", response.status()),
            });
        }

        response.json::<usize>().await.map_err(|e| AppError::StoreUnavailable {
            store: StoreKind::Vector,
            message: format!("Failed to parse count: {}", e),
        })
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/api/v1/heartbeat", self.base_url);
        let response = self.client.get(&url).send().await.map_err(Self::store_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::StoreUnavailable {
                store: StoreKind::Vector,
                message: format!("Heartbeat returned {}", response.status()),
            })
        }
    }
}

/// In-memory vector store for development and tests
///
/// Cosine similarity over a HashMap; upsert-by-id semantics match Chroma.
#[derive(Default)]
pub struct MemoryVectorStore {
    records: RwLock<HashMap<String, (ChunkRecord, Vec<f32>)>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, records: &[(ChunkRecord, Vec<f32>)]) -> Result<()> {
        let mut guard = self.records.write().map_err(|_| AppError::Internal {
            message: "Vector store lock poisoned".to_string(),
        })?;
        for (record, embedding) in records {
            guard.insert(record.id.clone(), (record.clone(), embedding.clone()));
        }
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let guard = self.records.read().map_err(|_| AppError::Internal {
            message: "Vector store lock poisoned".to_string(),
        })?;

        let mut scored: Vec<ScoredChunk> = guard
            .values()
            .map(|(record, stored)| ScoredChunk {
                record: record.clone(),
                score: Self::cosine(embedding, stored),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize> {
        let guard = self.records.read().map_err(|_| AppError::Internal {
            message: "Vector store lock poisoned".to_string(),
        })?;
        Ok(guard.len())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_is_stable() {
        let a = ChunkRecord::new("data.txt", 0, "hello world".to_string());
        let b = ChunkRecord::new("data.txt", 0, "hello world".to_string());
        let c = ChunkRecord::new("data.txt", 1, "hello world".to_string());
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[tokio::test]
    async fn test_memory_store_upsert_is_idempotent() {
        let store = MemoryVectorStore::new();
        let record = ChunkRecord::new("data.txt", 0, "hello".to_string());
        let batch = vec![(record, vec![1.0, 0.0])];

        store.upsert(&batch).await.unwrap();
        store.upsert(&batch).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_query_orders_by_similarity() {
        let store = MemoryVectorStore::new();
        store
            .upsert(&[
                (ChunkRecord::new("d", 0, "close".to_string()), vec![1.0, 0.0]),
                (ChunkRecord::new("d", 1, "far".to_string()), vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.query(&[1.0, 0.1], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.content, "close");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_memory_store_empty_query() {
        let store = MemoryVectorStore::new();
        let results = store.query(&[1.0, 0.0], 3).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
