//! Ingestion pipeline
//!
//! Populates both stores from a source text: every chunk is embedded and
//! upserted into the vector store, and triples extracted from it are merged
//! into the graph. Per-chunk failures are logged and skipped; they never
//! abort the batch.

use crate::chunker::{chunk_text, ChunkingConfig};
use crate::triples::TripleExtractor;
use bifrost_common::config::IngestionConfig;
use bifrost_common::embeddings::Embedder;
use bifrost_common::errors::{AppError, Result};
use bifrost_common::metrics;
use bifrost_common::stores::{ChunkRecord, GraphStore, VectorStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Outcome of one ingestion batch
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Chunks embedded and upserted into the vector store
    pub chunks_processed: usize,

    /// Chunks skipped due to embedding or upsert failure
    pub chunks_failed: usize,

    /// Triples merged into the graph store
    pub triples_extracted: usize,
}

/// Ingestion pipeline over injected store and model clients
pub struct IngestionPipeline {
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    graph_store: Arc<dyn GraphStore>,
    extractor: TripleExtractor,
    config: IngestionConfig,
}

impl IngestionPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        graph_store: Arc<dyn GraphStore>,
        extractor: TripleExtractor,
        config: IngestionConfig,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            graph_store,
            extractor,
            config,
        }
    }

    /// Ingest the configured dataset file
    pub async fn ingest_dataset(&self) -> Result<IngestReport> {
        let path = &self.config.dataset_path;
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::DatasetNotFound { path: path.clone() }
            } else {
                AppError::Internal {
                    message: format!("Failed to read dataset {}: {}", path, e),
                }
            }
        })?;

        self.ingest_text(&text, path).await
    }

    /// Ingest raw source text tagged with a source identifier
    pub async fn ingest_text(&self, text: &str, source: &str) -> Result<IngestReport> {
        let start = Instant::now();

        let chunking = ChunkingConfig {
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
        };
        let chunks = chunk_text(text, &chunking)?;

        info!(source = %source, chunk_count = chunks.len(), "Starting ingestion");

        let mut chunks_processed = 0;
        let mut chunks_failed = 0;
        let mut triples_extracted = 0;

        for (index, chunk) in chunks.iter().enumerate() {
            // Vector side: a failure drops this chunk's embedding record
            // but not the rest of the batch.
            match self.embed_and_upsert(source, index, chunk).await {
                Ok(()) => chunks_processed += 1,
                Err(e) => {
                    warn!(chunk_index = index, error = %e, "Skipping chunk embedding");
                    chunks_failed += 1;
                }
            }

            // Graph side: extraction is best-effort; zero triples is fine.
            match self.extractor.extract(chunk).await {
                Ok(triples) => {
                    for triple in &triples {
                        if let Err(e) = self.graph_store.merge_triple(triple).await {
                            warn!(
                                chunk_index = index,
                                head = %triple.head,
                                error = %e,
                                "Skipping triple merge"
                            );
                            continue;
                        }
                        triples_extracted += 1;
                    }
                }
                Err(e) => {
                    warn!(chunk_index = index, error = %e, "Triple extraction failed for chunk");
                }
            }
        }

        let duration = start.elapsed();
        metrics::record_ingestion(
            duration.as_secs_f64(),
            chunks_processed,
            chunks_failed,
            triples_extracted,
        );

        info!(
            source = %source,
            chunks_processed,
            chunks_failed,
            triples_extracted,
            duration_ms = duration.as_millis() as u64,
            "Ingestion completed"
        );

        Ok(IngestReport {
            chunks_processed,
            chunks_failed,
            triples_extracted,
        })
    }

    async fn embed_and_upsert(&self, source: &str, index: usize, chunk: &str) -> Result<()> {
        let embedding = self.embedder.embed(chunk).await?;
        let record = ChunkRecord::new(source, index, chunk.to_string());
        self.vector_store.upsert(&[(record, embedding)]).await
    }
}
