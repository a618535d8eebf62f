//! Vector retrieval path.
//!
//! Embeds the question, pulls the top-k nearest chunks from the vector
//! store, and asks the chat model to answer from that context only. An
//! empty store is not an error: it produces an explicit "nothing ingested"
//! answer so callers can tell it apart from a real retrieval failure.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use bifrost_common::stores::vector::ScoredChunk;
use bifrost_common::{ChatModel, Embedder, Result, VectorStore};

/// Provenance reference attached to an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
}

impl SourceRef {
    pub fn chunk(source: impl Into<String>, chunk_id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            chunk_id: Some(chunk_id.into()),
        }
    }

    pub fn knowledge_graph() -> Self {
        Self {
            source: "knowledge_graph".to_string(),
            chunk_id: None,
        }
    }
}

/// Answer produced by one retrieval path.
#[derive(Debug, Clone)]
pub struct PathAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    /// True when no corpus exists at all and nothing was retrieved.
    pub no_data: bool,
}

/// Answers questions from the chunk corpus via nearest-neighbor search.
pub struct VectorPath {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    model: Arc<dyn ChatModel>,
    top_k: usize,
}

impl VectorPath {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        model: Arc<dyn ChatModel>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            model,
            top_k,
        }
    }

    pub async fn answer(&self, question: &str) -> Result<PathAnswer> {
        if self.store.count().await? == 0 {
            tracing::info!("vector store is empty, nothing to retrieve");
            return Ok(PathAnswer {
                answer: "No documents have been ingested yet. Ingest a dataset before querying."
                    .to_string(),
                sources: Vec::new(),
                no_data: true,
            });
        }

        let embedding = self.embedder.embed(question).await?;
        let hits = self.store.query(&embedding, self.top_k).await?;

        if hits.is_empty() {
            return Ok(PathAnswer {
                answer: "No relevant information was found for this question.".to_string(),
                sources: Vec::new(),
                no_data: false,
            });
        }

        let prompt = synthesis_prompt(question, &hits);
        let answer = self.model.complete(&prompt).await?;

        let sources = hits
            .iter()
            .map(|hit| SourceRef::chunk(hit.record.source.clone(), hit.record.id.clone()))
            .collect();

        Ok(PathAnswer {
            answer: answer.trim().to_string(),
            sources,
            no_data: false,
        })
    }
}

fn synthesis_prompt(question: &str, hits: &[ScoredChunk]) -> String {
    let mut context = String::new();
    for (i, hit) in hits.iter().enumerate() {
        context.push_str(&format!("[{}] {}\n", i + 1, hit.record.content));
    }
    format!(
        "Answer the question using only the context below. \
         If the context does not contain the answer, say so.\n\n\
         Context:\n{context}\nQuestion: {question}\nAnswer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bifrost_common::embeddings::MockEmbedder;
    use bifrost_common::llm::ScriptedChatModel;
    use bifrost_common::stores::vector::{ChunkRecord, MemoryVectorStore};

    fn scripted(answer: &str) -> Arc<dyn ChatModel> {
        Arc::new(ScriptedChatModel::new(vec![answer.to_string()]))
    }

    async fn seeded_store(embedder: &MockEmbedder) -> Arc<MemoryVectorStore> {
        let store = Arc::new(MemoryVectorStore::new());
        let chunks = [
            "FastAPI is a modern Python web framework.",
            "Pydantic validates request models.",
            "Uvicorn serves ASGI applications.",
        ];
        let mut batch = Vec::new();
        for (i, content) in chunks.iter().enumerate() {
            let embedding = embedder.embed(content).await.unwrap();
            batch.push((ChunkRecord::new("data.txt", i, content.to_string()), embedding));
        }
        store.upsert(&batch).await.unwrap();
        store
    }

    #[tokio::test]
    async fn empty_store_is_no_data_not_error() {
        let path = VectorPath::new(
            Arc::new(MockEmbedder::new(8)),
            Arc::new(MemoryVectorStore::new()),
            scripted("unused"),
            3,
        );
        let result = path.answer("What is FastAPI?").await.unwrap();
        assert!(result.no_data);
        assert!(result.sources.is_empty());
        assert!(result.answer.contains("ingested"));
    }

    #[tokio::test]
    async fn answers_carry_chunk_sources() {
        let embedder = MockEmbedder::new(8);
        let store = seeded_store(&embedder).await;
        let path = VectorPath::new(
            Arc::new(embedder),
            store,
            scripted("FastAPI is a Python web framework."),
            2,
        );

        let result = path.answer("What is FastAPI?").await.unwrap();
        assert!(!result.no_data);
        assert_eq!(result.sources.len(), 2);
        for source in &result.sources {
            assert_eq!(source.source, "data.txt");
            assert!(source.chunk_id.is_some());
        }
        assert_eq!(result.answer, "FastAPI is a Python web framework.");
    }

    #[test]
    fn retrieved_context_reaches_the_prompt() {
        let hits = vec![ScoredChunk {
            record: ChunkRecord::new("data.txt", 0, "FastAPI uses Pydantic.".to_string()),
            score: 0.9,
        }];
        let prompt = synthesis_prompt("What does FastAPI use?", &hits);
        assert!(prompt.contains("[1] FastAPI uses Pydantic."));
        assert!(prompt.contains("What does FastAPI use?"));
    }
}
