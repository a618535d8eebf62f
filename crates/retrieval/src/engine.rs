//! Hybrid retrieval engine.
//!
//! Routes each question to the vector or graph path and wraps the result
//! with the route that produced it.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use bifrost_common::{metrics, ChatModel, Embedder, GraphStore, Result, VectorStore};

use crate::graph_path::GraphPath;
use crate::router::{QueryRouter, Route};
use crate::vector_path::{SourceRef, VectorPath};

/// Final answer returned to the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub answer: String,
    pub search_method: String,
    pub sources: Vec<SourceRef>,
    #[serde(skip)]
    pub no_data: bool,
}

/// Composes the router and both retrieval paths.
pub struct HybridEngine {
    router: QueryRouter,
    vector_path: VectorPath,
    graph_path: GraphPath,
}

impl HybridEngine {
    pub fn new(
        model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        graph_store: Arc<dyn GraphStore>,
        top_k: usize,
    ) -> Self {
        Self {
            router: QueryRouter::new(model.clone()),
            vector_path: VectorPath::new(embedder, vector_store, model.clone(), top_k),
            graph_path: GraphPath::new(graph_store, model),
        }
    }

    pub async fn query(&self, question: &str) -> Result<QueryOutcome> {
        let start = Instant::now();
        let decision = self.router.route(question).await?;

        let path_answer = match decision.route {
            Route::Vector => self.vector_path.answer(question).await?,
            Route::Graph => self.graph_path.answer(question).await?,
        };

        metrics::record_query(
            start.elapsed().as_secs_f64(),
            decision.route.as_str(),
            path_answer.sources.len(),
        );
        tracing::info!(
            route = %decision.route,
            sources = path_answer.sources.len(),
            no_data = path_answer.no_data,
            "query answered"
        );

        Ok(QueryOutcome {
            answer: path_answer.answer,
            search_method: decision.route.as_str().to_string(),
            sources: path_answer.sources,
            no_data: path_answer.no_data,
        })
    }
}
