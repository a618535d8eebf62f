//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: ComponentChecks,
}

#[derive(Serialize)]
pub struct ComponentChecks {
    pub llm: CheckResult,
    pub vector_store: CheckResult,
    pub graph_store: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn from_ping(result: bifrost_common::Result<()>, elapsed_ms: u64) -> Self {
        match result {
            Ok(()) => CheckResult {
                status: "up".to_string(),
                latency_ms: Some(elapsed_ms),
                error: None,
            },
            Err(e) => CheckResult {
                status: "down".to_string(),
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }

    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// Health probe - pings every backing component concurrently.
///
/// Always returns 200: a degraded service can still answer from whichever
/// components remain up, and orchestrators read the status field.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let start = std::time::Instant::now();

    let (llm, vector, graph) = futures::join!(
        state.chat_model.ping(),
        state.vector_store.ping(),
        state.graph_store.ping(),
    );
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let components = ComponentChecks {
        llm: CheckResult::from_ping(llm, elapsed_ms),
        vector_store: CheckResult::from_ping(vector, elapsed_ms),
        graph_store: CheckResult::from_ping(graph, elapsed_ms),
    };

    let all_up = components.llm.is_up()
        && components.vector_store.is_up()
        && components.graph_store.is_up();

    Json(HealthResponse {
        status: if all_up { "healthy" } else { "degraded" }.to_string(),
        components,
    })
}
