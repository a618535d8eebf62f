//! Bifrost API Gateway
//!
//! The HTTP entry point for the hybrid retrieval service.
//! Handles:
//! - Dataset ingestion (POST /ingest)
//! - Hybrid question answering (POST /query)
//! - Component health (GET /health)
//! - Observability (logging, metrics, request tracing)

mod handlers;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use bifrost_common::{
    config::{AppConfig, GraphStoreConfig, ObservabilityConfig, VectorStoreConfig},
    embeddings::{build_embedder, MockEmbedder},
    llm::build_chat_model,
    metrics,
    stores::graph::{MemoryGraphStore, Neo4jStore},
    stores::vector::{ChromaStore, MemoryVectorStore},
    ChatModel, Embedder, GraphStore, VectorStore,
};
use bifrost_ingestion::{IngestionPipeline, TripleExtractor};
use bifrost_retrieval::HybridEngine;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<HybridEngine>,
    pub pipeline: Arc<IngestionPipeline>,
    pub chat_model: Arc<dyn ChatModel>,
    pub vector_store: Arc<dyn VectorStore>,
    pub graph_store: Arc<dyn GraphStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Initialize tracing
    init_tracing(&config.observability);

    info!("Starting Bifrost API Gateway v{}", bifrost_common::VERSION);

    // Initialize metrics
    metrics::register_metrics();
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()?;
    info!("Prometheus exporter listening on {}", metrics_addr);

    // Initialize backing components
    let chat_model = build_chat_model(&config.llm);
    let embedder = build_embedder_or_mock(&config);
    let vector_store = build_vector_store(&config.vector_store).await;
    let graph_store = build_graph_store(&config.graph_store).await;

    // Create app state
    let state = AppState {
        config: config.clone(),
        engine: Arc::new(HybridEngine::new(
            chat_model.clone(),
            embedder.clone(),
            vector_store.clone(),
            graph_store.clone(),
            config.retrieval.top_k,
        )),
        pipeline: Arc::new(IngestionPipeline::new(
            embedder,
            vector_store.clone(),
            graph_store.clone(),
            TripleExtractor::new(chat_model.clone()),
            config.ingestion.clone(),
        )),
        chat_model,
        vector_store,
        graph_store,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Build the configured embedder, or fall back to the deterministic mock
/// when configuration is incomplete so the service still starts.
fn build_embedder_or_mock(config: &AppConfig) -> Arc<dyn Embedder> {
    match build_embedder(&config.embedding) {
        Ok(embedder) => embedder,
        Err(e) => {
            warn!(error = %e, "Embedder configuration incomplete, using mock embedder");
            Arc::new(MockEmbedder::new(config.embedding.dimension))
        }
    }
}

/// Connect to Chroma, or fall back to the in-memory store when unreachable.
async fn build_vector_store(config: &VectorStoreConfig) -> Arc<dyn VectorStore> {
    match ChromaStore::connect(config).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "Chroma unreachable, using in-memory vector store");
            Arc::new(MemoryVectorStore::new())
        }
    }
}

/// Connect to Neo4j, or fall back to the in-memory store when unreachable.
async fn build_graph_store(config: &GraphStoreConfig) -> Arc<dyn GraphStore> {
    let store = match Neo4jStore::new(config) {
        Ok(store) => store,
        Err(e) => {
            warn!(error = %e, "Neo4j client setup failed, using in-memory graph store");
            return Arc::new(MemoryGraphStore::new());
        }
    };

    match store.ping().await {
        Ok(()) => {
            info!(url = %config.url, database = %config.database, "Connected to Neo4j");
            Arc::new(store)
        }
        Err(e) => {
            warn!(error = %e, "Neo4j unreachable, using in-memory graph store");
            Arc::new(MemoryGraphStore::new())
        }
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ingest", post(handlers::ingest::ingest))
        .route("/query", post(handlers::query::query))
        .layer(middleware::from_fn(track_request))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Per-request counter and latency histogram
async fn track_request(request: Request, next: Next) -> Response {
    let tracker = metrics::RequestMetrics::start(request.method().as_str(), request.uri().path());
    let response = next.run(request).await;
    tracker.finish(response.status().as_u16());
    response
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use bifrost_common::errors::{AppError, Result};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    /// Chat model that routes by question keyword and answers everything
    /// else with a canned line.
    struct StubModel;

    #[async_trait]
    impl ChatModel for StubModel {
        async fn complete(&self, prompt: &str) -> Result<String> {
            if prompt.contains("Best method is:") {
                let question = prompt
                    .rsplit_once("Question:")
                    .map(|(_, q)| q.to_lowercase())
                    .unwrap_or_default();
                if question.contains("relate") {
                    return Ok("(B) Graph Query".to_string());
                }
                return Ok("(A) Vector Search".to_string());
            }
            if prompt.contains("Cypher Query:") {
                return Ok(
                    "MATCH (f:Entity {name: \"FastAPI\"})-[r]->(t:Entity) RETURN t.name"
                        .to_string(),
                );
            }
            if prompt.contains("extract relationships") {
                return Ok("(FastAPI, uses, Pydantic)".to_string());
            }
            Ok("FastAPI is a modern Python web framework.".to_string())
        }

        fn model_name(&self) -> &str {
            "stub"
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    struct DownModel;

    #[async_trait]
    impl ChatModel for DownModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(AppError::ModelUnavailable {
                message: "no backend".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "down"
        }

        async fn ping(&self) -> Result<()> {
            Err(AppError::ModelUnavailable {
                message: "no backend".to_string(),
            })
        }
    }

    fn test_state(model: Arc<dyn ChatModel>) -> AppState {
        let config = Arc::new(AppConfig::default());
        let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(8));
        let vector_store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
        let graph_store: Arc<dyn GraphStore> = Arc::new(MemoryGraphStore::new());

        AppState {
            config: config.clone(),
            engine: Arc::new(HybridEngine::new(
                model.clone(),
                embedder.clone(),
                vector_store.clone(),
                graph_store.clone(),
                config.retrieval.top_k,
            )),
            pipeline: Arc::new(IngestionPipeline::new(
                embedder,
                vector_store.clone(),
                graph_store.clone(),
                TripleExtractor::new(model.clone()),
                config.ingestion.clone(),
            )),
            chat_model: model,
            vector_store,
            graph_store,
        }
    }

    async fn send_json(app: Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap();
        (status, value)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap();
        (status, value)
    }

    fn sample_text() -> Value {
        json!({
            "text": "FastAPI is a modern Python web framework. FastAPI uses Pydantic \
                     for request validation and supports async handlers.",
            "source": "data.txt",
        })
    }

    #[tokio::test]
    async fn health_reports_all_components_up() {
        let app = create_router(test_state(Arc::new(StubModel)));
        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["components"]["llm"]["status"], "up");
        assert_eq!(body["components"]["vector_store"]["status"], "up");
        assert_eq!(body["components"]["graph_store"]["status"], "up");
    }

    #[tokio::test]
    async fn health_is_degraded_when_model_is_down() {
        let app = create_router(test_state(Arc::new(DownModel)));
        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["components"]["llm"]["status"], "down");
    }

    #[tokio::test]
    async fn ingest_then_definitional_query_uses_vector_search() {
        let state = test_state(Arc::new(StubModel));

        let (status, body) =
            send_json(create_router(state.clone()), "POST", "/ingest", sample_text()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert!(body["chunks_processed"].as_u64().unwrap() > 0);
        assert_eq!(body["chunks_failed"], 0);

        let (status, body) = send_json(
            create_router(state),
            "POST",
            "/query",
            json!({"question": "What is FastAPI?"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["search_method"], "vector");
        assert!(!body["sources"].as_array().unwrap().is_empty());
        assert_eq!(body["sources"][0]["source"], "data.txt");
    }

    #[tokio::test]
    async fn relationship_query_uses_graph_search() {
        let state = test_state(Arc::new(StubModel));
        let (status, _) =
            send_json(create_router(state.clone()), "POST", "/ingest", sample_text()).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send_json(
            create_router(state),
            "POST",
            "/query",
            json!({"question": "How does FastAPI relate to Pydantic?"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["search_method"], "graph");
        assert_eq!(body["sources"][0]["source"], "knowledge_graph");
    }

    #[tokio::test]
    async fn query_before_ingest_is_success_shaped() {
        let app = create_router(test_state(Arc::new(StubModel)));
        let (status, body) = send_json(
            app,
            "POST",
            "/query",
            json!({"question": "What is FastAPI?"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert!(body["sources"].as_array().unwrap().is_empty());
        assert!(body["answer"].as_str().unwrap().contains("ingested"));
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let app = create_router(test_state(Arc::new(StubModel)));
        let (status, body) = send_json(app, "POST", "/query", json!({"question": ""})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn model_outage_maps_to_bad_gateway() {
        let app = create_router(test_state(Arc::new(DownModel)));
        let (status, body) = send_json(
            app,
            "POST",
            "/query",
            json!({"question": "What is FastAPI?"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "MODEL_UNAVAILABLE");
    }

    #[tokio::test]
    async fn missing_dataset_maps_to_not_found() {
        let mut config = AppConfig::default();
        config.ingestion.dataset_path = "does/not/exist.txt".to_string();

        let mut state = test_state(Arc::new(StubModel));
        state.pipeline = Arc::new(IngestionPipeline::new(
            Arc::new(MockEmbedder::new(8)),
            state.vector_store.clone(),
            state.graph_store.clone(),
            TripleExtractor::new(state.chat_model.clone()),
            config.ingestion,
        ));

        let request = Request::builder()
            .method("POST")
            .uri("/ingest")
            .body(Body::empty())
            .unwrap();
        let response = create_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "DATASET_NOT_FOUND");
    }
}
