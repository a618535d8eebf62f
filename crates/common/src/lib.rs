//! Bifrost Common Library
//!
//! Shared code for the Bifrost hybrid retrieval service:
//! - Configuration management
//! - Error types and handling
//! - Chat model client abstraction (with provider fallback chain)
//! - Embedding client abstraction
//! - Vector and graph store clients
//! - Metrics and observability

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod stores;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::ChatModel;
pub use stores::{GraphStore, VectorStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default vector-store collection name
pub const DEFAULT_COLLECTION: &str = "hybrid_rag_collection";
