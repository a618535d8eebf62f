//! External store clients
//!
//! Both stores sit behind traits so the retrieval and ingestion paths can be
//! exercised against in-memory fakes. Clients are constructed once at process
//! start and injected; there are no ambient singletons.

pub mod graph;
pub mod vector;

pub use graph::{GraphSchema, GraphStore, MemoryGraphStore, Neo4jStore, Triple};
pub use vector::{ChromaStore, ChunkRecord, MemoryVectorStore, ScoredChunk, VectorStore};
