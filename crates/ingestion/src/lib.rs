//! Bifrost ingestion
//!
//! Turns source text into retrieval state: fixed-size overlapping chunks
//! embedded into the vector store, and LLM-extracted triples merged into
//! the graph store.

pub mod chunker;
pub mod pipeline;
pub mod triples;

pub use chunker::{chunk_text, ChunkingConfig};
pub use pipeline::{IngestReport, IngestionPipeline};
pub use triples::{parse_triples, TripleExtractor};
