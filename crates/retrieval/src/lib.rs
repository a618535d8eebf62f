//! Bifrost retrieval: query routing plus the vector and graph answer paths.

pub mod engine;
pub mod graph_path;
pub mod router;
pub mod vector_path;

pub use engine::{HybridEngine, QueryOutcome};
pub use graph_path::GraphPath;
pub use router::{QueryRouter, Route, RoutingDecision};
pub use vector_path::{PathAnswer, SourceRef, VectorPath};
