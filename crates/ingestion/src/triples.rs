//! LLM triple extraction
//!
//! Asks the chat model to pull (subject, relation, object) facts out of a
//! chunk. Model output is untrusted: it is parsed with a strict pattern and
//! sanitized; lines that do not parse are skipped. Zero triples for a chunk
//! is not an error.

use bifrost_common::errors::Result;
use bifrost_common::llm::ChatModel;
use bifrost_common::stores::Triple;
use regex_lite::Regex;
use std::sync::Arc;

/// Extracts triples from chunk text via a chat model
pub struct TripleExtractor {
    model: Arc<dyn ChatModel>,
}

impl TripleExtractor {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Build the extraction prompt for a chunk
    fn extraction_prompt(chunk: &str) -> String {
        format!(
            "From the text below, extract relationships as triples (HEAD, RELATION, TAIL).\n\
             Examples: (FastAPI, HAS_COMPONENT, routers), (routers, ENABLES, organization), \
             (Pydantic, PROVIDES, validation).\n\n\
             Text: '{}'\n\n\
             Extract only clear, factual relationships. Format as: (entity1, relationship, entity2)\n\n\
             Triples:\n",
            chunk
        )
    }

    /// Extract triples from a chunk, best-effort
    pub async fn extract(&self, chunk: &str) -> Result<Vec<Triple>> {
        let prompt = Self::extraction_prompt(chunk);
        let response = self.model.complete(&prompt).await?;
        Ok(parse_triples(&response))
    }
}

/// Parse `(a, b, c)` patterns out of model output, skipping malformed lines
pub fn parse_triples(response: &str) -> Vec<Triple> {
    // Regex is infallible on this literal pattern
    let pattern = Regex::new(r"\(([^,()]+),\s*([^,()]+),\s*([^()]+)\)")
        .expect("triple pattern is valid");

    let mut triples = Vec::new();
    for line in response.lines() {
        if let Some(captures) = pattern.captures(line) {
            let (Some(head), Some(relation), Some(tail)) =
                (captures.get(1), captures.get(2), captures.get(3))
            else {
                continue;
            };

            if let Some(triple) =
                Triple::sanitized(head.as_str(), relation.as_str(), tail.as_str())
            {
                triples.push(triple);
            }
        }
    }

    triples
}
