//! Graph retrieval path.
//!
//! Asks the chat model to translate the question into Cypher against the
//! live graph schema, validates the generated query, runs it, and
//! synthesizes an answer from the returned rows. Model output is untrusted:
//! only read queries that survive validation ever reach the store.
//!
//! Execution failures get exactly one repair attempt. The failed query and
//! the store's error message are fed back to the model once; if the second
//! query also fails, the error surfaces to the caller.

use std::sync::Arc;

use bifrost_common::stores::graph::GraphSchema;
use bifrost_common::{AppError, ChatModel, GraphStore, Result};

use crate::vector_path::{PathAnswer, SourceRef};

/// Cypher clauses that mutate the graph. A generated query containing any
/// of these is rejected before execution.
const WRITE_CLAUSES: &[&str] = &[
    "CREATE", "MERGE", "DELETE", "DETACH", "SET", "REMOVE", "DROP", "LOAD", "CALL",
];

/// Answers relationship questions by generating and running Cypher.
pub struct GraphPath {
    store: Arc<dyn GraphStore>,
    model: Arc<dyn ChatModel>,
}

impl GraphPath {
    pub fn new(store: Arc<dyn GraphStore>, model: Arc<dyn ChatModel>) -> Self {
        Self { store, model }
    }

    pub async fn answer(&self, question: &str) -> Result<PathAnswer> {
        let schema = self.store.schema().await?;

        let query = self.generate_query(question, &schema).await?;
        tracing::debug!(%query, "generated graph query");

        let rows = match self.store.run_query(&query).await {
            Ok(rows) => rows,
            Err(AppError::GraphQueryExecution { message }) => {
                tracing::warn!(%query, error = %message, "graph query failed, attempting repair");
                let repaired = self.repair_query(question, &schema, &query, &message).await?;
                tracing::debug!(query = %repaired, "repaired graph query");
                self.store.run_query(&repaired).await?
            }
            Err(other) => return Err(other),
        };

        if rows.is_empty() {
            return Ok(PathAnswer {
                answer: "The knowledge graph contains no data matching this question.".to_string(),
                sources: Vec::new(),
                no_data: false,
            });
        }

        let prompt = synthesis_prompt(question, &rows);
        let answer = self.model.complete(&prompt).await?;

        Ok(PathAnswer {
            answer: answer.trim().to_string(),
            sources: vec![SourceRef::knowledge_graph()],
            no_data: false,
        })
    }

    async fn generate_query(&self, question: &str, schema: &GraphSchema) -> Result<String> {
        let prompt = cypher_prompt(question, schema);
        let response =
            self.model
                .complete(&prompt)
                .await
                .map_err(|err| AppError::GraphQueryGeneration {
                    message: format!("model call failed: {err}"),
                })?;
        extract_query(&response)
    }

    async fn repair_query(
        &self,
        question: &str,
        schema: &GraphSchema,
        failed_query: &str,
        error: &str,
    ) -> Result<String> {
        let prompt = format!(
            "The following Cypher query failed to execute.\n\n\
             Question: {question}\n\
             Schema: {schema}\n\
             Failed query: {failed_query}\n\
             Error: {error}\n\n\
             Write a corrected read-only Cypher query that answers the question. \
             Return only the query.\n\
             Cypher Query:",
            schema = schema.describe(),
        );
        let response =
            self.model
                .complete(&prompt)
                .await
                .map_err(|err| AppError::GraphQueryGeneration {
                    message: format!("repair call failed: {err}"),
                })?;
        extract_query(&response)
    }
}

/// Pull a validated Cypher query out of the model's response.
///
/// Strips markdown code fences and a leading `Cypher:` label, then checks
/// that the query is a read: it must start with `MATCH` or `OPTIONAL MATCH`
/// and must not contain any write clause.
pub fn extract_query(response: &str) -> Result<String> {
    let mut text = response.trim();

    if let Some(stripped) = text.strip_prefix("```") {
        // Drop the fence language tag ("cypher", "sql", ...) if present.
        let body = stripped.split_once('\n').map(|(_, rest)| rest).unwrap_or(stripped);
        text = body.trim_end_matches('`').trim();
    }
    if let Some(rest) = text.strip_prefix("Cypher:") {
        text = rest.trim();
    }
    if let Some(rest) = text.strip_prefix("Cypher Query:") {
        text = rest.trim();
    }

    let query = text.trim().to_string();
    if query.is_empty() {
        return Err(AppError::GraphQueryGeneration {
            message: "model returned an empty query".to_string(),
        });
    }

    let upper = query.to_uppercase();
    if !(upper.starts_with("MATCH") || upper.starts_with("OPTIONAL MATCH")) {
        return Err(AppError::GraphQueryGeneration {
            message: format!("generated query is not a read query: {query}"),
        });
    }

    for token in upper.split(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
        if WRITE_CLAUSES.contains(&token) {
            return Err(AppError::GraphQueryGeneration {
                message: format!("generated query contains forbidden clause {token}: {query}"),
            });
        }
    }

    Ok(query)
}

fn cypher_prompt(question: &str, schema: &GraphSchema) -> String {
    format!(
        "You are a Neo4j expert. Given an input question, create a syntactically correct Cypher query.\n\n\
         Schema: {schema}\n\n\
         Question: {question}\n\n\
         Only use the relationship types and properties that appear in the schema.\n\
         Do not use any other relationship types or properties.\n\n\
         Examples:\n\
         Question: What parameters does the get function accept?\n\
         Cypher: MATCH (f:Entity {{name: \"get\"}})-[:ACCEPTS_PARAMETER]->(p:Entity) RETURN p.name\n\n\
         Question: What components does FastAPI have?\n\
         Cypher: MATCH (f:Entity {{name: \"FastAPI\"}})-[:HAS_COMPONENT]->(c:Entity) RETURN c.name\n\n\
         Cypher Query:",
        schema = schema.describe(),
    )
}

fn synthesis_prompt(question: &str, rows: &[serde_json::Value]) -> String {
    let mut facts = String::new();
    for row in rows {
        facts.push_str(&row.to_string());
        facts.push('\n');
    }
    format!(
        "Answer the question using only the graph query results below.\n\n\
         Results:\n{facts}\nQuestion: {question}\nAnswer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bifrost_common::llm::ScriptedChatModel;
    use bifrost_common::stores::graph::{MemoryGraphStore, Triple};
    use serde_json::json;

    fn scripted(responses: &[&str]) -> Arc<dyn ChatModel> {
        Arc::new(ScriptedChatModel::new(
            responses.iter().map(|s| s.to_string()).collect(),
        ))
    }

    #[test]
    fn extracts_plain_query() {
        let query = extract_query("MATCH (n:Entity) RETURN n.name").unwrap();
        assert_eq!(query, "MATCH (n:Entity) RETURN n.name");
    }

    #[test]
    fn strips_fences_and_labels() {
        let query = extract_query("```cypher\nMATCH (n:Entity) RETURN n.name\n```").unwrap();
        assert_eq!(query, "MATCH (n:Entity) RETURN n.name");

        let query = extract_query("Cypher: MATCH (n:Entity) RETURN n").unwrap();
        assert_eq!(query, "MATCH (n:Entity) RETURN n");
    }

    #[test]
    fn rejects_write_queries() {
        for bad in [
            "CREATE (n:Entity {name: \"x\"})",
            "MATCH (n) DELETE n",
            "MATCH (n) SET n.name = \"x\" RETURN n",
            "MATCH (n) WITH n MERGE (m:Entity {name: \"y\"}) RETURN m",
        ] {
            let err = extract_query(bad).unwrap_err();
            assert!(
                matches!(err, AppError::GraphQueryGeneration { .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_prose_responses() {
        let err = extract_query("I cannot write that query, sorry.").unwrap_err();
        assert!(matches!(err, AppError::GraphQueryGeneration { .. }));
    }

    #[tokio::test]
    async fn answers_from_graph_rows() {
        let store = Arc::new(MemoryGraphStore::new());
        store
            .merge_triple(&Triple::sanitized("FastAPI", "USES", "Pydantic").unwrap())
            .await
            .unwrap();

        let model = scripted(&[
            "MATCH (f:Entity {name: \"FastAPI\"})-[r]->(t:Entity) RETURN t.name",
            "FastAPI uses Pydantic for request validation.",
        ]);

        let path = GraphPath::new(store, model);
        let result = path.answer("How does FastAPI relate to Pydantic?").await.unwrap();
        assert_eq!(result.answer, "FastAPI uses Pydantic for request validation.");
        assert_eq!(result.sources, vec![SourceRef::knowledge_graph()]);
    }

    #[tokio::test]
    async fn empty_result_is_success_not_error() {
        let store = Arc::new(MemoryGraphStore::new());
        let model = scripted(&["MATCH (f:Entity {name: \"Django\"})-[r]->(t) RETURN t.name"]);

        let path = GraphPath::new(store, model);
        let result = path.answer("What does Django use?").await.unwrap();
        assert!(result.answer.contains("no data"));
        assert!(result.sources.is_empty());
    }

    #[tokio::test]
    async fn execution_failure_gets_one_repair_attempt() {
        let store = Arc::new(
            MemoryGraphStore::new()
                .with_canned_rows(vec![json!({"t.name": "Pydantic"})])
                .with_failing_queries(),
        );
        // Both the original and repaired queries will fail against this
        // store, so the error must surface after the single retry.
        let model = scripted(&[
            "MATCH (f:Entity) RETURN f.name",
            "MATCH (g:Entity) RETURN g.name",
        ]);

        let path = GraphPath::new(store, model);
        let err = path.answer("What does FastAPI use?").await.unwrap_err();
        assert!(matches!(err, AppError::GraphQueryExecution { .. }));
    }

    #[tokio::test]
    async fn generation_failure_is_distinct_from_execution_failure() {
        let store = Arc::new(MemoryGraphStore::new());
        let model = scripted(&["DROP DATABASE neo4j"]);

        let path = GraphPath::new(store, model);
        let err = path.answer("What does FastAPI use?").await.unwrap_err();
        assert!(matches!(err, AppError::GraphQueryGeneration { .. }));
    }
}
