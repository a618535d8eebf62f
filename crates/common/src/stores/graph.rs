//! Graph store clients
//!
//! Entities are nodes keyed by name; triples become directed, labeled edges.
//! Relation labels come from model output, so they are validated against a
//! strict charset before being interpolated into any Cypher statement.

use crate::config::GraphStoreConfig;
use crate::errors::{AppError, Result, StoreKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::RwLock;
use std::time::Duration;

/// An extracted (subject, relation, object) fact
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub head: String,
    pub relation: String,
    pub tail: String,
}

impl Triple {
    /// Sanitize raw extraction output into a storable triple.
    ///
    /// Entity names are stripped of quotes and trimmed; the relation is
    /// upper-snake-cased and restricted to `[A-Z0-9_]`. Returns `None` when
    /// any part ends up empty - the caller skips such triples.
    pub fn sanitized(head: &str, relation: &str, tail: &str) -> Option<Self> {
        let clean_entity = |s: &str| s.replace(['"', '\''], "").trim().to_string();

        let head = clean_entity(head);
        let tail = clean_entity(tail);
        let relation: String = relation
            .replace(['"', '\''], "")
            .trim()
            .to_uppercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let relation = relation.trim_matches('_').to_string();

        if head.is_empty() || tail.is_empty() || relation.is_empty() {
            return None;
        }

        Some(Self { head, relation, tail })
    }
}

/// Node label and relationship-type vocabulary of the graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSchema {
    pub labels: Vec<String>,
    pub relationship_types: Vec<String>,
}

impl GraphSchema {
    /// Render the schema for inclusion in a query-generation prompt
    pub fn describe(&self) -> String {
        format!(
            "Node labels: {}\nRelationship types: {}",
            if self.labels.is_empty() {
                "(none)".to_string()
            } else {
                self.labels.join(", ")
            },
            if self.relationship_types.is_empty() {
                "(none)".to_string()
            } else {
                self.relationship_types.join(", ")
            },
        )
    }
}

/// Trait for property graph stores
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Merge a triple: both entity nodes and the relation edge, idempotently
    async fn merge_triple(&self, triple: &Triple) -> Result<()>;

    /// Execute a read query, returning one JSON object per row
    async fn run_query(&self, query: &str) -> Result<Vec<serde_json::Value>>;

    /// Current node/edge vocabulary
    async fn schema(&self) -> Result<GraphSchema>;

    /// Number of entity nodes
    async fn node_count(&self) -> Result<usize>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<()>;
}

/// Neo4j client over the HTTP transactional Cypher endpoint
pub struct Neo4jStore {
    client: reqwest::Client,
    base_url: String,
    database: String,
    user: String,
    password: String,
}

#[derive(Serialize)]
struct CypherStatements {
    statements: Vec<CypherStatement>,
}

#[derive(Serialize)]
struct CypherStatement {
    statement: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct CypherResponse {
    results: Vec<CypherResult>,
    errors: Vec<CypherError>,
}

#[derive(Deserialize)]
struct CypherResult {
    columns: Vec<String>,
    data: Vec<CypherRow>,
}

#[derive(Deserialize)]
struct CypherRow {
    row: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct CypherError {
    code: String,
    message: String,
}

impl Neo4jStore {
    /// Create a new Neo4j HTTP client
    pub fn new(config: &GraphStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.url.clone(),
            database: config.database.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    async fn commit(
        &self,
        statements: Vec<CypherStatement>,
    ) -> Result<Vec<CypherResult>> {
        let url = format!("{}/db/{}/tx/commit", self.base_url, self.database);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&CypherStatements { statements })
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable {
                store: StoreKind::Graph,
                message: format!("Failed to reach Neo4j: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StoreUnavailable {
                store: StoreKind::Graph,
                message: format!("Transaction failed {}: {}", status, body),
            });
        }

        let cypher: CypherResponse =
            response.json().await.map_err(|e| AppError::StoreUnavailable {
                store: StoreKind::Graph,
                message: format!("Failed to parse response: {}", e),
            })?;

        // Statement-level errors come back with HTTP 200; a syntax error in
        // a generated query lands here, not as a transport failure.
        if let Some(err) = cypher.errors.first() {
            return Err(AppError::GraphQueryExecution {
                message: format!("{}: {}", err.code, err.message),
            });
        }

        Ok(cypher.results)
    }

    fn rows_to_objects(result: CypherResult) -> Vec<serde_json::Value> {
        result
            .data
            .into_iter()
            .map(|row| {
                let mut object = serde_json::Map::new();
                for (column, value) in result.columns.iter().zip(row.row) {
                    object.insert(column.clone(), value);
                }
                serde_json::Value::Object(object)
            })
            .collect()
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn merge_triple(&self, triple: &Triple) -> Result<()> {
        // Relation labels were sanitized to [A-Z0-9_] but this is the last
        // line before interpolation, so enforce it again here.
        if triple.relation.is_empty()
            || !triple
                .relation
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(AppError::Validation {
                message: format!("Invalid relation label: {}", triple.relation),
                field: Some("relation".to_string()),
            });
        }

        let statement = format!(
            "MERGE (h:Entity {{name: $head}}) MERGE (t:Entity {{name: $tail}}) MERGE (h)-[:{}]->(t)",
            triple.relation
        );

        self.commit(vec![CypherStatement {
            statement,
            parameters: Some(serde_json::json!({
                "head": triple.head,
                "tail": triple.tail,
            })),
        }])
        .await?;

        Ok(())
    }

    async fn run_query(&self, query: &str) -> Result<Vec<serde_json::Value>> {
        let results = self
            .commit(vec![CypherStatement {
                statement: query.to_string(),
                parameters: None,
            }])
            .await?;

        Ok(results
            .into_iter()
            .next()
            .map(Self::rows_to_objects)
            .unwrap_or_default())
    }

    async fn schema(&self) -> Result<GraphSchema> {
        let results = self
            .commit(vec![
                CypherStatement {
                    statement: "CALL db.labels() YIELD label RETURN label".to_string(),
                    parameters: None,
                },
                CypherStatement {
                    statement: "CALL db.relationshipTypes() YIELD relationshipType RETURN relationshipType"
                        .to_string(),
                    parameters: None,
                },
            ])
            .await?;

        let mut iter = results.into_iter();
        let extract = |result: Option<CypherResult>| -> Vec<String> {
            result
                .map(|r| {
                    r.data
                        .into_iter()
                        .filter_map(|row| {
                            row.row.into_iter().next().and_then(|v| {
                                v.as_str().map(str::to_string)
                            })
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        Ok(GraphSchema {
            labels: extract(iter.next()),
            relationship_types: extract(iter.next()),
        })
    }

    async fn node_count(&self) -> Result<usize> {
        let rows = self
            .run_query("MATCH (n:Entity) RETURN count(n) AS count")
            .await?;

        Ok(rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(|v| v.as_u64())
            .unwrap_or_default() as usize)
    }

    async fn ping(&self) -> Result<()> {
        self.run_query("RETURN 1 AS ok").await.map(|_| ())
    }
}

/// In-memory graph store for development and tests
///
/// Keeps merge semantics (sets keyed by entity string and triple) and
/// answers queries by matching entity names mentioned in the query text,
/// the same best-effort lookup the service's development mode uses. Tests
/// can also inject canned rows or a forced execution failure.
#[derive(Default)]
pub struct MemoryGraphStore {
    state: RwLock<MemoryGraphState>,
}

#[derive(Default)]
struct MemoryGraphState {
    triples: BTreeSet<Triple>,
    entities: BTreeSet<String>,
    canned_rows: Option<Vec<serde_json::Value>>,
    fail_queries: bool,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return these rows for every query instead of matching entities
    pub fn with_canned_rows(self, rows: Vec<serde_json::Value>) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.canned_rows = Some(rows);
        }
        self
    }

    /// Make every run_query call fail, as a malformed generated query would
    pub fn with_failing_queries(self) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.fail_queries = true;
        }
        self
    }

    fn lock_error() -> AppError {
        AppError::Internal {
            message: "Graph store lock poisoned".to_string(),
        }
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn merge_triple(&self, triple: &Triple) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Self::lock_error())?;
        state.entities.insert(triple.head.clone());
        state.entities.insert(triple.tail.clone());
        state.triples.insert(triple.clone());
        Ok(())
    }

    async fn run_query(&self, query: &str) -> Result<Vec<serde_json::Value>> {
        let state = self.state.read().map_err(|_| Self::lock_error())?;

        if state.fail_queries {
            return Err(AppError::GraphQueryExecution {
                message: "Simulated query failure".to_string(),
            });
        }

        if let Some(rows) = &state.canned_rows {
            return Ok(rows.clone());
        }

        let query_lower = query.to_lowercase();
        let rows = state
            .triples
            .iter()
            .filter(|t| {
                query_lower.contains(&t.head.to_lowercase())
                    || query_lower.contains(&t.tail.to_lowercase())
            })
            .map(|t| {
                serde_json::json!({
                    "head": t.head,
                    "relation": t.relation,
                    "tail": t.tail,
                })
            })
            .collect();

        Ok(rows)
    }

    async fn schema(&self) -> Result<GraphSchema> {
        let state = self.state.read().map_err(|_| Self::lock_error())?;
        let relationship_types: BTreeSet<String> =
            state.triples.iter().map(|t| t.relation.clone()).collect();

        Ok(GraphSchema {
            labels: if state.entities.is_empty() {
                vec![]
            } else {
                vec!["Entity".to_string()]
            },
            relationship_types: relationship_types.into_iter().collect(),
        })
    }

    async fn node_count(&self) -> Result<usize> {
        let state = self.state.read().map_err(|_| Self::lock_error())?;
        Ok(state.entities.len())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triple_sanitization() {
        let triple = Triple::sanitized("\"FastAPI\"", "has component", " routers ").unwrap();
        assert_eq!(triple.head, "FastAPI");
        assert_eq!(triple.relation, "HAS_COMPONENT");
        assert_eq!(triple.tail, "routers");
    }

    #[test]
    fn test_triple_rejects_empty_parts() {
        assert!(Triple::sanitized("", "USES", "x").is_none());
        assert!(Triple::sanitized("x", "''", "y").is_none());
        assert!(Triple::sanitized("x", "USES", "\"\"").is_none());
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let store = MemoryGraphStore::new();
        let triple = Triple::sanitized("FastAPI", "USES", "Pydantic").unwrap();

        store.merge_triple(&triple).await.unwrap();
        store.merge_triple(&triple).await.unwrap();
        store.merge_triple(&triple).await.unwrap();

        // Same entity strings merge to the same nodes
        assert_eq!(store.node_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_entity_matching_query() {
        let store = MemoryGraphStore::new();
        store
            .merge_triple(&Triple::sanitized("FastAPI", "USES", "Pydantic").unwrap())
            .await
            .unwrap();

        let rows = store
            .run_query("MATCH (e:Entity {name: \"FastAPI\"})-[r]->(t) RETURN t")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);

        let empty = store
            .run_query("MATCH (e:Entity {name: \"Django\"})-[r]->(t) RETURN t")
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_schema_reports_vocabulary() {
        let store = MemoryGraphStore::new();
        store
            .merge_triple(&Triple::sanitized("FastAPI", "USES", "Pydantic").unwrap())
            .await
            .unwrap();
        store
            .merge_triple(&Triple::sanitized("FastAPI", "HAS_COMPONENT", "routers").unwrap())
            .await
            .unwrap();

        let schema = store.schema().await.unwrap();
        assert_eq!(schema.labels, vec!["Entity"]);
        assert_eq!(
            schema.relationship_types,
            vec!["HAS_COMPONENT".to_string(), "USES".to_string()]
        );
    }
}
