//! LLM-backed query routing.
//!
//! Every question is classified into one of two retrieval routes before any
//! store is touched: vector search for definitional questions, graph query
//! for relationship questions. The classifier is a single chat completion;
//! anything it says that we cannot recognise falls back to vector search.

use std::sync::Arc;

use bifrost_common::{metrics, AppError, ChatModel, Result};

/// Retrieval route chosen for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Vector,
    Graph,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Vector => "vector",
            Route::Graph => "graph",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of routing a single question.
#[derive(Debug, Clone, Copy)]
pub struct RoutingDecision {
    pub route: Route,
    /// True when the classifier output was unrecognisable and we fell back
    /// to vector search instead of honouring a choice.
    pub defaulted: bool,
}

/// Classifies questions into a retrieval route via a chat model.
pub struct QueryRouter {
    model: Arc<dyn ChatModel>,
}

impl QueryRouter {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Decide which retrieval path should answer `question`.
    ///
    /// A failed model call is a hard error (`ModelUnavailable`): routing is
    /// the first step of every query and guessing here would silently send
    /// relationship questions to the wrong store.
    pub async fn route(&self, question: &str) -> Result<RoutingDecision> {
        let prompt = routing_prompt(question);
        let response =
            self.model
                .complete(&prompt)
                .await
                .map_err(|err| AppError::ModelUnavailable {
                    message: format!("routing call failed: {err}"),
                })?;

        let decision = match parse_route(&response) {
            Some(route) => RoutingDecision {
                route,
                defaulted: false,
            },
            None => {
                tracing::warn!(
                    response = %response.trim(),
                    "unrecognised routing response, defaulting to vector search"
                );
                RoutingDecision {
                    route: Route::Vector,
                    defaulted: true,
                }
            }
        };

        metrics::record_routing(decision.route.as_str(), decision.defaulted);
        tracing::debug!(route = %decision.route, defaulted = decision.defaulted, "routed question");
        Ok(decision)
    }
}

/// Parse the classifier's free-text answer into a route.
///
/// Accepts the literal option markers as well as the option names, matched
/// case-insensitively. Returns `None` when neither option is identifiable.
pub fn parse_route(response: &str) -> Option<Route> {
    let lowered = response.to_lowercase();
    let vector = lowered.contains("(a)") || lowered.contains("vector search");
    let graph = lowered.contains("(b)") || lowered.contains("graph query");
    match (vector, graph) {
        (true, false) => Some(Route::Vector),
        (false, true) => Some(Route::Graph),
        // Both or neither mentioned: ambiguous.
        _ => None,
    }
}

fn routing_prompt(question: &str) -> String {
    format!(
        "Given the user's question, determine if it is better answered by:\n\
         (A) Vector Search: For questions about definitions, explanations, or 'what is' questions.\n\
         (B) Graph Query: For questions about relationships, connections, or 'how does X relate to Y' questions.\n\n\
         Question: '{question}'\n\
         Best method is:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bifrost_common::llm::ScriptedChatModel;

    struct KeywordClassifier;

    #[async_trait]
    impl ChatModel for KeywordClassifier {
        async fn complete(&self, prompt: &str) -> Result<String> {
            // Crude stand-in for the real classifier: relational phrasing
            // goes to the graph, everything else to the vector store. Only
            // the question line counts; the template itself mentions
            // relationships.
            let question = prompt
                .rsplit_once("Question:")
                .map(|(_, q)| q.to_lowercase())
                .unwrap_or_default();
            if question.contains("relate") || question.contains("connection") {
                Ok("(B) Graph Query".to_string())
            } else {
                Ok("(A) Vector Search".to_string())
            }
        }

        fn model_name(&self) -> &str {
            "keyword-classifier"
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    struct BrokenModel;

    #[async_trait]
    impl ChatModel for BrokenModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(AppError::ModelUnavailable {
                message: "connection refused".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "broken"
        }

        async fn ping(&self) -> Result<()> {
            Err(AppError::ModelUnavailable {
                message: "connection refused".to_string(),
            })
        }
    }

    #[test]
    fn parses_option_markers() {
        assert_eq!(parse_route("(A) Vector Search"), Some(Route::Vector));
        assert_eq!(parse_route("(B) Graph Query"), Some(Route::Graph));
        assert_eq!(parse_route("the best method is (b)"), Some(Route::Graph));
    }

    #[test]
    fn parses_option_names_without_markers() {
        assert_eq!(parse_route("Vector Search"), Some(Route::Vector));
        assert_eq!(parse_route("graph query, clearly"), Some(Route::Graph));
    }

    #[test]
    fn ambiguous_responses_are_none() {
        assert_eq!(parse_route("either could work"), None);
        assert_eq!(parse_route(""), None);
        assert_eq!(parse_route("(A) or (B), hard to say"), None);
    }

    #[tokio::test]
    async fn definitional_questions_route_to_vector() {
        let router = QueryRouter::new(Arc::new(KeywordClassifier));
        let decision = router.route("What is FastAPI?").await.unwrap();
        assert_eq!(decision.route, Route::Vector);
        assert!(!decision.defaulted);
    }

    #[tokio::test]
    async fn relationship_questions_route_to_graph() {
        let router = QueryRouter::new(Arc::new(KeywordClassifier));
        let decision = router
            .route("How does FastAPI relate to Pydantic?")
            .await
            .unwrap();
        assert_eq!(decision.route, Route::Graph);
    }

    #[tokio::test]
    async fn unrecognised_response_defaults_to_vector() {
        let model = ScriptedChatModel::new(vec!["I am not sure about this one.".to_string()]);
        let router = QueryRouter::new(Arc::new(model));
        let decision = router.route("What is FastAPI?").await.unwrap();
        assert_eq!(decision.route, Route::Vector);
        assert!(decision.defaulted);
    }

    #[tokio::test]
    async fn model_failure_is_model_unavailable() {
        let router = QueryRouter::new(Arc::new(BrokenModel));
        let err = router.route("What is FastAPI?").await.unwrap_err();
        assert!(matches!(err, AppError::ModelUnavailable { .. }));
    }
}
