//! Query handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use bifrost_common::errors::{AppError, Result};
use bifrost_retrieval::SourceRef;

#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 1000))]
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub status: String,
    pub answer: String,
    pub search_method: String,
    pub sources: Vec<SourceRef>,
}

/// Answer a question via the hybrid retrieval engine
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("question".to_string()),
    })?;

    let outcome = state.engine.query(&request.question).await?;

    Ok(Json(QueryResponse {
        status: "success".to_string(),
        answer: outcome.answer,
        search_method: outcome.search_method,
        sources: outcome.sources,
    }))
}
