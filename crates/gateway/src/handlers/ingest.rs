//! Ingestion handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use bifrost_common::errors::{AppError, Result};

/// Optional ingestion request body.
///
/// With no body the configured dataset file is ingested; with inline text
/// that text is ingested instead, tagged with the given source name.
#[derive(Debug, Deserialize, Validate)]
pub struct IngestRequest {
    #[validate(length(min = 1, max = 1_000_000))]
    pub text: String,

    #[serde(default = "default_source")]
    #[validate(length(min = 1, max = 255))]
    pub source: String,
}

fn default_source() -> String {
    "inline".to_string()
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: String,
    pub message: String,
    pub chunks_processed: usize,
    pub chunks_failed: usize,
    pub triples_extracted: usize,
}

/// Ingest the bundled dataset, or inline text when a body is supplied
pub async fn ingest(
    State(state): State<AppState>,
    body: Option<Json<IngestRequest>>,
) -> Result<Json<IngestResponse>> {
    let report = match body {
        Some(Json(request)) => {
            request.validate().map_err(|e| AppError::Validation {
                message: e.to_string(),
                field: None,
            })?;
            state.pipeline.ingest_text(&request.text, &request.source).await?
        }
        None => state.pipeline.ingest_dataset().await?,
    };

    Ok(Json(IngestResponse {
        status: "success".to_string(),
        message: format!(
            "Ingested {} chunks ({} failed), extracted {} triples",
            report.chunks_processed, report.chunks_failed, report.triples_extracted
        ),
        chunks_processed: report.chunks_processed,
        chunks_failed: report.chunks_failed,
        triples_extracted: report.triples_extracted,
    }))
}
