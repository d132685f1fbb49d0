// Execution history endpoints

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use common::errors::ApiError;
use common::models::JobExecution;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiFailure;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ListExecutionsQuery {
    pub job: Option<String>,
    pub limit: Option<usize>,
}

/// List executions, newest first
#[tracing::instrument(skip(state))]
pub async fn list_executions(
    State(state): State<AppState>,
    Query(query): Query<ListExecutionsQuery>,
) -> Json<Vec<JobExecution>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let executions = state.history.list(query.job.as_deref(), limit).await;
    Json(executions)
}

/// Get a single execution by id
#[tracing::instrument(skip(state))]
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobExecution>, ApiFailure> {
    state
        .history
        .find_by_id(id)
        .await
        .map(Json)
        .ok_or_else(|| {
            ApiFailure(
                StatusCode::NOT_FOUND,
                ApiError::new("NOT_FOUND", format!("Execution not found: {}", id)),
            )
        })
}
