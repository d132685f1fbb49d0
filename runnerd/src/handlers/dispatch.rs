// Manual dispatch endpoint: signature-verified trigger of one job

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use common::dispatch::verify_dispatch_signature;
use common::errors::{ApiError, DispatchError};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::ApiFailure;
use crate::state::AppState;

/// Request header carrying the hex HMAC-SHA256 signature of the body
pub const SIGNATURE_HEADER: &str = "x-dispatch-signature";

#[derive(Debug, Deserialize, Default)]
struct DispatchRequest {
    actor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub execution_id: Uuid,
    pub message: String,
}

/// Trigger a job manually.
///
/// The body (possibly empty) must be signed with the configured dispatch
/// key. A valid request enqueues one run and returns 202 with the pending
/// execution id; the run itself proceeds through the same pipeline as a
/// scheduled trigger.
#[tracing::instrument(skip(state, headers, body))]
pub async fn dispatch_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<DispatchResponse>), ApiFailure> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            ApiFailure(
                StatusCode::UNAUTHORIZED,
                DispatchError::MissingSignature.into(),
            )
        })?;

    verify_dispatch_signature(&body, signature, &state.settings.dispatch.key).map_err(|e| {
        warn!(job = %name, "Rejected dispatch request with invalid signature");
        ApiFailure(StatusCode::UNAUTHORIZED, e.into())
    })?;

    let request: DispatchRequest = if body.is_empty() {
        DispatchRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            ApiFailure(
                StatusCode::BAD_REQUEST,
                ApiError::new("VALIDATION_ERROR", format!("Invalid dispatch body: {}", e)),
            )
        })?
    };
    let actor = request.actor.unwrap_or_else(|| "api".to_string());

    let execution = state
        .dispatcher
        .dispatch_manual(&name, actor)
        .await
        .map_err(ApiFailure::from_execution_error)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DispatchResponse {
            execution_id: execution.id,
            message: format!("Job '{}' dispatched", name),
        }),
    ))
}
