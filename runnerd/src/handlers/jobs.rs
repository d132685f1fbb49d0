// Job listing endpoints. Responses carry the job's shape, never its
// environment templates; those may reference or embed credential material.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use common::errors::ApiError;
use common::models::{Job, Schedule, TriggerConfig};
use serde::Serialize;

use super::ApiFailure;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub enabled: bool,
    pub triggers: TriggerConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    pub timeout_seconds: u64,
    pub steps: Vec<StepSummary>,
}

#[derive(Debug, Serialize)]
pub struct StepSummary {
    pub id: String,
    pub name: String,
    pub program: String,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            name: job.name.clone(),
            description: job.description.clone(),
            enabled: job.enabled,
            triggers: job.triggers.clone(),
            schedule: job.schedule.clone(),
            timeout_seconds: job.timeout_seconds(),
            steps: job
                .steps
                .iter()
                .map(|step| StepSummary {
                    id: step.id.clone(),
                    name: step.name.clone(),
                    program: step.program.clone(),
                })
                .collect(),
        }
    }
}

/// List all configured jobs
#[tracing::instrument(skip(state))]
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobSummary>> {
    let jobs = state.registry.iter().map(JobSummary::from).collect();
    Json(jobs)
}

/// Get a single job by name
#[tracing::instrument(skip(state))]
pub async fn get_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<JobSummary>, ApiFailure> {
    state
        .registry
        .get(&name)
        .map(|job| Json(JobSummary::from(job)))
        .ok_or_else(|| {
            ApiFailure(
                StatusCode::NOT_FOUND,
                ApiError::new("NOT_FOUND", format!("Job not found: {}", name)),
            )
        })
}
