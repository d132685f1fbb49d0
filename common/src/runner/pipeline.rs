// Sequential pipeline execution: run every step of a job in order, abort
// on the first failure, and finalize the execution record.

use crate::errors::ExecutionError;
use crate::models::{ExecutionStatus, Job, JobExecution, JobStep};
use crate::runner::process::{run_step, ResolvedStep};
use crate::secrets::SecretStore;
use crate::substitution::VariableSubstitutor;
use crate::telemetry;
use crate::history::HistoryStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

/// Executes one job at a time: resolve the environment, run the steps
/// under a single wall-clock deadline, record the outcome.
pub struct PipelineRunner {
    secrets: Arc<SecretStore>,
    history: Arc<HistoryStore>,
    substitutor: VariableSubstitutor,
}

impl PipelineRunner {
    pub fn new(secrets: Arc<SecretStore>, history: Arc<HistoryStore>) -> Self {
        Self {
            secrets,
            history,
            substitutor: VariableSubstitutor::default(),
        }
    }

    /// Run the job to completion and return the finalized execution.
    ///
    /// Success requires every step to exit zero before the deadline. The
    /// first non-zero exit, spawn failure, or deadline expiry aborts the
    /// remaining steps; there are no retries.
    #[instrument(skip(self, job, execution), fields(job = %job.name, execution_id = %execution.id, trigger = %execution.trigger_source))]
    pub async fn execute(&self, job: &Job, mut execution: JobExecution) -> JobExecution {
        let timeout_seconds = job.timeout_seconds();
        info!(
            step_count = job.steps.len(),
            timeout_seconds, "Starting job execution"
        );

        execution.status = ExecutionStatus::Running;
        execution.started_at = Some(Utc::now());
        self.history.update(&execution).await;

        let deadline = Instant::now() + Duration::from_secs(timeout_seconds);
        let result = self
            .run_steps(job, &mut execution, deadline, timeout_seconds)
            .await;

        execution.completed_at = Some(Utc::now());
        execution.current_step = None;
        match result {
            Ok(()) => {
                execution.status = ExecutionStatus::Success;
                execution.exit_code = Some(0);
                info!("Job execution succeeded");
                telemetry::record_run_success(&job.name);
            }
            Err(err) => {
                execution.status = match err {
                    ExecutionError::Timeout(_) => ExecutionStatus::Timeout,
                    _ => ExecutionStatus::Failed,
                };
                if let ExecutionError::NonZeroExit { code, .. } = err {
                    execution.exit_code = Some(code);
                }
                execution.error = Some(err.to_string());
                error!(error = %err, status = %execution.status, "Job execution failed");
                telemetry::record_run_failure(&job.name, err.reason());
            }
        }

        if let (Some(started), Some(completed)) = (execution.started_at, execution.completed_at) {
            let duration = (completed - started).num_milliseconds() as f64 / 1000.0;
            telemetry::record_run_duration(&job.name, duration);
        }

        self.history.update(&execution).await;
        execution
    }

    async fn run_steps(
        &self,
        job: &Job,
        execution: &mut JobExecution,
        deadline: Instant,
        timeout_seconds: u64,
    ) -> Result<(), ExecutionError> {
        for (index, step) in job.steps.iter().enumerate() {
            info!(step_index = index, step = %step.id, step_name = %step.name, "Executing step");

            execution.current_step = Some(step.id.clone());
            self.history.update(execution).await;

            let resolved = self.resolve_step(job, step);
            run_step(&resolved, deadline, timeout_seconds, &self.secrets).await?;
        }

        Ok(())
    }

    /// Build the child environment for a step. Job-level templates apply
    /// first, step-level templates override. A template referencing an
    /// absent name is skipped with a warning: this layer performs no
    /// validation, and the entry point decides what a missing variable
    /// means.
    fn resolve_step(&self, job: &Job, step: &JobStep) -> ResolvedStep {
        let mut merged: HashMap<&String, &String> = job.env.iter().collect();
        merged.extend(step.env.iter());

        let mut env = Vec::with_capacity(merged.len());
        let mut keys: Vec<_> = merged.keys().collect();
        keys.sort();
        for key in keys {
            let template = merged[*key];
            let missing: Vec<String> = self
                .substitutor
                .extract_variables(template)
                .into_iter()
                .filter(|name| !self.secrets.contains(name))
                .collect();
            if !missing.is_empty() {
                warn!(
                    step = %step.id,
                    variable = %key,
                    missing = ?missing,
                    "Skipping environment variable with unresolved secret reference"
                );
                continue;
            }

            let value = self
                .substitutor
                .substitute_with(template, |name| {
                    self.secrets.get(name).map(|s| s.expose())
                })
                .unwrap_or_else(|_| template.clone());
            env.push(((*key).clone(), value));
        }

        ResolvedStep {
            id: step.id.clone(),
            name: step.name.clone(),
            program: step.program.clone(),
            args: step.args.clone(),
            working_dir: step.working_dir.clone(),
            env,
        }
    }
}
