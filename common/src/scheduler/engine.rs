// Runner engine: a poll loop that turns schedules into run requests, and a
// single queue drained one execution at a time.
//
// Scheduled ticks and manual dispatches enqueue onto the same channel and
// flow through the same pipeline, so both trigger paths execute the
// identical step sequence.

use crate::errors::ExecutionError;
use crate::history::HistoryStore;
use crate::jobs::JobRegistry;
use crate::models::{Job, JobExecution, Schedule};
use crate::runner::PipelineRunner;
use crate::schedule::ScheduleTrigger;
use crate::secrets::SecretStore;
use crate::telemetry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Engine trait for the runner's main loop
#[async_trait]
pub trait Engine: Send + Sync {
    /// Run until shutdown
    async fn start(&self) -> Result<(), ExecutionError>;

    /// Signal the engine to stop; the in-flight run completes first
    async fn stop(&self);
}

/// Configuration for the runner engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often to check schedules for due jobs (in seconds)
    pub poll_interval_seconds: u64,
    /// Capacity of the run queue
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 10,
            queue_capacity: 64,
        }
    }
}

/// One entry on the run queue: a pending execution waiting for the pipeline
#[derive(Debug)]
pub struct RunRequest {
    pub execution: JobExecution,
}

/// Handle used by the API to enqueue manual runs
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<JobRegistry>,
    history: Arc<HistoryStore>,
    queue_tx: mpsc::Sender<RunRequest>,
}

impl Dispatcher {
    /// Validate and enqueue a manual run, returning the pending execution.
    ///
    /// Rejected when the job is unknown, disabled, not manually
    /// triggerable, or already queued or running.
    pub async fn dispatch_manual(
        &self,
        job_name: &str,
        actor: String,
    ) -> Result<JobExecution, ExecutionError> {
        let job = self
            .registry
            .get(job_name)
            .ok_or_else(|| ExecutionError::JobNotFound(job_name.to_string()))?;

        if !job.enabled {
            return Err(ExecutionError::JobDisabled(job_name.to_string()));
        }
        if !job.triggers.manual {
            return Err(ExecutionError::ManualTriggerDisabled(job_name.to_string()));
        }
        if self.history.has_active(job_name).await {
            return Err(ExecutionError::AlreadyRunning(job_name.to_string()));
        }

        let execution = JobExecution::new_manual(job_name, actor);
        self.history.create(&execution).await;
        self.queue_tx
            .send(RunRequest {
                execution: execution.clone(),
            })
            .await
            .map_err(|_| ExecutionError::QueueClosed)?;

        info!(job = %job_name, execution_id = %execution.id, "Manual run dispatched");
        Ok(execution)
    }
}

/// The engine owns the poll loop, the queue, and the pipeline
pub struct RunnerEngine {
    config: EngineConfig,
    registry: Arc<JobRegistry>,
    history: Arc<HistoryStore>,
    pipeline: PipelineRunner,
    queue_tx: mpsc::Sender<RunRequest>,
    queue_rx: Mutex<Option<mpsc::Receiver<RunRequest>>>,
    shutdown_tx: broadcast::Sender<()>,
    /// Next due time per scheduled job, keyed by job name
    due_times: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl RunnerEngine {
    pub fn new(
        config: EngineConfig,
        registry: Arc<JobRegistry>,
        history: Arc<HistoryStore>,
        secrets: Arc<SecretStore>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        let (shutdown_tx, _) = broadcast::channel(1);
        let pipeline = PipelineRunner::new(secrets, Arc::clone(&history));

        Self {
            config,
            registry,
            history,
            pipeline,
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            shutdown_tx,
            due_times: Mutex::new(HashMap::new()),
        }
    }

    /// Handle for the API to enqueue manual runs
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            registry: Arc::clone(&self.registry),
            history: Arc::clone(&self.history),
            queue_tx: self.queue_tx.clone(),
        }
    }

    async fn run(&self, request: RunRequest) {
        let job_name = request.execution.job_name.clone();
        let Some(job) = self.registry.get(&job_name) else {
            error!(job = %job_name, "Queued execution references unknown job");
            return;
        };

        let execution = self.pipeline.execute(job, request.execution).await;
        debug!(
            job = %job_name,
            execution_id = %execution.id,
            status = %execution.status,
            "Run finished"
        );
    }
}

#[async_trait]
impl Engine for RunnerEngine {
    /// Run the engine until shutdown. Executes queued runs one at a time;
    /// an in-flight run always completes before the loop observes the
    /// shutdown signal.
    async fn start(&self) -> Result<(), ExecutionError> {
        let mut queue_rx = self
            .queue_rx
            .lock()
            .await
            .take()
            .ok_or(ExecutionError::QueueClosed)?;
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut poll = interval(Duration::from_secs(self.config.poll_interval_seconds));

        info!(
            poll_interval_seconds = self.config.poll_interval_seconds,
            job_count = self.registry.len(),
            "Runner engine started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping engine");
                    break;
                }
                _ = poll.tick() => {
                    self.enqueue_due_jobs().await;
                }
                request = queue_rx.recv() => {
                    let Some(request) = request else {
                        warn!("Run queue closed, stopping engine");
                        break;
                    };
                    telemetry::update_run_queue_size(queue_rx.len() as i64);
                    self.run(request).await;
                }
            }
        }

        Ok(())
    }

    async fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl RunnerEngine {
    /// Check every scheduled job and enqueue the ones whose due time has
    /// arrived. One schedule slot produces at most one execution, and a
    /// job with an active run is skipped until it finishes.
    async fn enqueue_due_jobs(&self) {
        for job in self.registry.iter() {
            if !job.enabled || !job.triggers.scheduled {
                continue;
            }
            let Some(schedule) = &job.schedule else {
                continue;
            };

            let due = match self.due_time_for(job, schedule).await {
                Some(due) => due,
                None => continue,
            };
            // Compare against a fresh clock: a first-run interval schedule
            // computes its due time as "now" inside due_time_for.
            if due > Utc::now() {
                continue;
            }

            if self.history.has_active(&job.name).await {
                debug!(job = %job.name, "Skipping scheduled run, job already active");
                continue;
            }

            let idempotency_key = format!("sched-{}-{}", job.name, due.timestamp());
            if self
                .history
                .find_by_idempotency_key(&idempotency_key)
                .await
                .is_some()
            {
                self.advance_due_time(job, schedule, due).await;
                continue;
            }

            let execution = JobExecution::new_scheduled(&job.name, idempotency_key);
            self.history.create(&execution).await;

            if self
                .queue_tx
                .send(RunRequest {
                    execution: execution.clone(),
                })
                .await
                .is_err()
            {
                warn!(job = %job.name, "Run queue closed, dropping scheduled run");
                return;
            }

            info!(job = %job.name, execution_id = %execution.id, due = %due, "Scheduled run enqueued");
            self.advance_due_time(job, schedule, due).await;
        }
    }

    /// Current due time for a job, computing the first one on demand
    async fn due_time_for(&self, job: &Job, schedule: &Schedule) -> Option<DateTime<Utc>> {
        let mut due_times = self.due_times.lock().await;
        if let Some(due) = due_times.get(&job.name) {
            return Some(*due);
        }

        let last = self.history.last_started_at(&job.name).await;
        match schedule.next_execution_time(last) {
            Ok(Some(next)) => {
                due_times.insert(job.name.clone(), next);
                Some(next)
            }
            Ok(None) => None,
            Err(e) => {
                // Definitions are validated at load; reaching this means a
                // schedule stopped producing occurrences.
                warn!(job = %job.name, error = %e, "Failed to compute next execution time");
                None
            }
        }
    }

    async fn advance_due_time(&self, job: &Job, schedule: &Schedule, fired: DateTime<Utc>) {
        let mut due_times = self.due_times.lock().await;
        match schedule.next_execution_time(Some(fired)) {
            Ok(Some(next)) => {
                due_times.insert(job.name.clone(), next);
            }
            Ok(None) => {
                due_times.remove(&job.name);
                info!(job = %job.name, "Schedule completed, no further runs");
            }
            Err(e) => {
                due_times.remove(&job.name);
                warn!(job = %job.name, error = %e, "Failed to advance schedule");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobStep, TriggerConfig};
    use std::collections::HashMap as StdHashMap;

    fn job(name: &str, triggers: TriggerConfig, schedule: Option<Schedule>) -> Job {
        Job {
            name: name.to_string(),
            description: None,
            schedule,
            triggers,
            steps: vec![JobStep {
                id: "run".to_string(),
                name: "Run".to_string(),
                program: "/bin/sh".to_string(),
                args: vec!["-c".to_string(), "exit 0".to_string()],
                working_dir: None,
                env: StdHashMap::new(),
            }],
            env: StdHashMap::new(),
            timeout_seconds: Some(30),
            enabled: true,
        }
    }

    fn engine_with(jobs: Vec<Job>) -> RunnerEngine {
        let mut registry = JobRegistry::empty();
        for j in jobs {
            registry.add(j).unwrap();
        }
        RunnerEngine::new(
            EngineConfig::default(),
            Arc::new(registry),
            Arc::new(HistoryStore::new()),
            Arc::new(SecretStore::empty()),
        )
    }

    #[tokio::test]
    async fn test_dispatch_unknown_job() {
        let engine = engine_with(vec![]);
        let result = engine
            .dispatcher()
            .dispatch_manual("ghost", "tester".to_string())
            .await;
        assert!(matches!(result, Err(ExecutionError::JobNotFound(_))));
    }

    #[tokio::test]
    async fn test_dispatch_disabled_job() {
        let mut j = job(
            "off",
            TriggerConfig {
                scheduled: false,
                manual: true,
            },
            None,
        );
        j.enabled = false;
        let engine = engine_with(vec![j]);
        let result = engine
            .dispatcher()
            .dispatch_manual("off", "tester".to_string())
            .await;
        assert!(matches!(result, Err(ExecutionError::JobDisabled(_))));
    }

    #[tokio::test]
    async fn test_dispatch_requires_manual_trigger() {
        let j = job(
            "cron-only",
            TriggerConfig {
                scheduled: true,
                manual: false,
            },
            Some(Schedule::FixedRate {
                interval_seconds: 3600,
            }),
        );
        let engine = engine_with(vec![j]);
        let result = engine
            .dispatcher()
            .dispatch_manual("cron-only", "tester".to_string())
            .await;
        assert!(matches!(
            result,
            Err(ExecutionError::ManualTriggerDisabled(_))
        ));
    }

    #[tokio::test]
    async fn test_dispatch_rejects_second_run_while_active() {
        let j = job(
            "busy",
            TriggerConfig {
                scheduled: false,
                manual: true,
            },
            None,
        );
        let engine = engine_with(vec![j]);
        let dispatcher = engine.dispatcher();

        let first = dispatcher
            .dispatch_manual("busy", "tester".to_string())
            .await
            .unwrap();
        assert_eq!(first.job_name, "busy");

        let second = dispatcher.dispatch_manual("busy", "tester".to_string()).await;
        assert!(matches!(second, Err(ExecutionError::AlreadyRunning(_))));
    }

    #[tokio::test]
    async fn test_enqueue_due_jobs_respects_manual_only_trigger() {
        let j = job(
            "manual-only",
            TriggerConfig {
                scheduled: false,
                manual: true,
            },
            Some(Schedule::FixedRate {
                interval_seconds: 1,
            }),
        );
        let engine = engine_with(vec![j]);
        engine.enqueue_due_jobs().await;
        assert!(engine.history.list(None, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_due_jobs_fires_fixed_rate_immediately() {
        let j = job(
            "ticker",
            TriggerConfig {
                scheduled: true,
                manual: false,
            },
            Some(Schedule::FixedRate {
                interval_seconds: 3600,
            }),
        );
        let engine = engine_with(vec![j]);
        engine.enqueue_due_jobs().await;

        let pending = engine.history.list(Some("ticker"), 10).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].trigger_source, crate::models::TriggerSource::Scheduled);
        assert!(pending[0].idempotency_key.starts_with("sched-ticker-"));

        // The slot fired; a second poll before the next interval enqueues nothing
        engine.enqueue_due_jobs().await;
        assert_eq!(engine.history.list(Some("ticker"), 10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_cron_job_waits_for_next_slot() {
        let j = job(
            "daily",
            TriggerConfig {
                scheduled: true,
                manual: false,
            },
            Some(Schedule::Cron {
                expression: "0 0 2 * * *".to_string(),
                timezone: chrono_tz::UTC,
                end_date: None,
            }),
        );
        let engine = engine_with(vec![j]);
        engine.enqueue_due_jobs().await;
        // The next 02:00 slot is in the future; nothing is due yet
        assert!(engine.history.list(None, 10).await.is_empty());
    }
}
