use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

// Helper functions for Tz serialization
fn serialize_tz<S>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&tz.to_string())
}

fn deserialize_tz<'de, D>(deserializer: D) -> Result<Tz, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Tz::from_str(&s).map_err(serde::de::Error::custom)
}

fn default_tz() -> Tz {
    chrono_tz::UTC
}

/// Wall-clock budget for one run. Matches the 20 minute limit the original
/// workflow gave its entry point.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 1200;

fn default_enabled() -> bool {
    true
}

// ============================================================================
// Job Models
// ============================================================================

/// Job represents a declarative run definition: an ordered list of child
/// process steps, the triggers that may start it, and its environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub triggers: TriggerConfig,
    pub steps: Vec<JobStep>,
    /// Environment templates applied to every step. Values may reference
    /// secrets and variables with `${NAME}` placeholders.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Wall-clock budget for the whole run. When absent, the registry fills
    /// in the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Job {
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }
}

/// JobStep represents a single child process in a job's linear sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStep {
    pub id: String,
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Step-level environment templates; these override job-level entries.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// TriggerConfig defines how a job can be started
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TriggerConfig {
    pub scheduled: bool,
    pub manual: bool,
}

/// Schedule defines when a scheduled job becomes due
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    Cron {
        expression: String,
        #[serde(
            default = "default_tz",
            serialize_with = "serialize_tz",
            deserialize_with = "deserialize_tz"
        )]
        timezone: Tz,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_date: Option<DateTime<Utc>>,
    },
    FixedDelay {
        delay_seconds: u32,
    },
    FixedRate {
        interval_seconds: u32,
    },
    OneTime {
        execute_at: DateTime<Utc>,
    },
}

// ============================================================================
// JobExecution Models
// ============================================================================

/// JobExecution represents a single run of a job, from enqueue to completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: Uuid,
    pub job_name: String,
    pub idempotency_key: String,
    pub status: ExecutionStatus,
    pub trigger_source: TriggerSource,
    pub current_step: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Exit code of the last step that ran, when the child reported one
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl JobExecution {
    /// Create a new pending execution for a scheduled trigger.
    ///
    /// The idempotency key identifies the schedule slot so one slot never
    /// produces two runs.
    pub fn new_scheduled(job_name: impl Into<String>, idempotency_key: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_name: job_name.into(),
            idempotency_key,
            status: ExecutionStatus::Pending,
            trigger_source: TriggerSource::Scheduled,
            current_step: None,
            started_at: None,
            completed_at: None,
            exit_code: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Create a new pending execution for a manual dispatch
    pub fn new_manual(job_name: impl Into<String>, actor: String) -> Self {
        let id = Uuid::new_v4();
        let job_name = job_name.into();
        let idempotency_key = format!("manual-{}-{}", job_name, id);

        Self {
            id,
            job_name,
            idempotency_key,
            status: ExecutionStatus::Pending,
            trigger_source: TriggerSource::Manual { actor },
            current_step: None,
            started_at: None,
            completed_at: None,
            exit_code: None,
            error: None,
            created_at: Utc::now(),
        }
    }
}

/// ExecutionStatus represents the status of a job execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Timeout,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Success | ExecutionStatus::Failed | ExecutionStatus::Timeout
        )
    }

    /// Timeout counts as a failure; the run did not complete within budget.
    pub fn is_failure(&self) -> bool {
        matches!(self, ExecutionStatus::Failed | ExecutionStatus::Timeout)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "pending"),
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Timeout => write!(f, "timeout"),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "running" => Ok(ExecutionStatus::Running),
            "success" => Ok(ExecutionStatus::Success),
            "failed" => Ok(ExecutionStatus::Failed),
            "timeout" => Ok(ExecutionStatus::Timeout),
            _ => Err(format!("Invalid execution status: {}", s)),
        }
    }
}

/// TriggerSource represents how a job execution was started
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSource {
    Scheduled,
    Manual { actor: String },
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerSource::Scheduled => write!(f, "scheduled"),
            TriggerSource::Manual { .. } => write!(f, "manual"),
        }
    }
}
