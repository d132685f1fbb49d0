// Error handling framework

use thiserror::Error;

/// Schedule-related errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid schedule configuration: {0}")]
    InvalidConfiguration(String),

    #[error("No next execution time available for {schedule_type} schedule")]
    NoNextExecution { schedule_type: String },
}

/// Job execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job is disabled: {0}")]
    JobDisabled(String),

    #[error("Manual trigger is not enabled for job: {0}")]
    ManualTriggerDisabled(String),

    #[error("Job already queued or running: {0}")]
    AlreadyRunning(String),

    #[error("Failed to spawn step '{step}': {reason}")]
    SpawnFailed { step: String, reason: String },

    #[error("Step '{step}' exited with code {code}")]
    NonZeroExit { step: String, code: i32 },

    #[error("Step '{step}' was terminated by a signal")]
    KilledBySignal { step: String },

    #[error("Execution timeout after {0} seconds")]
    Timeout(u64),

    #[error("Invalid job definition: {0}")]
    InvalidJobDefinition(String),

    #[error("Run queue is closed")]
    QueueClosed,
}

impl ExecutionError {
    /// Short label used for metrics and execution records
    pub fn reason(&self) -> &'static str {
        match self {
            ExecutionError::JobNotFound(_) => "not_found",
            ExecutionError::JobDisabled(_) => "disabled",
            ExecutionError::ManualTriggerDisabled(_) => "manual_disabled",
            ExecutionError::AlreadyRunning(_) => "already_running",
            ExecutionError::SpawnFailed { .. } => "spawn_failed",
            ExecutionError::NonZeroExit { .. } => "non_zero_exit",
            ExecutionError::KilledBySignal { .. } => "killed",
            ExecutionError::Timeout(_) => "timeout",
            ExecutionError::InvalidJobDefinition(_) => "invalid_definition",
            ExecutionError::QueueClosed => "queue_closed",
        }
    }
}

/// Validation errors for job definitions and configuration
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Duplicate job name: {0}")]
    DuplicateJobName(String),

    #[error("Failed to read {path}: {reason}")]
    ReadFailed { path: String, reason: String },
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        ValidationError::InvalidJson(err.to_string())
    }
}

/// Variable substitution errors
#[derive(Error, Debug)]
pub enum SubstitutionError {
    #[error("Undefined variable(s) in template: {variables:?}. Template: {template}")]
    UndefinedVariable {
        variables: Vec<String>,
        template: String,
    },

    #[error("Regex compilation error: {0}")]
    RegexError(String),
}

/// Manual dispatch authentication errors
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Missing dispatch signature")]
    MissingSignature,

    #[error("Invalid dispatch signature")]
    InvalidSignature,

    #[error("Invalid dispatch key: {0}")]
    InvalidKey(String),
}

/// API response error type for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<ScheduleError> for ApiError {
    fn from(err: ScheduleError) -> Self {
        ApiError::new("SCHEDULE_ERROR", err.to_string())
    }
}

impl From<ExecutionError> for ApiError {
    fn from(err: ExecutionError) -> Self {
        let code = match err {
            ExecutionError::JobNotFound(_) => "NOT_FOUND",
            ExecutionError::JobDisabled(_)
            | ExecutionError::ManualTriggerDisabled(_)
            | ExecutionError::AlreadyRunning(_) => "CONFLICT",
            _ => "EXECUTION_ERROR",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::new("VALIDATION_ERROR", err.to_string())
    }
}

impl From<SubstitutionError> for ApiError {
    fn from(err: SubstitutionError) -> Self {
        ApiError::new("SUBSTITUTION_ERROR", err.to_string())
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError::new("UNAUTHORIZED", err.to_string())
    }
}
