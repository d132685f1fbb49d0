// Schedule parsing and next execution time calculation for all schedule
// types: Cron, FixedDelay, FixedRate, and OneTime.

use crate::errors::ScheduleError;
use crate::models::Schedule;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// ScheduleTrigger trait defines the interface for calculating next execution times
pub trait ScheduleTrigger {
    /// Calculate the next execution time based on the schedule and last execution time
    fn next_execution_time(
        &self,
        last_execution: Option<DateTime<Utc>>,
    ) -> Result<Option<DateTime<Utc>>, ScheduleError>;

    /// Check if the schedule has completed (for one-time jobs or jobs with end dates)
    fn is_complete(&self, last_execution: Option<DateTime<Utc>>) -> bool;
}

impl ScheduleTrigger for Schedule {
    fn next_execution_time(
        &self,
        last_execution: Option<DateTime<Utc>>,
    ) -> Result<Option<DateTime<Utc>>, ScheduleError> {
        match self {
            Schedule::Cron {
                expression,
                timezone,
                end_date,
            } => calculate_cron_next_execution(expression, *timezone, *end_date, last_execution),

            Schedule::FixedDelay { delay_seconds } => {
                calculate_interval_next_execution(*delay_seconds, last_execution)
            }

            Schedule::FixedRate { interval_seconds } => {
                calculate_interval_next_execution(*interval_seconds, last_execution)
            }

            Schedule::OneTime { execute_at } => {
                calculate_one_time_next_execution(*execute_at, last_execution)
            }
        }
    }

    fn is_complete(&self, last_execution: Option<DateTime<Utc>>) -> bool {
        match self {
            Schedule::Cron { end_date, .. } => {
                if let (Some(end), Some(last)) = (end_date, last_execution) {
                    return last >= *end;
                }
                false
            }

            // One-time jobs are complete after first execution
            Schedule::OneTime { .. } => last_execution.is_some(),

            Schedule::FixedDelay { .. } | Schedule::FixedRate { .. } => false,
        }
    }
}

/// Parse and validate a cron expression (second-precision syntax)
pub fn parse_cron_expression(expression: &str) -> Result<CronSchedule, ScheduleError> {
    CronSchedule::from_str(expression).map_err(|e| ScheduleError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Calculate next execution time for cron schedules.
///
/// The expression is evaluated in the job's timezone and the result is
/// converted back to UTC. Scheduling stops once the end date has passed.
fn calculate_cron_next_execution(
    expression: &str,
    timezone: Tz,
    end_date: Option<DateTime<Utc>>,
    last_execution: Option<DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    let schedule = parse_cron_expression(expression)?;

    let reference_time = last_execution.unwrap_or_else(Utc::now);
    let reference_in_tz = reference_time.with_timezone(&timezone);

    let next_in_tz =
        schedule
            .after(&reference_in_tz)
            .next()
            .ok_or_else(|| ScheduleError::NoNextExecution {
                schedule_type: "cron".to_string(),
            })?;

    let next_utc = next_in_tz.with_timezone(&Utc);

    if let Some(end) = end_date {
        if next_utc > end {
            return Ok(None);
        }
    }

    Ok(Some(next_utc))
}

/// Calculate next execution time for fixed delay and fixed rate schedules.
///
/// The runner executes one job at a time, so both reduce to "N seconds
/// after the previous start"; a first execution is due immediately.
fn calculate_interval_next_execution(
    seconds: u32,
    last_execution: Option<DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    match last_execution {
        Some(last) => Ok(Some(last + Duration::seconds(i64::from(seconds)))),
        None => Ok(Some(Utc::now())),
    }
}

/// Calculate next execution time for one-time schedules
fn calculate_one_time_next_execution(
    execute_at: DateTime<Utc>,
    last_execution: Option<DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    if last_execution.is_some() {
        Ok(None)
    } else {
        Ok(Some(execute_at))
    }
}

/// Default timezone for cron evaluation
pub fn default_timezone() -> Tz {
    chrono_tz::UTC
}
