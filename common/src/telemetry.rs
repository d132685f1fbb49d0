// Telemetry: structured logging and Prometheus metrics for run outcomes

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize structured logging with JSON formatting.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_target(true)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(log_level = log_level, "Structured logging initialized");
    Ok(())
}

/// Initialize the Prometheus metrics exporter and describe the run metrics
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!("run_success_total", "Total number of successful runs");
    describe_counter!("run_failed_total", "Total number of failed runs");
    describe_histogram!("run_duration_seconds", "Duration of runs in seconds");
    describe_gauge!("run_queue_size", "Current number of queued runs");

    tracing::info!(metrics_port = metrics_port, "Prometheus metrics exporter initialized");
    Ok(())
}

/// Record a successful run
#[inline]
pub fn record_run_success(job_name: &str) {
    counter!("run_success_total", "job_name" => job_name.to_string()).increment(1);
}

/// Record a failed run. Timeouts count here with reason "timeout".
#[inline]
pub fn record_run_failure(job_name: &str, reason: &str) {
    counter!(
        "run_failed_total",
        "job_name" => job_name.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record run duration
#[inline]
pub fn record_run_duration(job_name: &str, duration_seconds: f64) {
    histogram!("run_duration_seconds", "job_name" => job_name.to_string())
        .record(duration_seconds);
}

/// Update the run queue size gauge
#[inline]
pub fn update_run_queue_size(size: i64) {
    gauge!("run_queue_size").set(size as f64);
}
