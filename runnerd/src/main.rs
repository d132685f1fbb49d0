// Runner daemon entry point: one process hosting the scheduler loop, the
// run pipeline, and the manual dispatch API.

use anyhow::{Context, Result};
use common::config::Settings;
use common::history::HistoryStore;
use common::jobs::JobRegistry;
use common::scheduler::{Engine, EngineConfig, RunnerEngine};
use common::secrets::SecretStore;
use common::substitution::VariableSubstitutor;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use runnerd::routes;
use runnerd::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before logging so the log level applies from the
    // first line; load errors surface through anyhow.
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    common::telemetry::init_logging(&settings.observability.log_level)?;
    common::telemetry::init_metrics(settings.observability.metrics_port)?;

    info!("Starting runner daemon");

    // Load job definitions
    let registry = JobRegistry::load_from_dir(
        Path::new(&settings.runner.jobs_dir),
        settings.runner.default_timeout_seconds,
    )
    .map_err(|e| anyhow::anyhow!("Failed to load job definitions: {}", e))?;
    let registry = Arc::new(registry);

    // Build the secret store: process environment, backfilled from the
    // optional env file, with every name the jobs reference marked for
    // redaction.
    let mut secrets = SecretStore::from_process_env();
    if let Some(env_file) = &settings.secrets.env_file {
        secrets = secrets
            .with_env_file(Path::new(env_file))
            .map_err(|e| anyhow::anyhow!("Failed to load secrets env file: {}", e))?;
    }
    let substitutor = VariableSubstitutor::default();
    for name in registry.referenced_env_names(&substitutor) {
        secrets.mark_sensitive(name);
    }
    let secrets = Arc::new(secrets);

    // Execution history with a JSONL log under the data directory
    let data_dir = Path::new(&settings.runner.data_dir);
    std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;
    let history = Arc::new(HistoryStore::with_log_file(data_dir.join("executions.jsonl")));

    // Runner engine and dispatch handle
    let engine_config = EngineConfig {
        poll_interval_seconds: settings.runner.poll_interval_seconds,
        ..EngineConfig::default()
    };
    let engine = Arc::new(RunnerEngine::new(
        engine_config,
        Arc::clone(&registry),
        Arc::clone(&history),
        secrets,
    ));

    // Dispatch API
    let app_state = AppState::new(
        registry,
        history,
        engine.dispatcher(),
        settings.clone(),
    );
    let app = routes::create_router(app_state);

    let addr = SocketAddr::from((
        settings
            .server
            .host
            .parse::<std::net::IpAddr>()
            .context("Invalid server host")?,
        settings.server.port,
    ));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind API listener")?;
    info!(addr = %addr, "Dispatch API listening");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!(error = %e, "API server error");
        }
    });

    // Stop the engine once a shutdown signal arrives; the in-flight run
    // completes before the loop exits.
    let engine_for_shutdown = Arc::clone(&engine);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Initiating graceful shutdown");
        engine_for_shutdown.stop().await;
    });

    engine.start().await?;
    let _ = server.await;

    info!("Runner daemon stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
