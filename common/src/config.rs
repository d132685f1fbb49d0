// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub runner: RunnerConfig,
    pub dispatch: DispatchConfig,
    pub secrets: SecretsConfig,
    pub observability: ObservabilityConfig,
}

/// Bind address for the dispatch API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Directory of JSON job definitions
    pub jobs_dir: String,
    /// Directory for the execution log
    pub data_dir: String,
    /// How often to check schedules for due jobs
    pub poll_interval_seconds: u64,
    /// Wall-clock budget applied to jobs that declare none
    pub default_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Key used to verify HMAC signatures on manual dispatch requests
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Optional KEY=value file backfilling the process environment
    #[serde(default)]
    pub env_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_port: u16,
}

impl Settings {
    /// Load configuration with layered precedence: defaults file → local
    /// overrides → environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Local configuration, not committed to git
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.runner.jobs_dir.is_empty() {
            return Err("Runner jobs_dir cannot be empty".to_string());
        }
        if self.runner.data_dir.is_empty() {
            return Err("Runner data_dir cannot be empty".to_string());
        }
        if self.runner.poll_interval_seconds == 0 {
            return Err("Runner poll_interval_seconds must be greater than 0".to_string());
        }
        if self.runner.default_timeout_seconds == 0 {
            return Err("Runner default_timeout_seconds must be greater than 0".to_string());
        }

        if self.dispatch.key.is_empty() {
            return Err("Dispatch key cannot be empty".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            runner: RunnerConfig {
                jobs_dir: "jobs".to_string(),
                data_dir: "data".to_string(),
                poll_interval_seconds: 10,
                default_timeout_seconds: 1200,
            },
            dispatch: DispatchConfig {
                key: "change-me-in-production".to_string(),
            },
            secrets: SecretsConfig { env_file: None },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                metrics_port: 9090,
            },
        }
    }
}
