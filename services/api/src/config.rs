//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::FixedOffset;
use cron::Schedule;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Cadence of the durable-timer poller.
#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub poll_interval: Duration,
    pub lease: Duration,
    pub batch_size: usize,
}

/// UTC schedules of the periodic jobs.
#[derive(Clone, Debug)]
pub struct JobSchedules {
    pub knowledge_refresh: Schedule,
    pub daily_analytics: Schedule,
    pub cleanup: Schedule,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub embedding_model: String,
    pub pricing_offset: FixedOffset,
    pub workflow: WorkflowConfig,
    pub jobs: JobSchedules,
    pub cors_origin: String,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var_or(name, default);
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

fn cron_var(name: &str, default: &str) -> Result<Schedule, ConfigError> {
    parse_var::<Schedule>(name, default)
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address = parse_var::<SocketAddr>("BIND_ADDRESS", "0.0.0.0:3000")?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:3000");

        // --- Load Embedding Settings (the key is optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let embedding_model = var_or("EMBEDDING_MODEL", "text-embedding-3-small");

        // --- Load Pricing & Scheduling Settings ---
        let offset_minutes = parse_var::<i32>("PRICING_UTC_OFFSET_MINUTES", "0")?;
        let pricing_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
            ConfigError::InvalidValue(
                "PRICING_UTC_OFFSET_MINUTES".to_string(),
                format!("{} minutes is out of range", offset_minutes),
            )
        })?;

        let workflow = WorkflowConfig {
            poll_interval: Duration::from_secs(parse_var("WORKFLOW_POLL_SECONDS", "15")?),
            lease: Duration::from_secs(parse_var("WORKFLOW_LEASE_SECONDS", "300")?),
            batch_size: parse_var("WORKFLOW_BATCH_SIZE", "32")?,
        };
        if workflow.poll_interval.is_zero() || workflow.batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "WORKFLOW_POLL_SECONDS/WORKFLOW_BATCH_SIZE".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let jobs = JobSchedules {
            knowledge_refresh: cron_var("KNOWLEDGE_REFRESH_CRON", "0 0 2 * * *")?,
            daily_analytics: cron_var("DAILY_ANALYTICS_CRON", "0 0 3 * * *")?,
            cleanup: cron_var("CLEANUP_CRON", "0 0 4 * * Mon")?,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            embedding_model,
            pricing_offset,
            workflow,
            jobs,
            cors_origin,
        })
    }
}
