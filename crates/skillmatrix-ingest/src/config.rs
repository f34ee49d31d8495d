//! Ingestion configuration.

use std::str::FromStr;
use std::time::Duration;

use skillmatrix_core::{CoreError, SchemaCheck};

/// How chunk dispatches are interleaved with waits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Dispatch chunk i, wait for it, then dispatch chunk i + 1.
    #[default]
    Sequential,
    /// Dispatch every chunk, then wait for all of them concurrently.
    FanOut,
}

impl FromStr for DispatchMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "fan-out" => Ok(Self::FanOut),
            other => Err(CoreError::Config(format!(
                "unknown dispatch mode '{}', expected 'sequential' or 'fan-out'",
                other
            ))),
        }
    }
}

/// Batch ingestion configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Maximum records per chunk (`UPLOAD_LIMIT`).
    pub max_chunk_size: usize,

    /// Bounded wait for one job's terminal event.
    pub job_timeout: Duration,

    /// Name of the work queue.
    pub queue_name: String,

    /// Name given to each job within the queue.
    pub job_name: String,

    /// Sequential or fan-out dispatch.
    pub dispatch_mode: DispatchMode,

    /// Which records have their field set checked.
    pub schema_check: SchemaCheck,

    /// Upper bound on concurrently checked-out queue connections.
    pub max_queue_connections: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 100,
            job_timeout: Duration::from_secs(30),
            queue_name: "addUsers".to_string(),
            job_name: "users".to_string(),
            dispatch_mode: DispatchMode::Sequential,
            schema_check: SchemaCheck::EveryRecord,
            max_queue_connections: 16,
        }
    }
}

impl IngestConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup, falling back to defaults for
    /// absent keys. Present but unparseable values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            max_chunk_size: parse_or(&lookup, "UPLOAD_LIMIT", defaults.max_chunk_size)?,
            job_timeout: Duration::from_secs(parse_or(
                &lookup,
                "JOB_TIMEOUT_SECS",
                defaults.job_timeout.as_secs(),
            )?),
            queue_name: lookup("QUEUE_NAME").unwrap_or(defaults.queue_name),
            job_name: defaults.job_name,
            dispatch_mode: parse_or(&lookup, "DISPATCH_MODE", defaults.dispatch_mode)?,
            schema_check: parse_or(&lookup, "SCHEMA_CHECK", defaults.schema_check)?,
            max_queue_connections: parse_or(
                &lookup,
                "QUEUE_MAX_CONNECTIONS",
                defaults.max_queue_connections,
            )?,
        };

        Ok(config)
    }

    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_chunk_size == 0 {
            return Err(CoreError::Config(
                "UPLOAD_LIMIT must be a positive integer".to_string(),
            ));
        }
        if self.job_timeout.is_zero() {
            return Err(CoreError::Config(
                "JOB_TIMEOUT_SECS must be a positive integer".to_string(),
            ));
        }
        if self.max_queue_connections == 0 {
            return Err(CoreError::Config(
                "QUEUE_MAX_CONNECTIONS must be a positive integer".to_string(),
            ));
        }
        if self.queue_name.trim().is_empty() {
            return Err(CoreError::Config("QUEUE_NAME cannot be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, CoreError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CoreError::Config(format!("invalid {} '{}': {}", key, raw, e))),
    }
}
