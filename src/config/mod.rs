//! Runtime configuration.
//!
//! Precedence: built-in defaults, then an optional TOML file, then
//! environment variables.

use std::env;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::core::protocol::DEFAULT_MAX_FRAME_BYTES;
use crate::service::DEFAULT_N_RESULTS;
use crate::store::memory::DEFAULT_DIMENSIONS;

pub const DEFAULT_QUEUE_ADDR: &str = "127.0.0.1:7379";
pub const DEFAULT_WORK_QUEUE: &str = "vector_store_queue";
pub const DEFAULT_RESPONSE_QUEUE: &str = "vector_store_response_queue";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// Address of the queue service (`vsmq-broker`).
    pub addr: String,
    pub work_queue: String,
    pub response_queue: String,
    pub poll_timeout_ms: u64,
    pub error_backoff_ms: u64,
    pub response_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_QUEUE_ADDR.to_string(),
            work_queue: DEFAULT_WORK_QUEUE.to_string(),
            response_queue: DEFAULT_RESPONSE_QUEUE.to_string(),
            poll_timeout_ms: 1_000,
            error_backoff_ms: 1_000,
            response_timeout_ms: 10_000,
        }
    }
}

impl QueueConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BrokerConfig {
    pub bind_addr: String,
    pub max_frame_bytes: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_QUEUE_ADDR.to_string(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub default_n_results: usize,
    pub embedding_dimensions: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_n_results: DEFAULT_N_RESULTS,
            embedding_dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub queue: QueueConfig,
    pub broker: BrokerConfig,
    pub store: StoreConfig,
}

fn env_parse<T>(name: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    if let Ok(v) = env::var(name) {
        *target = v
            .trim()
            .parse()
            .map_err(|e| ConfigError::Parse(format!("{name}: {e}")))?;
    }
    Ok(())
}

fn env_string(name: &str, target: &mut String) {
    if let Ok(v) = env::var(name) {
        if !v.is_empty() {
            *target = v;
        }
    }
}

impl Config {
    /// Load configuration from an optional file path and environment variables.
    ///
    /// The file is `path`, else `$VSMQ_CONFIG`, else none (defaults only).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let effective_path = path.map(str::to_string).or_else(|| env::var("VSMQ_CONFIG").ok());
        let mut cfg = match effective_path {
            Some(p) => load_config(p)?,
            None => Config::default(),
        };
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        env_string("QUEUE_ADDR", &mut self.queue.addr);
        env_string("VECTOR_STORE_QUEUE", &mut self.queue.work_queue);
        env_string("VECTOR_STORE_RESPONSE_QUEUE", &mut self.queue.response_queue);
        env_parse("VSMQ_POLL_TIMEOUT_MS", &mut self.queue.poll_timeout_ms)?;
        env_parse("VSMQ_ERROR_BACKOFF_MS", &mut self.queue.error_backoff_ms)?;
        env_parse("VSMQ_RESPONSE_TIMEOUT_MS", &mut self.queue.response_timeout_ms)?;
        env_string("VSMQ_BIND_ADDR", &mut self.broker.bind_addr);
        env_parse("VSMQ_MAX_FRAME_BYTES", &mut self.broker.max_frame_bytes)?;
        env_parse("VSMQ_DEFAULT_N_RESULTS", &mut self.store.default_n_results)?;
        env_parse("VSMQ_EMBEDDING_DIMENSIONS", &mut self.store.embedding_dimensions)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.work_queue.is_empty() || self.queue.response_queue.is_empty() {
            return Err(ConfigError::Parse("queue names must not be empty".into()));
        }
        if self.queue.poll_timeout_ms == 0 {
            return Err(ConfigError::Parse("poll_timeout_ms must be positive".into()));
        }
        if self.store.default_n_results == 0 {
            return Err(ConfigError::Parse("default_n_results must be positive".into()));
        }
        if self.store.embedding_dimensions == 0 {
            return Err(ConfigError::Parse("embedding_dimensions must be positive".into()));
        }
        if self.broker.max_frame_bytes < 64 {
            return Err(ConfigError::Parse("max_frame_bytes must be at least 64".into()));
        }
        Ok(())
    }
}

/// Reads a TOML file with no environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let raw: String = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&raw)?;
    Ok(config)
}
