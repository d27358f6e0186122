//! TOML configuration for the engine, its control surface, and the supervisor.
//!
//! Every section has defaults, so a missing file is not an error for the
//! binary: it falls back to [`Config::minimal`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable consulted when `remote.api_key` is not set.
pub const REMOTE_API_KEY_ENV: &str = "CODE_INDEX_REMOTE_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8001".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_provider")]
    pub embedding_provider: String,
    #[serde(default = "default_dims")]
    pub embedding_dims: usize,
    /// File extensions (without the dot) eligible for indexing.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Globs matched against root-relative paths, on top of `.gitignore`.
    #[serde(default = "default_exclude_globs")]
    pub exclude_globs: Vec<String>,
    /// Number of characters of file content returned with each search hit.
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            embedding_provider: default_provider(),
            embedding_dims: default_dims(),
            extensions: default_extensions(),
            exclude_globs: default_exclude_globs(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_provider() -> String {
    "hash".to_string()
}
fn default_dims() -> usize {
    32
}
fn default_extensions() -> Vec<String> {
    [
        "py", "js", "ts", "tsx", "jsx", "rs", "go", "java", "kt", "swift", "c", "h", "cpp", "hpp",
        "cs", "rb", "php", "sh", "html", "css",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_exclude_globs() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ]
}
fn default_snippet_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    /// Vector service used when a start request names none.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            collection: default_collection(),
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_collection() -> String {
    "code".to_string()
}
fn default_remote_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct SupervisorConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_ready_attempts")]
    pub ready_attempts: u32,
    #[serde(default = "default_ready_interval_ms")]
    pub ready_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Budget for a `start` request, which answers only after the initial scan.
    #[serde(default = "default_start_timeout_ms")]
    pub start_timeout_ms: u64,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    /// Let the engine process write to the supervisor's stdout/stderr.
    #[serde(default)]
    pub inherit_output: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            poll_interval_ms: default_poll_interval_ms(),
            ready_attempts: default_ready_attempts(),
            ready_interval_ms: default_ready_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            start_timeout_ms: default_start_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            inherit_output: false,
        }
    }
}

impl SupervisorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn ready_interval(&self) -> Duration {
        Duration::from_millis(self.ready_interval_ms)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn default_port() -> u16 {
    8001
}
fn default_poll_interval_ms() -> u64 {
    5000
}
fn default_ready_attempts() -> u32 {
    20
}
fn default_ready_interval_ms() -> u64 {
    500
}
fn default_request_timeout_ms() -> u64 {
    2000
}
fn default_start_timeout_ms() -> u64 {
    300_000
}
fn default_shutdown_grace_ms() -> u64 {
    5000
}

impl Config {
    /// All defaults, used when no configuration file is supplied.
    pub fn minimal() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if self.remote.api_key.is_none() {
            if let Ok(key) = std::env::var(REMOTE_API_KEY_ENV) {
                if !key.is_empty() {
                    self.remote.api_key = Some(key);
                }
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;
    config.apply_env();
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.index.embedding_dims == 0 {
        anyhow::bail!("index.embedding_dims must be > 0");
    }
    if config.index.snippet_chars == 0 {
        anyhow::bail!("index.snippet_chars must be > 0");
    }
    if config.index.extensions.is_empty() {
        anyhow::bail!("index.extensions must list at least one extension");
    }
    for pattern in &config.index.exclude_globs {
        globset::Glob::new(pattern)
            .with_context(|| format!("index.exclude_globs: invalid glob '{}'", pattern))?;
    }

    match config.index.embedding_provider.as_str() {
        "hash" => {}
        other => anyhow::bail!("Unknown embedding provider: '{}'. Must be hash.", other),
    }

    if config.remote.collection.trim().is_empty() {
        anyhow::bail!("remote.collection must not be empty");
    }
    if config.remote.timeout_secs == 0 {
        anyhow::bail!("remote.timeout_secs must be > 0");
    }

    if config.supervisor.ready_attempts == 0 {
        anyhow::bail!("supervisor.ready_attempts must be > 0");
    }
    if config.supervisor.poll_interval_ms == 0 {
        anyhow::bail!("supervisor.poll_interval_ms must be > 0");
    }
    if config.supervisor.start_timeout_ms == 0 {
        anyhow::bail!("supervisor.start_timeout_ms must be > 0");
    }

    Ok(())
}
