use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub mechanic: MechanicConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// WebSocket endpoint, e.g. `ws://dispatch.example.com/socket`
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MechanicConfig {
    pub id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_decision_ack_timeout_ms")]
    pub decision_ack_timeout_ms: u64,
    #[serde(default = "default_register_ack_timeout_ms")]
    pub register_ack_timeout_ms: u64,
    #[serde(default = "default_sla_seconds")]
    pub default_sla_seconds: u64,
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
}

fn default_tick_interval_ms() -> u64 { 1_000 }
fn default_decision_ack_timeout_ms() -> u64 { 10_000 }
fn default_register_ack_timeout_ms() -> u64 { 5_000 }
fn default_sla_seconds() -> u64 { 120 }
fn default_reconnect_initial_ms() -> u64 { 500 }
fn default_reconnect_max_ms() -> u64 { 30_000 }

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            decision_ack_timeout_ms: default_decision_ack_timeout_ms(),
            register_ack_timeout_ms: default_register_ack_timeout_ms(),
            default_sla_seconds: default_sla_seconds(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Redis,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_backend() -> StorageBackend { StorageBackend::File }
fn default_storage_path() -> PathBuf { PathBuf::from("data") }
fn default_namespace() -> String { "mechanic_requests_v1".to_string() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_storage_path(),
            redis_url: None,
            namespace: default_namespace(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            // Per-environment overrides, e.g. config/production.toml
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // DISPATCH__MECHANIC__ID=m-17 sets mechanic.id
            .add_source(config::Environment::with_prefix("DISPATCH").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Parse a TOML document on its own, without files or environment.
    pub fn from_toml(raw: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
