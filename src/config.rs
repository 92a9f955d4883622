//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys, the bearer token) are referenced by env-var name in
//! the config and resolved at runtime into `SecretString`s.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub chain: ChainConfig,
    pub sentiment: SentimentConfig,
    #[serde(default)]
    pub trade: TradeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub auth_token_env: String,
}

/// Which cache backend serves dividend lookups.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    /// Upper bound on a single cache read or write, connect included.
    #[serde(default = "default_cache_op_timeout")]
    pub op_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            redis_url: default_redis_url(),
            ttl_secs: default_cache_ttl(),
            op_timeout_ms: default_cache_op_timeout(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    /// Deadline applied to every individual chain read.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
    /// Upper bound on concurrent point queries across all requests.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Page size used when draining the hotkey cursor.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Skip subnets whose queries fail instead of failing the whole
    /// all-subnets request.
    #[serde(default)]
    pub isolate_subnet_failures: bool,
}

impl ChainConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SentimentConfig {
    pub search_url: String,
    pub search_api_key_env: String,
    #[serde(default = "default_mention_limit")]
    pub mention_limit: u32,
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    pub llm_url: String,
    pub llm_api_key_env: String,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl SentimentConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TradeConfig {
    /// Log would-be extrinsics instead of submitting them.
    #[serde(default = "default_true")]
    pub dry_run: bool,
    /// TAO moved for a sentiment of ±100; scaled linearly below that.
    #[serde(default = "default_stake_unit")]
    pub stake_unit_tao: Decimal,
    #[serde(default = "default_wallet_dir")]
    pub wallet_dir: PathBuf,
    /// Hotkey used when a trade request does not name one.
    #[serde(default)]
    pub default_hotkey: Option<String>,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            stake_unit_tao: default_stake_unit(),
            wallet_dir: default_wallet_dir(),
            default_hotkey: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_cache_backend() -> CacheBackend {
    CacheBackend::Redis
}
fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}
fn default_cache_ttl() -> u64 {
    crate::cache::CACHE_TTL.as_secs()
}
fn default_cache_op_timeout() -> u64 {
    1_000
}
fn default_query_timeout() -> u64 {
    30
}
fn default_max_in_flight() -> usize {
    32
}
fn default_page_size() -> u32 {
    256
}
fn default_mention_limit() -> u32 {
    10
}
fn default_window_days() -> i64 {
    1
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.7
}
fn default_request_timeout() -> u64 {
    15
}
fn default_true() -> bool {
    true
}
fn default_stake_unit() -> Decimal {
    dec!(1)
}
fn default_wallet_dir() -> PathBuf {
    PathBuf::from("wallets")
}
fn default_database_url() -> String {
    "sqlite://tao_dividends.db".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Resolve a secret referenced by env-var name.
    pub fn resolve_secret(env_name: &str) -> Result<SecretString> {
        Self::resolve_env(env_name).map(SecretString::new)
    }
}
