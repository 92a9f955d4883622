//! Dividend cache.
//!
//! Defines the `DividendCache` trait and two backends: a lazily-connected
//! Redis store for deployments and an in-process TTL map for local runs and
//! tests. The cache only ever saves chain reads; callers treat any error
//! as a miss.

pub mod memory;
pub mod redis;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::types::Netuid;

/// How long a cached dividend stays authoritative.
pub const CACHE_TTL: Duration = Duration::from_secs(120);

/// Key/value store with per-entry expiry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DividendCache: Send + Sync {
    /// Fetch an unexpired value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value for `ttl`, replacing any previous entry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

/// Deterministic cache key for one (netuid, hotkey) pair.
pub fn cache_key(netuid: Netuid, hotkey: &str) -> String {
    format!("dividends:{netuid}:{hotkey}")
}
