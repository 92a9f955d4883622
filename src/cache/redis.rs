//! Redis-backed dividend cache.
//!
//! The connection is established on first use and shared by every request.
//! Connecting never retries and is bounded by the operation timeout. After a
//! failed connect the cache refuses to try again until a cool-down passes,
//! so a dead server costs one bounded attempt rather than one per request.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use tracing::{info, warn};

use super::DividendCache;

/// Default bound on connect and on each command.
pub const OP_TIMEOUT: Duration = Duration::from_secs(1);

/// How long a failed connect suppresses further attempts.
pub const RECONNECT_COOLDOWN: Duration = Duration::from_secs(5);

pub struct RedisCache {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
    retry_after: Mutex<Option<Instant>>,
    op_timeout: Duration,
    cooldown: Duration,
}

impl RedisCache {
    /// Parse the URL. No I/O happens until the first `get`/`set`.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .with_context(|| format!("Invalid Redis URL: {url}"))?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
            retry_after: Mutex::new(None),
            op_timeout: OP_TIMEOUT,
            cooldown: RECONNECT_COOLDOWN,
        })
    }

    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        if let Some(conn) = self.conn.get() {
            return Ok(conn.clone());
        }

        // Callers queued behind a failed init re-check the cool-down here
        // instead of each running their own connect.
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let mut retry_after = self.retry_after.lock().await;
                if let Some(until) = *retry_after {
                    if Instant::now() < until {
                        bail!("Redis unavailable, not retrying until cool-down ends");
                    }
                }

                match self.connect().await {
                    Ok(manager) => {
                        *retry_after = None;
                        info!("Redis cache connected");
                        Ok(manager)
                    }
                    Err(e) => {
                        *retry_after = Some(Instant::now() + self.cooldown);
                        warn!(error = %e, cooldown = ?self.cooldown, "Redis connect failed");
                        Err(e)
                    }
                }
            })
            .await?;
        Ok(conn.clone())
    }

    async fn connect(&self) -> Result<ConnectionManager> {
        let attempt = ConnectionManager::new_with_backoff_and_timeouts(
            self.client.clone(),
            2,
            100,
            0,
            self.op_timeout,
            self.op_timeout,
        );
        tokio::time::timeout(self.op_timeout, attempt)
            .await
            .map_err(|_| anyhow!("Redis connect timed out after {:?}", self.op_timeout))?
            .context("Failed to connect to Redis")
    }

    /// Connect eagerly, e.g. at start-up. Failure is not fatal: the next
    /// cache call after the cool-down retries.
    pub async fn warm_up(&self) -> Result<()> {
        self.connection().await.map(|_| ())
    }
}

#[async_trait]
impl DividendCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .with_context(|| format!("Redis GET {key} failed"))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .with_context(|| format!("Redis SET {key} failed"))?;
        Ok(())
    }
}
