//! Dividend aggregator.
//!
//! Resolves a [`DividendQuery`] into (netuid, hotkey) pairs, reads each one
//! cache-first and merges the results. Point queries inside one resolution
//! step run concurrently; the first failure drops the rest of the batch.
//! Every point query holds a permit from a shared semaphore, so the total
//! number of in-flight chain reads is bounded across all requests.

use anyhow::{anyhow, Context, Result};
use futures::future::try_join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, DividendCache, CACHE_TTL};
use crate::chain::SubtensorChain;
use crate::config::{CacheConfig, ChainConfig};
use crate::types::{DividendQuery, DividendRecord, Netuid, Resolution};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub cache_ttl: Duration,
    /// Deadline for each cache read or write. Elapsed means miss.
    pub cache_timeout: Duration,
    /// Deadline for each individual chain read.
    pub query_timeout: Duration,
    pub max_in_flight: usize,
    /// Skip failing subnets in multi-subnet modes instead of failing the
    /// whole request.
    pub isolate_subnet_failures: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            cache_ttl: CACHE_TTL,
            cache_timeout: Duration::from_secs(1),
            query_timeout: Duration::from_secs(30),
            max_in_flight: 32,
            isolate_subnet_failures: false,
        }
    }
}

impl AggregatorConfig {
    pub fn from_app(cache: &CacheConfig, chain: &ChainConfig) -> Self {
        Self {
            cache_ttl: cache.ttl(),
            cache_timeout: cache.op_timeout(),
            query_timeout: chain.query_timeout(),
            max_in_flight: chain.max_in_flight,
            isolate_subnet_failures: chain.isolate_subnet_failures,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

pub struct DividendAggregator {
    chain: Arc<dyn SubtensorChain>,
    cache: Arc<dyn DividendCache>,
    limiter: Semaphore,
    config: AggregatorConfig,
}

impl DividendAggregator {
    pub fn new(
        chain: Arc<dyn SubtensorChain>,
        cache: Arc<dyn DividendCache>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            chain,
            cache,
            limiter: Semaphore::new(config.max_in_flight.max(1)),
            config,
        }
    }

    /// Fetch dividends for whatever the query resolves to.
    ///
    /// Chain faults propagate; cache faults never do.
    pub async fn fetch_dividends(&self, query: &DividendQuery) -> Result<Vec<DividendRecord>> {
        let resolution = query.resolution();
        debug!(?resolution, trade = query.trade, "Resolving dividend query");

        let records = match &resolution {
            Resolution::Single { netuid, hotkey } => {
                vec![self.process_single_query(*netuid, hotkey, query.trade).await?]
            }
            Resolution::Subnet(netuid) => self.fetch_subnet(*netuid, query.trade).await?,
            Resolution::Hotkey(hotkey) => self.fetch_hotkey(hotkey, query.trade).await?,
            Resolution::Everything => self.fetch_everything(query.trade).await?,
        };

        info!(
            ?resolution,
            records = records.len(),
            cached = records.iter().filter(|r| r.cached).count(),
            "Dividends fetched"
        );
        Ok(records)
    }

    /// Read one (netuid, hotkey) pair, cache-first.
    ///
    /// A cache hit never reports a triggered trade; a chain read reports
    /// whatever the caller asked for. The flag is informational only.
    pub async fn process_single_query(
        &self,
        netuid: Netuid,
        hotkey: &str,
        trade: bool,
    ) -> Result<DividendRecord> {
        let key = cache_key(netuid, hotkey);

        if let Some(dividend) = self.cached_dividend(&key).await {
            return Ok(DividendRecord {
                netuid,
                hotkey: hotkey.to_string(),
                dividend,
                cached: true,
                stake_tx_triggered: false,
            });
        }

        let dividend = {
            let _permit = self
                .limiter
                .acquire()
                .await
                .context("Chain query limiter closed")?;
            self.with_deadline(
                format!("tao_dividend({netuid}, {hotkey})"),
                self.chain.tao_dividend(netuid, hotkey),
            )
            .await?
            .unwrap_or(0)
        };

        match serde_json::to_string(&dividend) {
            Ok(value) => {
                let write = self.cache.set(&key, &value, self.config.cache_ttl);
                match tokio::time::timeout(self.config.cache_timeout, write).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(key, error = %e, "Cache write failed"),
                    Err(_) => warn!(key, timeout = ?self.config.cache_timeout, "Cache write timed out"),
                }
            }
            Err(e) => warn!(key, error = %e, "Failed to serialise dividend for cache"),
        }

        Ok(DividendRecord {
            netuid,
            hotkey: hotkey.to_string(),
            dividend,
            cached: false,
            stake_tx_triggered: trade,
        })
    }

    /// Every hotkey on one subnet, queried concurrently.
    async fn fetch_subnet(&self, netuid: Netuid, trade: bool) -> Result<Vec<DividendRecord>> {
        let hotkeys = self.hotkeys(netuid).await?;
        debug!(netuid, hotkeys = hotkeys.len(), "Fanning out point queries");

        try_join_all(
            hotkeys
                .iter()
                .map(|hotkey| self.process_single_query(netuid, hotkey, trade)),
        )
        .await
        .with_context(|| format!("Dividend batch for netuid {netuid} failed"))
    }

    /// Every subnet in turn, each fanned out.
    async fn fetch_everything(&self, trade: bool) -> Result<Vec<DividendRecord>> {
        let netuids = self.netuids().await?;
        let mut results = Vec::new();

        for netuid in netuids {
            match self.fetch_subnet(netuid, trade).await {
                Ok(batch) => results.extend(batch),
                Err(e) => self.subnet_failed(netuid, e)?,
            }
        }

        Ok(results)
    }

    /// One hotkey on every subnet that lists it.
    async fn fetch_hotkey(&self, hotkey: &str, trade: bool) -> Result<Vec<DividendRecord>> {
        let netuids = self.netuids().await?;
        let mut results = Vec::new();

        for netuid in netuids {
            let outcome: Result<Option<DividendRecord>> = async {
                let hotkeys = self.hotkeys(netuid).await?;
                if !hotkeys.iter().any(|h| h == hotkey) {
                    return Ok(None);
                }
                self.process_single_query(netuid, hotkey, trade).await.map(Some)
            }
            .await;

            match outcome {
                Ok(Some(record)) => results.push(record),
                Ok(None) => {}
                Err(e) => self.subnet_failed(netuid, e)?,
            }
        }

        Ok(results)
    }

    /// Either swallow a subnet failure (isolation on) or propagate it.
    fn subnet_failed(&self, netuid: Netuid, error: anyhow::Error) -> Result<()> {
        if self.config.isolate_subnet_failures {
            warn!(netuid, error = %format!("{error:#}"), "Skipping failed subnet");
            Ok(())
        } else {
            Err(error)
        }
    }

    async fn hotkeys(&self, netuid: Netuid) -> Result<Vec<String>> {
        self.with_deadline(
            format!("hotkeys_for_netuid({netuid})"),
            self.chain.hotkeys_for_netuid(netuid),
        )
        .await
    }

    async fn netuids(&self) -> Result<Vec<Netuid>> {
        self.with_deadline("all_netuids".to_string(), self.chain.all_netuids())
            .await
    }

    /// Cached dividend, if present and well-formed. Errors and timeouts
    /// are misses.
    async fn cached_dividend(&self, key: &str) -> Option<u64> {
        let read = match tokio::time::timeout(self.config.cache_timeout, self.cache.get(key)).await {
            Ok(read) => read,
            Err(_) => {
                warn!(key, timeout = ?self.config.cache_timeout, "Cache read timed out, reading from chain");
                return None;
            }
        };
        match read {
            Ok(Some(raw)) => match serde_json::from_str::<u64>(&raw) {
                Ok(dividend) => Some(dividend),
                Err(e) => {
                    warn!(key, raw = %raw, error = %e, "Ignoring malformed cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, reading from chain");
                None
            }
        }
    }

    async fn with_deadline<T, F>(&self, what: String, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = self.config.query_timeout;
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| anyhow!("{what} timed out after {timeout:?}"))?
            .with_context(|| format!("{what} failed"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
