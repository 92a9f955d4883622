//! JSON-RPC client for a subtensor gateway.
//!
//! The gateway owns SCALE decoding, SS58 encoding and extrinsic signing;
//! this client only speaks JSON-RPC 2.0 over HTTP. Reads are retried with
//! exponential backoff. Submissions are never retried, since a resend
//! could move stake twice.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::SubtensorChain;
use crate::types::{ExtrinsicReceipt, Netuid, Wallet};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 500;

/// Backoff before retry `attempt` (1-based).
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt - 1))
}

/// Per-attempt HTTP timeout for reads, sized so every retry and its backoff
/// fit inside `deadline`. Falls back to an even split when the backoff alone
/// exceeds the deadline.
pub fn attempt_timeout(deadline: Duration) -> Duration {
    let backoff_total: Duration = (1..=MAX_RETRIES).map(backoff).sum();
    let budget = deadline
        .checked_sub(backoff_total)
        .filter(|b| !b.is_zero())
        .unwrap_or(deadline);
    budget / (MAX_RETRIES + 1)
}

/// Hard stop for a runaway cursor.
const MAX_PAGES: usize = 10_000;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct HotkeyPage {
    #[serde(default)]
    hotkeys: Vec<String>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Decode a JSON-RPC response body into `T`. A missing or null `result`
/// decodes as JSON `null`, so `Option<_>` targets see `None`.
fn decode_response<T: DeserializeOwned>(method: &str, body: &str) -> Result<T> {
    let parsed: RpcResponse = serde_json::from_str(body)
        .with_context(|| format!("Malformed JSON-RPC response to {method}"))?;

    if let Some(err) = parsed.error {
        bail!("{method} failed with RPC error {}: {}", err.code, err.message);
    }

    serde_json::from_value(parsed.result.unwrap_or(Value::Null))
        .with_context(|| format!("Unexpected result shape for {method}"))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct RpcChainClient {
    http: Client,
    url: String,
    page_size: u32,
    read_timeout: Duration,
    next_id: AtomicU64,
}

impl RpcChainClient {
    /// `deadline` bounds a whole read including retries, and a single
    /// submission.
    pub fn new(url: &str, deadline: Duration, page_size: u32) -> Result<Self> {
        let http = Client::builder()
            .timeout(deadline)
            .build()
            .context("Failed to build chain RPC HTTP client")?;

        Ok(Self {
            http,
            url: url.to_string(),
            page_size: page_size.max(1),
            read_timeout: attempt_timeout(deadline),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call_once<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &Value,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut request = self.http.post(&self.url).json(&payload);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let resp = request
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?;

        let status = resp.status();
        let body = resp.text().await.context("Failed to read RPC response body")?;
        if !status.is_success() {
            bail!("{method} returned HTTP {status}: {body}");
        }

        decode_response(method, &body)
    }

    /// Idempotent read with retry on transport and server errors.
    async fn read<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(backoff(attempt)).await;
            }

            match self.call_once(method, &params, Some(self.read_timeout)).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(method, attempt, error = %e, "Chain read failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("{method} failed")))
            .with_context(|| format!("{method} failed after {MAX_RETRIES} retries"))
    }

    async fn submit(
        &self,
        method: &str,
        wallet: &Wallet,
        hotkey: &str,
        netuid: Netuid,
        amount_rao: u64,
    ) -> Result<ExtrinsicReceipt> {
        let params = json!([{
            "wallet": wallet.name,
            "coldkey": wallet.coldkey,
            "hotkey": hotkey,
            "netuid": netuid,
            "amount": amount_rao,
        }]);
        debug!(method, hotkey, netuid, amount_rao, "Submitting extrinsic");
        self.call_once(method, &params, None).await
    }
}

#[async_trait]
impl SubtensorChain for RpcChainClient {
    async fn tao_dividend(&self, netuid: Netuid, hotkey: &str) -> Result<Option<u64>> {
        self.read("subtensor_getTaoDividend", json!([netuid, hotkey])).await
    }

    async fn hotkeys_for_netuid(&self, netuid: Netuid) -> Result<Vec<String>> {
        let mut hotkeys = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page: HotkeyPage = self
                .read(
                    "subtensor_getTaoDividendHotkeys",
                    json!([netuid, cursor, self.page_size]),
                )
                .await?;

            hotkeys.extend(page.hotkeys);
            match page.next_cursor {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => {
                    debug!(netuid, count = hotkeys.len(), "Hotkeys enumerated");
                    return Ok(hotkeys);
                }
            }
        }

        bail!("Hotkey cursor for netuid {netuid} did not terminate after {MAX_PAGES} pages")
    }

    async fn all_netuids(&self) -> Result<Vec<Netuid>> {
        self.read("subtensor_getSubnets", json!([])).await
    }

    async fn stake_balance(&self, hotkey: &str, netuid: Netuid) -> Result<u64> {
        let stake: Option<u64> = self.read("subtensor_getStake", json!([hotkey, netuid])).await?;
        Ok(stake.unwrap_or(0))
    }

    async fn add_stake(
        &self,
        wallet: &Wallet,
        hotkey: &str,
        netuid: Netuid,
        amount_rao: u64,
    ) -> Result<ExtrinsicReceipt> {
        self.submit("subtensor_addStake", wallet, hotkey, netuid, amount_rao).await
    }

    async fn remove_stake(
        &self,
        wallet: &Wallet,
        hotkey: &str,
        netuid: Netuid,
        amount_rao: u64,
    ) -> Result<ExtrinsicReceipt> {
        self.submit("subtensor_removeStake", wallet, hotkey, netuid, amount_rao).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
