//! In-memory chain and sentiment fakes for integration testing.
//!
//! `MockChain` holds a fixed dividend table, answers reads with an optional
//! artificial delay, and records every call so tests can assert on call
//! counts, peak concurrency and submitted extrinsics.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tao_dividends::chain::{SubtensorChain, WalletStore};
use tao_dividends::data::MentionSource;
use tao_dividends::llm::SentimentScorer;
use tao_dividends::types::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub action: StakeAction,
    pub netuid: Netuid,
    pub hotkey: String,
    pub amount_rao: u64,
}

#[derive(Default)]
pub struct MockChain {
    /// netuid → hotkeys in enumeration order.
    subnets: BTreeMap<Netuid, Vec<String>>,
    dividends: HashMap<(Netuid, String), u64>,
    stakes: Mutex<HashMap<(Netuid, String), u64>>,
    delay: Duration,
    failing_reads: HashSet<Netuid>,
    failing_enumeration: HashSet<Netuid>,

    pub dividend_reads: AtomicUsize,
    pub enumeration_reads: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    submitted: Mutex<Vec<Submitted>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subnet. A `None` dividend lists the hotkey without
    /// storing a value for it.
    pub fn with_subnet(mut self, netuid: Netuid, entries: &[(&str, Option<u64>)]) -> Self {
        let hotkeys = entries.iter().map(|(h, _)| h.to_string()).collect();
        for (hotkey, dividend) in entries {
            if let Some(d) = dividend {
                self.dividends.insert((netuid, hotkey.to_string()), *d);
            }
        }
        self.subnets.insert(netuid, hotkeys);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_stake(self, netuid: Netuid, hotkey: &str, rao: u64) -> Self {
        self.stakes
            .lock()
            .unwrap()
            .insert((netuid, hotkey.to_string()), rao);
        self
    }

    /// Point reads on `netuid` fail.
    pub fn failing_reads(mut self, netuid: Netuid) -> Self {
        self.failing_reads.insert(netuid);
        self
    }

    /// Hotkey enumeration on `netuid` fails.
    pub fn failing_enumeration(mut self, netuid: Netuid) -> Self {
        self.failing_enumeration.insert(netuid);
        self
    }

    pub fn reads(&self) -> usize {
        self.dividend_reads.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<Submitted> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn stake_of(&self, netuid: Netuid, hotkey: &str) -> u64 {
        self.stakes
            .lock()
            .unwrap()
            .get(&(netuid, hotkey.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn record(&self, action: StakeAction, netuid: Netuid, hotkey: &str, amount_rao: u64) -> ExtrinsicReceipt {
        let mut stakes = self.stakes.lock().unwrap();
        let entry = stakes.entry((netuid, hotkey.to_string())).or_insert(0);
        match action {
            StakeAction::Stake => *entry += amount_rao,
            StakeAction::Unstake => *entry = entry.saturating_sub(amount_rao),
        }

        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(Submitted {
            action,
            netuid,
            hotkey: hotkey.to_string(),
            amount_rao,
        });
        ExtrinsicReceipt {
            extrinsic_hash: format!("0x{:04x}", submitted.len()),
            block_hash: Some("0xblock".into()),
        }
    }
}

#[async_trait]
impl SubtensorChain for MockChain {
    async fn tao_dividend(&self, netuid: Netuid, hotkey: &str) -> Result<Option<u64>> {
        self.dividend_reads.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_reads.contains(&netuid) {
            return Err(anyhow!("storage read failed on netuid {netuid}"));
        }
        Ok(self.dividends.get(&(netuid, hotkey.to_string())).copied())
    }

    async fn hotkeys_for_netuid(&self, netuid: Netuid) -> Result<Vec<String>> {
        self.enumeration_reads.fetch_add(1, Ordering::SeqCst);
        if self.failing_enumeration.contains(&netuid) {
            return Err(anyhow!("enumeration failed on netuid {netuid}"));
        }
        Ok(self.subnets.get(&netuid).cloned().unwrap_or_default())
    }

    async fn all_netuids(&self) -> Result<Vec<Netuid>> {
        Ok(self.subnets.keys().copied().collect())
    }

    async fn stake_balance(&self, hotkey: &str, netuid: Netuid) -> Result<u64> {
        Ok(self.stake_of(netuid, hotkey))
    }

    async fn add_stake(
        &self,
        _wallet: &Wallet,
        hotkey: &str,
        netuid: Netuid,
        amount_rao: u64,
    ) -> Result<ExtrinsicReceipt> {
        Ok(self.record(StakeAction::Stake, netuid, hotkey, amount_rao))
    }

    async fn remove_stake(
        &self,
        _wallet: &Wallet,
        hotkey: &str,
        netuid: Netuid,
        amount_rao: u64,
    ) -> Result<ExtrinsicReceipt> {
        Ok(self.record(StakeAction::Unstake, netuid, hotkey, amount_rao))
    }
}

/// Hands out a wallet for every hotkey.
pub struct OpenWallets;

#[async_trait]
impl WalletStore for OpenWallets {
    async fn load(&self, hotkey: &str) -> Result<Wallet> {
        Ok(Wallet {
            name: "test".into(),
            hotkey: hotkey.to_string(),
            coldkey: "5Ctestcoldkey".into(),
        })
    }
}

/// Returns the same mentions for every subnet.
pub struct FixedMentions(pub Vec<&'static str>);

#[async_trait]
impl MentionSource for FixedMentions {
    async fn search_mentions(
        &self,
        _netuid: Netuid,
        _start: NaiveDate,
        _end: NaiveDate,
        limit: u32,
    ) -> Result<Vec<Mention>> {
        Ok(self
            .0
            .iter()
            .take(limit as usize)
            .map(|t| Mention::from_text(*t))
            .collect())
    }
}

/// Replies with a fixed score and counts calls.
pub struct FixedScorer {
    pub reply: String,
    pub calls: Arc<AtomicUsize>,
}

impl FixedScorer {
    pub fn scoring(score: i32) -> Self {
        Self {
            reply: format!("The tweets are mixed.\nSentiment Score: {score}"),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl SentimentScorer for FixedScorer {
    async fn score(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}
