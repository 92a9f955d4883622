//! Shared types for the Tao dividends service.
//!
//! These types form the data model used across all modules so that the
//! chain, engine, storage and API layers can depend on them without
//! circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subnet identifier.
pub type Netuid = u16;

/// Smallest on-chain unit; 1 TAO = 10^9 rao.
pub const RAO_PER_TAO: u64 = 1_000_000_000;

// ---------------------------------------------------------------------------
// Dividends
// ---------------------------------------------------------------------------

/// Dividend of one hotkey on one subnet at the current chain head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendRecord {
    pub netuid: Netuid,
    /// SS58 address of the hotkey.
    pub hotkey: String,
    /// Raw dividend in rao.
    pub dividend: u64,
    /// Served from the cache without a chain read.
    pub cached: bool,
    /// The request asked for a trade and this value came from the chain.
    /// Informational only; it does not itself schedule anything.
    pub stake_tx_triggered: bool,
}

/// Filter supplied by a dividends request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DividendQuery {
    #[serde(default)]
    pub netuid: Option<Netuid>,
    #[serde(default)]
    pub hotkey: Option<String>,
    #[serde(default)]
    pub trade: bool,
}

/// Which shape of chain read a [`DividendQuery`] resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// One (netuid, hotkey) point query.
    Single { netuid: Netuid, hotkey: String },
    /// Every hotkey registered on one subnet.
    Subnet(Netuid),
    /// One hotkey on every subnet it is registered on.
    Hotkey(String),
    /// Every hotkey on every subnet.
    Everything,
}

impl DividendQuery {
    pub fn new(netuid: Option<Netuid>, hotkey: Option<String>, trade: bool) -> Self {
        Self { netuid, hotkey, trade }
    }

    /// The hotkey filter, treating an empty string as absent.
    pub fn hotkey(&self) -> Option<&str> {
        self.hotkey.as_deref().map(str::trim).filter(|h| !h.is_empty())
    }

    /// Pick the resolution branch, most specific first.
    pub fn resolution(&self) -> Resolution {
        match (self.netuid, self.hotkey()) {
            (Some(netuid), Some(hotkey)) => Resolution::Single {
                netuid,
                hotkey: hotkey.to_string(),
            },
            (Some(netuid), None) => Resolution::Subnet(netuid),
            (None, Some(hotkey)) => Resolution::Hotkey(hotkey.to_string()),
            (None, None) => Resolution::Everything,
        }
    }
}

// ---------------------------------------------------------------------------
// Sentiment
// ---------------------------------------------------------------------------

/// Aggregate opinion polarity in [-100, 100]; 0 means no action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SentimentScore(i32);

impl SentimentScore {
    pub const MIN: i32 = -100;
    pub const MAX: i32 = 100;
    pub const NEUTRAL: SentimentScore = SentimentScore(0);

    /// Build a score, clamping into range.
    pub fn new(raw: i64) -> Self {
        Self(raw.clamp(Self::MIN as i64, Self::MAX as i64) as i32)
    }

    pub fn value(self) -> i32 {
        self.0
    }

    pub fn is_neutral(self) -> bool {
        self.0 == 0
    }

    pub fn magnitude(self) -> u32 {
        self.0.unsigned_abs()
    }
}

impl fmt::Display for SentimentScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.0)
    }
}

/// A social-media mention of a subnet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub text: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub like_count: Option<u64>,
}

impl Mention {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            id: None,
            url: None,
            created_at: None,
            like_count: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Staking
// ---------------------------------------------------------------------------

/// Direction of a stake adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeAction {
    Stake,
    Unstake,
}

impl StakeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StakeAction::Stake => "stake",
            StakeAction::Unstake => "unstake",
        }
    }
}

impl fmt::Display for StakeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StakeAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stake" => Ok(StakeAction::Stake),
            "unstake" => Ok(StakeAction::Unstake),
            _ => Err(anyhow::anyhow!("Unknown stake action: {s}")),
        }
    }
}

/// Signing identity used to submit extrinsics for a hotkey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Wallet name as known to the signing gateway.
    pub name: String,
    pub hotkey: String,
    /// SS58 address of the coldkey that owns the stake.
    pub coldkey: String,
}

/// Receipt returned after an extrinsic is included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtrinsicReceipt {
    pub extrinsic_hash: String,
    #[serde(default)]
    pub block_hash: Option<String>,
}

impl ExtrinsicReceipt {
    /// Placeholder receipt for a dry run (nothing submitted).
    pub fn dry_run() -> Self {
        Self {
            extrinsic_hash: format!("dry-run-{}", uuid::Uuid::new_v4()),
            block_hash: None,
        }
    }
}

/// A stake adjustment about to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAdjustment {
    pub netuid: Netuid,
    pub hotkey: String,
    pub sentiment_score: SentimentScore,
    pub action: StakeAction,
    pub amount_tao: Decimal,
}

/// A persisted stake adjustment. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeAdjustment {
    pub id: i64,
    pub netuid: Netuid,
    pub hotkey: String,
    pub sentiment_score: i32,
    pub action: StakeAction,
    pub amount_tao: Decimal,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for StakeAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} TAO on netuid {} via {} (sentiment {:+})",
            self.id, self.action, self.amount_tao, self.netuid, self.hotkey, self.sentiment_score,
        )
    }
}

/// Convert rao to TAO.
pub fn rao_to_tao(rao: u64) -> Decimal {
    Decimal::from(rao) / Decimal::from(RAO_PER_TAO)
}
