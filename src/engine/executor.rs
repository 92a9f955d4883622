//! Trade executor.
//!
//! Turns a sentiment score into a stake or unstake extrinsic, submits it
//! with the hotkey's wallet and records the outcome. Failures are logged
//! and reported as [`TradeOutcome::Failed`]; nothing here ever returns an
//! error to the caller.

use anyhow::{Context, Result};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{error, info};

use crate::chain::{SubtensorChain, WalletStore};
use crate::storage::AdjustmentStore;
use crate::types::{
    rao_to_tao, ExtrinsicReceipt, NewAdjustment, Netuid, SentimentScore, StakeAction,
    StakeAdjustment, RAO_PER_TAO,
};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What a stake adjustment attempt ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeOutcome {
    /// Nothing to do (neutral score, zero amount, nothing staked).
    NoAction { reason: &'static str },
    /// Dry-run mode: the extrinsic was only logged.
    DryRun { action: StakeAction, amount_rao: u64, receipt: ExtrinsicReceipt },
    Submitted { receipt: ExtrinsicReceipt, record: StakeAdjustment },
    Failed { reason: String },
}

impl TradeOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, TradeOutcome::Submitted { .. })
    }
}

/// Rao to move for a score: `unit_tao × |score| / 100` TAO, rounded down.
pub fn stake_amount_rao(sentiment: SentimentScore, unit_tao: Decimal) -> u64 {
    let tao = unit_tao * Decimal::from(sentiment.magnitude()) / dec!(100);
    (tao * Decimal::from(RAO_PER_TAO))
        .floor()
        .to_u64()
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct TradeExecutor {
    chain: Arc<dyn SubtensorChain>,
    wallets: Arc<dyn WalletStore>,
    store: Arc<dyn AdjustmentStore>,
    stake_unit_tao: Decimal,
    dry_run: bool,
}

impl TradeExecutor {
    pub fn new(
        chain: Arc<dyn SubtensorChain>,
        wallets: Arc<dyn WalletStore>,
        store: Arc<dyn AdjustmentStore>,
        dry_run: bool,
    ) -> Self {
        Self {
            chain,
            wallets,
            store,
            stake_unit_tao: dec!(1),
            dry_run,
        }
    }

    pub fn with_stake_unit(mut self, unit_tao: Decimal) -> Self {
        self.stake_unit_tao = unit_tao;
        self
    }

    /// Adjust stake on `hotkey` in `netuid` according to `sentiment`.
    pub async fn execute_adjustment(
        &self,
        netuid: Netuid,
        hotkey: &str,
        sentiment: SentimentScore,
    ) -> TradeOutcome {
        match self.try_execute(netuid, hotkey, sentiment).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = format!("{e:#}");
                error!(netuid, hotkey, %sentiment, error = %reason, "Stake adjustment failed");
                TradeOutcome::Failed { reason }
            }
        }
    }

    async fn try_execute(
        &self,
        netuid: Netuid,
        hotkey: &str,
        sentiment: SentimentScore,
    ) -> Result<TradeOutcome> {
        if sentiment.is_neutral() {
            info!(netuid, hotkey, "Neutral sentiment, no stake adjustment");
            return Ok(TradeOutcome::NoAction { reason: "neutral sentiment" });
        }

        let magnitude = stake_amount_rao(sentiment, self.stake_unit_tao);
        if magnitude == 0 {
            info!(netuid, hotkey, %sentiment, "Adjustment rounds to zero rao");
            return Ok(TradeOutcome::NoAction { reason: "amount rounds to zero" });
        }

        let (action, amount_rao) = if sentiment.value() > 0 {
            (StakeAction::Stake, magnitude)
        } else {
            let staked = self
                .chain
                .stake_balance(hotkey, netuid)
                .await
                .context("Failed to read current stake")?;
            if staked == 0 {
                info!(netuid, hotkey, %sentiment, "Nothing staked, cannot unstake");
                return Ok(TradeOutcome::NoAction { reason: "nothing staked" });
            }
            (StakeAction::Unstake, magnitude.min(staked))
        };
        let amount_tao = rao_to_tao(amount_rao);

        if self.dry_run {
            info!(
                netuid,
                hotkey,
                %sentiment,
                %action,
                amount = %amount_tao,
                "[DRY RUN] Would submit stake adjustment"
            );
            return Ok(TradeOutcome::DryRun {
                action,
                amount_rao,
                receipt: ExtrinsicReceipt::dry_run(),
            });
        }

        let wallet = self
            .wallets
            .load(hotkey)
            .await
            .context("Failed to load wallet")?;

        let receipt = match action {
            StakeAction::Stake => self.chain.add_stake(&wallet, hotkey, netuid, amount_rao).await,
            StakeAction::Unstake => {
                self.chain
                    .remove_stake(&wallet, hotkey, netuid, amount_rao)
                    .await
            }
        }
        .with_context(|| format!("{action} extrinsic failed"))?;

        info!(
            netuid,
            hotkey,
            %action,
            amount = %amount_tao,
            extrinsic = %receipt.extrinsic_hash,
            "Stake adjustment submitted"
        );

        let record = self
            .store
            .save_adjustment(NewAdjustment {
                netuid,
                hotkey: hotkey.to_string(),
                sentiment_score: sentiment,
                action,
                amount_tao,
            })
            .await
            .context("Extrinsic submitted but adjustment was not recorded")?;

        Ok(TradeOutcome::Submitted { receipt, record })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
