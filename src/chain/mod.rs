//! Subtensor chain access.
//!
//! Defines the `SubtensorChain` trait the engine consumes and the
//! `WalletStore` trait that hands out signing identities. The shipped
//! implementations talk JSON-RPC to a subtensor gateway (`rpc`) and read
//! wallet descriptors from disk (`wallet`).

pub mod rpc;
pub mod wallet;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{ExtrinsicReceipt, Netuid, Wallet};

/// Reads and writes against the subtensor registry.
///
/// All reads are taken at the current chain head.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubtensorChain: Send + Sync {
    /// Dividend for one hotkey on one subnet; `None` when nothing is stored.
    async fn tao_dividend(&self, netuid: Netuid, hotkey: &str) -> Result<Option<u64>>;

    /// Every hotkey with a dividend entry on `netuid`.
    async fn hotkeys_for_netuid(&self, netuid: Netuid) -> Result<Vec<String>>;

    /// Every registered subnet.
    async fn all_netuids(&self) -> Result<Vec<Netuid>>;

    /// Stake currently held on `hotkey` in `netuid`, in rao.
    async fn stake_balance(&self, hotkey: &str, netuid: Netuid) -> Result<u64>;

    /// Sign and submit an add-stake extrinsic.
    async fn add_stake(
        &self,
        wallet: &Wallet,
        hotkey: &str,
        netuid: Netuid,
        amount_rao: u64,
    ) -> Result<ExtrinsicReceipt>;

    /// Sign and submit a remove-stake extrinsic.
    async fn remove_stake(
        &self,
        wallet: &Wallet,
        hotkey: &str,
        netuid: Netuid,
        amount_rao: u64,
    ) -> Result<ExtrinsicReceipt>;
}

/// Source of signing identities, keyed by hotkey.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn load(&self, hotkey: &str) -> Result<Wallet>;
}
