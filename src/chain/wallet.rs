//! Wallet descriptors on disk.
//!
//! Each hotkey the service may trade for has a `<wallet_dir>/<hotkey>.json`
//! file naming the wallet and its coldkey. Key material itself stays with
//! the signing gateway.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

use super::WalletStore;
use crate::types::Wallet;

#[derive(Debug, Deserialize)]
struct WalletFile {
    name: String,
    #[serde(rename = "coldkeyAddress", alias = "coldkey")]
    coldkey: String,
}

pub struct KeyfileWalletStore {
    dir: PathBuf,
}

impl KeyfileWalletStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, hotkey: &str) -> Result<PathBuf> {
        // Hotkeys are SS58 strings; anything else could escape the directory.
        if hotkey.is_empty() || !hotkey.chars().all(|c| c.is_ascii_alphanumeric()) {
            bail!("Refusing to load wallet for malformed hotkey {hotkey:?}");
        }
        Ok(self.dir.join(format!("{hotkey}.json")))
    }
}

#[async_trait]
impl WalletStore for KeyfileWalletStore {
    async fn load(&self, hotkey: &str) -> Result<Wallet> {
        let path = self.path_for(hotkey)?;
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("No wallet for hotkey {hotkey} at {}", path.display()))?;
        let file: WalletFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse wallet file {}", path.display()))?;

        debug!(hotkey, wallet = %file.name, "Wallet loaded");
        Ok(Wallet {
            name: file.name,
            hotkey: hotkey.to_string(),
            coldkey: file.coldkey,
        })
    }
}
