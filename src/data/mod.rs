//! Social mention providers.
//!
//! Defines the `MentionSource` trait used by the sentiment pipeline and a
//! Datura Twitter-search implementation.

pub mod datura;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::{Mention, Netuid};

/// Abstraction over social-media search.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MentionSource: Send + Sync {
    /// Most relevant recent mentions of a subnet between two dates
    /// (inclusive), at most `limit` of them.
    async fn search_mentions(
        &self,
        netuid: Netuid,
        start: NaiveDate,
        end: NaiveDate,
        limit: u32,
    ) -> Result<Vec<Mention>>;
}
