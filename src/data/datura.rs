//! Datura Twitter search provider.
//!
//! API: `GET https://apis.datura.ai/twitter`
//! Auth: raw API key in the `Authorization` header.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::debug;

use super::MentionSource;
use crate::types::{Mention, Netuid};

pub const DATURA_API_URL: &str = "https://apis.datura.ai/twitter";

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct DaturaClient {
    http: Client,
    url: String,
    api_key: SecretString,
}

impl DaturaClient {
    pub fn new(url: Option<String>, api_key: SecretString, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("tao-dividends/0.1.0")
            .build()
            .context("Failed to build Datura HTTP client")?;
        Ok(Self {
            http,
            url: url.unwrap_or_else(|| DATURA_API_URL.to_string()),
            api_key,
        })
    }

    fn search_query(netuid: Netuid) -> String {
        format!("Bittensor netuid {netuid}")
    }

    fn query_params(
        netuid: Netuid,
        start: NaiveDate,
        end: NaiveDate,
        limit: u32,
    ) -> Vec<(&'static str, String)> {
        vec![
            ("query", Self::search_query(netuid)),
            ("blue_verified", "false".to_string()),
            ("start_date", start.format(DATE_FORMAT).to_string()),
            ("end_date", end.format(DATE_FORMAT).to_string()),
            ("is_image", "false".to_string()),
            ("is_quote", "false".to_string()),
            ("is_video", "false".to_string()),
            ("lang", "en".to_string()),
            ("min_likes", "0".to_string()),
            ("min_replies", "0".to_string()),
            ("min_retweets", "0".to_string()),
            ("sort", "Top".to_string()),
            ("count", limit.to_string()),
        ]
    }
}

#[async_trait]
impl MentionSource for DaturaClient {
    async fn search_mentions(
        &self,
        netuid: Netuid,
        start: NaiveDate,
        end: NaiveDate,
        limit: u32,
    ) -> Result<Vec<Mention>> {
        let resp = self
            .http
            .get(&self.url)
            .query(&Self::query_params(netuid, start, end, limit))
            .header("Authorization", self.api_key.expose_secret().as_str())
            .header("Content-Type", "application/json")
            .send()
            .await
            .context("Datura search request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Datura search returned {status}: {body}");
        }

        let mut mentions: Vec<Mention> = resp
            .json()
            .await
            .context("Failed to parse Datura search response")?;
        mentions.truncate(limit as usize);

        debug!(netuid, count = mentions.len(), %start, %end, "Mentions fetched");
        Ok(mentions)
    }
}
