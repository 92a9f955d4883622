//! Sentiment pipeline.
//!
//! Fetches recent social mentions of a subnet and asks a remote model to
//! rate them. Every upstream problem degrades to "no data" or a neutral
//! score; a neutral score never leads to a trade.

use chrono::{Days, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::data::MentionSource;
use crate::llm::{build_prompt, extract_sentiment_score, SentimentScorer};
use crate::types::{Mention, Netuid, SentimentScore};

pub const DEFAULT_MENTION_LIMIT: u32 = 10;

/// Inclusive date range mentions are searched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MentionWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MentionWindow {
    /// `days` back from `end` through `end`.
    pub fn trailing(end: NaiveDate, days: u64) -> Self {
        Self {
            start: end.checked_sub_days(Days::new(days)).unwrap_or(end),
            end,
        }
    }

    /// Yesterday through today (UTC).
    pub fn yesterday_to_today() -> Self {
        Self::trailing(Utc::now().date_naive(), 1)
    }
}

pub struct SentimentPipeline {
    mentions: Arc<dyn MentionSource>,
    scorer: Arc<dyn SentimentScorer>,
    mention_limit: u32,
}

impl SentimentPipeline {
    pub fn new(mentions: Arc<dyn MentionSource>, scorer: Arc<dyn SentimentScorer>) -> Self {
        Self {
            mentions,
            scorer,
            mention_limit: DEFAULT_MENTION_LIMIT,
        }
    }

    pub fn with_mention_limit(mut self, limit: u32) -> Self {
        self.mention_limit = limit.max(1);
        self
    }

    /// Score the current sentiment around a subnet.
    pub async fn compute_sentiment(&self, netuid: Netuid, window: MentionWindow) -> SentimentScore {
        let mentions = self.fetch_mentions(netuid, window).await;
        if mentions.is_empty() {
            info!(netuid, "No mentions found, sentiment is neutral");
            return SentimentScore::NEUTRAL;
        }

        let texts: Vec<&str> = mentions.iter().map(|m| m.text.as_str()).collect();
        let score = self.score_texts(&texts).await;
        info!(netuid, mentions = mentions.len(), %score, "Sentiment computed");
        score
    }

    async fn fetch_mentions(&self, netuid: Netuid, window: MentionWindow) -> Vec<Mention> {
        match self
            .mentions
            .search_mentions(netuid, window.start, window.end, self.mention_limit)
            .await
        {
            Ok(mentions) => mentions
                .into_iter()
                .filter(|m| !m.text.trim().is_empty())
                .collect(),
            Err(e) => {
                warn!(netuid, error = %format!("{e:#}"), "Mention search failed");
                Vec::new()
            }
        }
    }

    async fn score_texts(&self, texts: &[&str]) -> SentimentScore {
        let prompt = build_prompt(texts);
        match self.scorer.score(&prompt).await {
            Ok(reply) => {
                let score = extract_sentiment_score(&reply);
                debug!(%score, reply_chars = reply.len(), "Scorer replied");
                score
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Sentiment scoring failed, using neutral");
                SentimentScore::NEUTRAL
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
