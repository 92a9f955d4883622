//! LLM integration for sentiment scoring.
//!
//! Defines the `SentimentScorer` trait and the Chutes (OpenAI-compatible
//! chat completions) implementation, plus the prompt and the score
//! extraction shared by any provider.

pub mod chutes;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::SentimentScore;

/// Label the model is asked to put in front of its answer.
pub const SCORE_LABEL: &str = "Sentiment Score";

/// Abstraction over a remote text model that rates sentiment.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SentimentScorer: Send + Sync {
    /// Send the prompt and return the model's free-text reply.
    async fn score(&self, prompt: &str) -> Result<String>;
}

/// Build the scoring prompt for a batch of mention texts.
pub fn build_prompt<S: AsRef<str>>(texts: &[S]) -> String {
    let body = texts
        .iter()
        .map(|t| t.as_ref().trim())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Analyze the sentiment of the following tweets about a subnet in the Bittensor network. \
         Return a single integer sentiment score between -100 and 100. \
         Only include the score in your final answer like: '{SCORE_LABEL}: 25'\n\n{body}"
    )
}

/// Pull the score out of a free-text reply.
///
/// Takes the first signed integer that follows the case-sensitive label
/// `Sentiment Score`, allowing any run of colons and whitespace between
/// them, and clamps it to [-100, 100]. Anything unparseable is neutral.
pub fn extract_sentiment_score(text: &str) -> SentimentScore {
    text.match_indices(SCORE_LABEL)
        .find_map(|(idx, _)| parse_signed_int(&text[idx + SCORE_LABEL.len()..]))
        .map(SentimentScore::new)
        .unwrap_or(SentimentScore::NEUTRAL)
}

/// Parse `[:\s]*-?\d+` at the start of `s`. Oversized values saturate.
fn parse_signed_int(s: &str) -> Option<i64> {
    let rest = s.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    let (negative, digits) = match rest.strip_prefix('-') {
        Some(after) => (true, after),
        None => (false, rest),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}
