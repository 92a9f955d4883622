//! Background trade jobs.
//!
//! The HTTP handler enqueues a [`TradeJob`] and returns immediately; a
//! single worker task pulls jobs off an unbounded channel and runs each
//! through the sentiment → stake pipeline on its own task. Closing every
//! [`TradeQueue`] handle stops the worker once in-flight jobs finish.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::executor::{TradeExecutor, TradeOutcome};
use super::sentiment::{MentionWindow, SentimentPipeline};
use crate::types::Netuid;

/// A deferred stake adjustment request, as received from the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeJob {
    pub netuid: Option<Netuid>,
    pub hotkey: Option<String>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct TradePipeline {
    sentiment: SentimentPipeline,
    executor: TradeExecutor,
    window_days: u64,
    default_hotkey: Option<String>,
}

impl TradePipeline {
    pub fn new(sentiment: SentimentPipeline, executor: TradeExecutor) -> Self {
        Self {
            sentiment,
            executor,
            window_days: 1,
            default_hotkey: None,
        }
    }

    pub fn with_window_days(mut self, days: u64) -> Self {
        self.window_days = days.max(1);
        self
    }

    pub fn with_default_hotkey(mut self, hotkey: Option<String>) -> Self {
        self.default_hotkey = hotkey.filter(|h| !h.trim().is_empty());
        self
    }

    /// Score sentiment for the job's subnet and adjust stake accordingly.
    ///
    /// Returns `None` when the job cannot be acted on at all.
    pub async fn run(&self, job: TradeJob) -> Option<TradeOutcome> {
        let Some(netuid) = job.netuid else {
            warn!(?job, "Trade job without netuid skipped");
            return None;
        };
        let hotkey = match job
            .hotkey
            .filter(|h| !h.trim().is_empty())
            .or_else(|| self.default_hotkey.clone())
        {
            Some(h) => h,
            None => {
                warn!(netuid, "Trade job without hotkey and no default configured");
                return None;
            }
        };

        let window = MentionWindow::trailing(chrono::Utc::now().date_naive(), self.window_days);
        let sentiment = self.sentiment.compute_sentiment(netuid, window).await;
        let outcome = self
            .executor
            .execute_adjustment(netuid, &hotkey, sentiment)
            .await;

        match &outcome {
            TradeOutcome::Submitted { receipt, record } => info!(
                netuid,
                hotkey = %hotkey,
                id = record.id,
                extrinsic = %receipt.extrinsic_hash,
                "Trade job complete"
            ),
            TradeOutcome::Failed { reason } => {
                warn!(netuid, hotkey = %hotkey, reason = %reason, "Trade job failed")
            }
            other => debug!(netuid, hotkey = %hotkey, outcome = ?other, "Trade job finished"),
        }
        Some(outcome)
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Cheap, cloneable handle for submitting trade jobs.
#[derive(Clone)]
pub struct TradeQueue {
    tx: mpsc::UnboundedSender<TradeJob>,
}

impl TradeQueue {
    /// A queue whose receiving end the caller drives.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TradeJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Spawn the worker and return a handle to feed it.
    pub fn spawn(pipeline: Arc<TradePipeline>) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::channel();
        let worker = tokio::spawn(run_worker(pipeline, rx));
        (queue, worker)
    }

    /// Hand a job to the worker. Returns `false` if the worker is gone.
    pub fn enqueue(&self, netuid: Option<Netuid>, hotkey: Option<String>) -> bool {
        let job = TradeJob { netuid, hotkey };
        match self.tx.send(job) {
            Ok(()) => true,
            Err(e) => {
                error!(job = ?e.0, "Trade worker is not running, job dropped");
                false
            }
        }
    }
}

async fn run_worker(pipeline: Arc<TradePipeline>, mut rx: mpsc::UnboundedReceiver<TradeJob>) {
    let mut tasks = JoinSet::new();
    info!("Trade worker started");

    loop {
        tokio::select! {
            job = rx.recv() => match job {
                Some(job) => {
                    let pipeline = pipeline.clone();
                    tasks.spawn(async move { pipeline.run(job).await });
                }
                None => break,
            },
            Some(done) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = done {
                    error!(error = %e, "Trade job panicked");
                }
            }
        }
    }

    let pending = tasks.len();
    if pending > 0 {
        info!(pending, "Queue closed, waiting for in-flight trade jobs");
    }
    while let Some(done) = tasks.join_next().await {
        if let Err(e) = done {
            error!(error = %e, "Trade job panicked");
        }
    }
    info!("Trade worker stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
