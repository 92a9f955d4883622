use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tao_dividends::engine::executor::{TradeExecutor, TradeOutcome};
use tao_dividends::engine::queue::{TradeJob, TradePipeline, TradeQueue};
use tao_dividends::engine::sentiment::{MentionWindow, SentimentPipeline};
use tao_dividends::storage::SqliteAdjustmentStore;
use tao_dividends::types::{StakeAction, RAO_PER_TAO};

use crate::mock_chain::{FixedMentions, FixedScorer, MockChain, OpenWallets, Submitted};

async fn store() -> Arc<SqliteAdjustmentStore> {
    Arc::new(SqliteAdjustmentStore::connect("sqlite::memory:").await.unwrap())
}

fn sentiment(score: i32) -> SentimentPipeline {
    SentimentPipeline::new(
        Arc::new(FixedMentions(vec!["Subnet 18 looks strong", "Emissions up again"])),
        Arc::new(FixedScorer::scoring(score)),
    )
}

fn executor(chain: Arc<MockChain>, store: Arc<SqliteAdjustmentStore>, dry_run: bool) -> TradeExecutor {
    TradeExecutor::new(chain, Arc::new(OpenWallets), store, dry_run)
}

#[tokio::test]
async fn positive_sentiment_stakes_and_records() {
    let chain = Arc::new(MockChain::new());
    let store = store().await;
    let pipeline = TradePipeline::new(sentiment(75), executor(chain.clone(), store.clone(), false));

    let outcome = pipeline
        .run(TradeJob { netuid: Some(18), hotkey: Some("5Fhot".into()) })
        .await
        .unwrap();
    assert!(outcome.is_submitted());

    assert_eq!(
        chain.submitted(),
        vec![Submitted {
            action: StakeAction::Stake,
            netuid: 18,
            hotkey: "5Fhot".into(),
            amount_rao: 750_000_000,
        }]
    );

    let rows = store.recent(10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].action, StakeAction::Stake);
    assert_eq!(rows[0].amount_tao, dec!(0.75));
    assert_eq!(rows[0].sentiment_score, 75);
}

#[tokio::test]
async fn negative_sentiment_unstakes_at_most_the_balance() {
    let chain = Arc::new(MockChain::new().with_stake(18, "5Fhot", 200_000_000));
    let store = store().await;
    let exec = executor(chain.clone(), store.clone(), false);

    let score = sentiment(-90)
        .compute_sentiment(18, MentionWindow::yesterday_to_today())
        .await;
    assert_eq!(score.value(), -90);

    let outcome = exec.execute_adjustment(18, "5Fhot", score).await;
    assert!(outcome.is_submitted());
    assert_eq!(chain.submitted()[0].amount_rao, 200_000_000);
    assert_eq!(chain.stake_of(18, "5Fhot"), 0);

    // Nothing left: a second bearish run is a no-op.
    let again = exec.execute_adjustment(18, "5Fhot", score).await;
    assert!(matches!(again, TradeOutcome::NoAction { .. }));
    assert_eq!(chain.submitted().len(), 1);
    assert_eq!(store.recent(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn neutral_sentiment_leaves_chain_untouched() {
    let chain = Arc::new(MockChain::new().with_stake(18, "5Fhot", RAO_PER_TAO));
    let store = store().await;
    let pipeline = TradePipeline::new(sentiment(0), executor(chain.clone(), store.clone(), false));

    let outcome = pipeline
        .run(TradeJob { netuid: Some(18), hotkey: Some("5Fhot".into()) })
        .await
        .unwrap();
    assert!(matches!(outcome, TradeOutcome::NoAction { .. }));
    assert!(chain.submitted().is_empty());
    assert!(store.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn no_mentions_means_no_scoring_and_no_trade() {
    let chain = Arc::new(MockChain::new());
    let scorer = FixedScorer::scoring(100);
    let calls = scorer.calls.clone();
    let sentiment = SentimentPipeline::new(Arc::new(FixedMentions(Vec::new())), Arc::new(scorer));
    let pipeline = TradePipeline::new(sentiment, executor(chain.clone(), store().await, false));

    let outcome = pipeline
        .run(TradeJob { netuid: Some(3), hotkey: Some("5Fhot".into()) })
        .await
        .unwrap();
    assert!(matches!(outcome, TradeOutcome::NoAction { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(chain.submitted().is_empty());
}

#[tokio::test]
async fn dry_run_submits_and_records_nothing() {
    let chain = Arc::new(MockChain::new());
    let store = store().await;
    let pipeline = TradePipeline::new(sentiment(40), executor(chain.clone(), store.clone(), true));

    let outcome = pipeline
        .run(TradeJob { netuid: Some(18), hotkey: Some("5Fhot".into()) })
        .await
        .unwrap();
    match outcome {
        TradeOutcome::DryRun { action, amount_rao, .. } => {
            assert_eq!(action, StakeAction::Stake);
            assert_eq!(amount_rao, 400_000_000);
        }
        other => panic!("expected dry run, got {other:?}"),
    }
    assert!(chain.submitted().is_empty());
    assert!(store.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn queue_worker_runs_every_job_before_stopping() {
    let chain = Arc::new(MockChain::new());
    let store = store().await;
    let pipeline = TradePipeline::new(sentiment(10), executor(chain.clone(), store.clone(), false))
        .with_default_hotkey(Some("5Fdefault".into()));

    let (queue, worker) = TradeQueue::spawn(Arc::new(pipeline));
    assert!(queue.enqueue(Some(1), Some("5Fone".into())));
    assert!(queue.enqueue(Some(2), None));
    assert!(queue.enqueue(None, Some("5Fskipped".into())));
    drop(queue);
    worker.await.unwrap();

    let mut hotkeys: Vec<String> = chain.submitted().into_iter().map(|s| s.hotkey).collect();
    hotkeys.sort();
    assert_eq!(hotkeys, vec!["5Fdefault".to_string(), "5Fone".to_string()]);
    assert_eq!(store.recent(10).await.unwrap().len(), 2);
}
