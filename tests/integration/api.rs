use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use secrecy::SecretString;
use std::sync::Arc;
use tower::ServiceExt;

use tao_dividends::api::build_router;
use tao_dividends::api::routes::ApiState;
use tao_dividends::cache::memory::MemoryCache;
use tao_dividends::engine::aggregator::{AggregatorConfig, DividendAggregator};
use tao_dividends::engine::executor::TradeExecutor;
use tao_dividends::engine::queue::{TradePipeline, TradeQueue};
use tao_dividends::engine::sentiment::SentimentPipeline;
use tao_dividends::storage::SqliteAdjustmentStore;
use tao_dividends::types::StakeAction;

use crate::mock_chain::{FixedMentions, FixedScorer, MockChain, OpenWallets};

const TOKEN: &str = "integration-token";

fn request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn trade_request_serves_dividends_then_stakes_in_background() {
    let chain = Arc::new(
        MockChain::new().with_subnet(18, &[("5Fhot", Some(500)), ("5Fother", Some(9))]),
    );
    let store = Arc::new(SqliteAdjustmentStore::connect("sqlite::memory:").await.unwrap());

    let aggregator = DividendAggregator::new(
        chain.clone(),
        Arc::new(MemoryCache::new()),
        AggregatorConfig::default(),
    );
    let pipeline = TradePipeline::new(
        SentimentPipeline::new(
            Arc::new(FixedMentions(vec!["Bittensor netuid 18 is on fire"])),
            Arc::new(FixedScorer::scoring(30)),
        ),
        TradeExecutor::new(chain.clone(), Arc::new(OpenWallets), store.clone(), false),
    );
    let (queue, worker) = TradeQueue::spawn(Arc::new(pipeline));

    let app = build_router(Arc::new(ApiState {
        aggregator: Arc::new(aggregator),
        queue,
        auth_token: SecretString::new(TOKEN.into()),
    }));

    let resp = app
        .clone()
        .oneshot(request("/api/v1/tao_dividends?netuid=18&hotkey=5Fhot&trade=true"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["dividend"], 500);
    assert_eq!(body[0]["stake_tx_triggered"], true);

    // Same request again is served from cache.
    let resp = app
        .oneshot(request("/api/v1/tao_dividends?netuid=18&hotkey=5Fhot"))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body[0]["cached"], true);
    assert_eq!(chain.reads(), 1);

    // Dropping the router closes the queue; the worker drains and stops.
    worker.await.unwrap();

    let submitted = chain.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].action, StakeAction::Stake);
    assert_eq!(submitted[0].netuid, 18);
    assert_eq!(submitted[0].hotkey, "5Fhot");
    assert_eq!(submitted[0].amount_rao, 300_000_000);
    assert_eq!(store.recent(5).await.unwrap().len(), 1);
}

#[tokio::test]
async fn everything_query_over_http() {
    let chain = Arc::new(
        MockChain::new()
            .with_subnet(0, &[("root", Some(1))])
            .with_subnet(7, &[("x", None), ("y", Some(2))]),
    );
    let aggregator = DividendAggregator::new(
        chain.clone(),
        Arc::new(MemoryCache::new()),
        AggregatorConfig::default(),
    );
    let (queue, _rx) = TradeQueue::channel();
    let app = build_router(Arc::new(ApiState {
        aggregator: Arc::new(aggregator),
        queue,
        auth_token: SecretString::new(TOKEN.into()),
    }));

    let resp = app.oneshot(request("/api/v1/tao_dividends")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    let rows: Vec<(u64, String, u64)> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            (
                r["netuid"].as_u64().unwrap(),
                r["hotkey"].as_str().unwrap().to_string(),
                r["dividend"].as_u64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![(0, "root".into(), 1), (7, "x".into(), 0), (7, "y".into(), 2)]
    );
}
