//! Tao dividends service entry point.
//!
//! Loads configuration, initialises structured logging, wires the chain,
//! cache, sentiment and trade components, then serves the HTTP API until
//! Ctrl+C. Queued trade jobs are drained before exit.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use tao_dividends::api::{self, routes::ApiState};
use tao_dividends::cache::memory::MemoryCache;
use tao_dividends::cache::redis::RedisCache;
use tao_dividends::cache::DividendCache;
use tao_dividends::chain::rpc::RpcChainClient;
use tao_dividends::chain::wallet::KeyfileWalletStore;
use tao_dividends::config::{AppConfig, CacheBackend};
use tao_dividends::data::datura::DaturaClient;
use tao_dividends::engine::aggregator::{AggregatorConfig, DividendAggregator};
use tao_dividends::engine::executor::TradeExecutor;
use tao_dividends::engine::queue::{TradePipeline, TradeQueue};
use tao_dividends::engine::sentiment::SentimentPipeline;
use tao_dividends::llm::chutes::ChutesClient;
use tao_dividends::storage::SqliteAdjustmentStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("TAO_DIVIDENDS_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    info!(
        config = %config_path,
        cache = ?cfg.cache.backend,
        rpc_url = %cfg.chain.rpc_url,
        dry_run = cfg.trade.dry_run,
        "Tao dividends service starting up"
    );

    // -- Dividend path ---------------------------------------------------

    let chain = Arc::new(RpcChainClient::new(
        &cfg.chain.rpc_url,
        cfg.chain.query_timeout(),
        cfg.chain.page_size,
    )?);

    let cache: Arc<dyn DividendCache> = match cfg.cache.backend {
        CacheBackend::Redis => {
            let redis = RedisCache::new(&cfg.cache.redis_url)?.with_op_timeout(cfg.cache.op_timeout());
            if let Err(e) = redis.warm_up().await {
                warn!(error = %format!("{e:#}"), "Redis unavailable at start-up, serving uncached");
            }
            Arc::new(redis)
        }
        CacheBackend::Memory => {
            info!("Using in-process dividend cache");
            Arc::new(MemoryCache::new())
        }
    };

    let aggregator = Arc::new(DividendAggregator::new(
        chain.clone(),
        cache,
        AggregatorConfig::from_app(&cfg.cache, &cfg.chain),
    ));

    // -- Trade path ------------------------------------------------------

    let datura = DaturaClient::new(
        Some(cfg.sentiment.search_url.clone()),
        AppConfig::resolve_secret(&cfg.sentiment.search_api_key_env)?,
        cfg.sentiment.request_timeout(),
    )?;
    let chutes = ChutesClient::new(
        AppConfig::resolve_secret(&cfg.sentiment.llm_api_key_env)?,
        Some(cfg.sentiment.model.clone()),
        cfg.sentiment.request_timeout(),
    )?
    .with_url(cfg.sentiment.llm_url.clone())
    .with_sampling(cfg.sentiment.max_tokens, cfg.sentiment.temperature);
    info!(model = %chutes.model_name(), "Sentiment scorer configured");

    let sentiment = SentimentPipeline::new(Arc::new(datura), Arc::new(chutes))
        .with_mention_limit(cfg.sentiment.mention_limit);

    let store = SqliteAdjustmentStore::connect(&cfg.storage.database_url).await?;
    let executor = TradeExecutor::new(
        chain,
        Arc::new(KeyfileWalletStore::new(cfg.trade.wallet_dir.clone())),
        Arc::new(store),
        cfg.trade.dry_run,
    )
    .with_stake_unit(cfg.trade.stake_unit_tao);

    let window_days = u64::try_from(cfg.sentiment.window_days).unwrap_or(1);
    let pipeline = TradePipeline::new(sentiment, executor)
        .with_window_days(window_days)
        .with_default_hotkey(cfg.trade.default_hotkey.clone());
    let (queue, worker) = TradeQueue::spawn(Arc::new(pipeline));

    // -- HTTP ------------------------------------------------------------

    let state = Arc::new(ApiState {
        aggregator,
        queue,
        auth_token: AppConfig::resolve_secret(&cfg.server.auth_token_env)?,
    });

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", cfg.server.host, cfg.server.port))?;

    info!("Serving. Press Ctrl+C to stop.");
    api::serve(addr, state, shutdown_signal()).await?;

    // The router (and with it the last queue handle) is gone; let the
    // worker finish what it already accepted.
    info!("Waiting for queued trade jobs");
    if let Err(e) = worker.await {
        warn!(error = %e, "Trade worker ended abnormally");
    }

    info!("Tao dividends service shut down cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tao_dividends=info,tower_http=info"));

    if std::env::var("TAO_DIVIDENDS_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
