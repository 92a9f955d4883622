//! Persistence layer.
//!
//! Stake adjustments are written once per successful submission to a
//! SQLite database through `sqlx`. Amounts are stored as decimal text so no
//! precision is lost.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

use crate::types::{NewAdjustment, StakeAdjustment};

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS stake_adjustments (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  netuid          INTEGER NOT NULL,
  hotkey          TEXT NOT NULL,
  sentiment_score INTEGER NOT NULL,
  action          TEXT NOT NULL CHECK (action IN ('stake','unstake')),
  amount_tao      TEXT NOT NULL, -- Decimal stored as string
  created_at      TEXT NOT NULL
);
"#;

/// Sink for stake adjustment records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdjustmentStore: Send + Sync {
    async fn save_adjustment(&self, adjustment: NewAdjustment) -> Result<StakeAdjustment>;
}

pub struct SqliteAdjustmentStore {
    pool: SqlitePool,
}

impl SqliteAdjustmentStore {
    /// Open (creating if needed) the database and run the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {url}"))?
            .create_if_missing(true);

        // An in-memory database exists per connection, so keep exactly one.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {url}"))?;

        sqlx::query(INIT_SQL)
            .execute(&pool)
            .await
            .context("Failed to create stake_adjustments table")?;

        info!(url, "Adjustment store ready");
        Ok(Self { pool })
    }

    /// Most recent adjustments, newest first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<StakeAdjustment>> {
        let rows = sqlx::query(
            "SELECT id, netuid, hotkey, sentiment_score, action, amount_tao, created_at
             FROM stake_adjustments ORDER BY id DESC LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query stake adjustments")?;

        rows.iter().map(row_to_adjustment).collect()
    }
}

fn row_to_adjustment(row: &SqliteRow) -> Result<StakeAdjustment> {
    let action: String = row.try_get("action")?;
    let amount: String = row.try_get("amount_tao")?;
    let netuid: i64 = row.try_get("netuid")?;
    Ok(StakeAdjustment {
        id: row.try_get("id")?,
        netuid: u16::try_from(netuid).context("netuid out of range")?,
        hotkey: row.try_get("hotkey")?,
        sentiment_score: row.try_get("sentiment_score")?,
        action: action.parse()?,
        amount_tao: Decimal::from_str(&amount).context("Corrupt amount_tao")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl AdjustmentStore for SqliteAdjustmentStore {
    async fn save_adjustment(&self, adjustment: NewAdjustment) -> Result<StakeAdjustment> {
        let created_at = Utc::now();
        let id = sqlx::query(
            "INSERT INTO stake_adjustments
               (netuid, hotkey, sentiment_score, action, amount_tao, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(adjustment.netuid as i64)
        .bind(&adjustment.hotkey)
        .bind(adjustment.sentiment_score.value())
        .bind(adjustment.action.as_str())
        .bind(adjustment.amount_tao.to_string())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert stake adjustment")?
        .last_insert_rowid();

        let saved = StakeAdjustment {
            id,
            netuid: adjustment.netuid,
            hotkey: adjustment.hotkey,
            sentiment_score: adjustment.sentiment_score.value(),
            action: adjustment.action,
            amount_tao: adjustment.amount_tao,
            created_at,
        };
        debug!(adjustment = %saved, "Adjustment saved");
        Ok(saved)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
