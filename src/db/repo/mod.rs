//! Repository layer for settlement records.
//!
//! `Repository` is the SQLite implementation of [`SettlementStore`].
//! Methods are organized across submodules by record:
//! - `boosts.rs` - boost loading and compare-and-set expiry writes
//! - `earnings.rs` - earning creation, due scan and balance-crediting release
//! - `disposals.rs` - disposal creation and lookup
//!
//! Money columns hold canonical decimal strings and instants hold epoch
//! milliseconds, so no value ever round-trips through SQLite REAL.

mod boosts;
mod disposals;
mod earnings;

use crate::domain::{
    from_millis, Boost, BoostId, BoostUpdate, Decimal, Disposal, DisposalId,
    EarningId, Order, OrderId, ReleaseOutcome, UserEarning, UserId,
};
use crate::store::{BoostWrite, SettlementStore, StoreError};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Repository for settlement database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    busy_retry_budget: Duration,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository {
            pool,
            busy_retry_budget: Duration::from_secs(2),
        }
    }

    /// Override how long a write keeps retrying while SQLite reports busy.
    pub fn with_busy_retry_budget(mut self, budget: Duration) -> Self {
        self.busy_retry_budget = budget;
        self
    }

    /// Run `op`, retrying with exponential backoff only while it fails with
    /// `SQLITE_BUSY`/`SQLITE_LOCKED`.
    async fn with_busy_retry<T, F, Fut>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(20),
            max_elapsed_time: Some(self.busy_retry_budget),
            ..Default::default()
        };

        retry(policy, || {
            let attempt = op();
            async move {
                attempt.await.map_err(|e| {
                    if e.is_busy() {
                        warn!(error = %e, "SQLite busy, retrying write");
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await
    }

    // =========================================================================
    // Users and orders (owned by collaborators, seeded here)
    // =========================================================================

    /// Insert a user row with a starting available balance.
    pub async fn insert_user(&self, user_id: &UserId, balance: Decimal) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, available_balance)
            VALUES (?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(user_id.as_str())
        .bind(balance.to_canonical_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or refresh an order snapshot.
    pub async fn upsert_order(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, seller_id, total_amount, status)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                seller_id = excluded.seller_id,
                total_amount = excluded.total_amount,
                status = excluded.status
            "#,
        )
        .bind(order.id.as_str())
        .bind(order.seller_id.as_str())
        .bind(order.total_amount.to_canonical_string())
        .bind(order.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query_available_balance(&self, user_id: &UserId) -> Result<Option<Decimal>, StoreError> {
        let row = sqlx::query("SELECT available_balance FROM users WHERE id = ?")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| {
            let raw: String = r.try_get("available_balance")?;
            parse_decimal(&raw, "users.available_balance")
        })
        .transpose()
    }

    async fn query_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT id, seller_id, total_amount, status FROM orders WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| {
            let total: String = r.try_get("total_amount")?;
            let status: String = r.try_get("status")?;
            Ok(Order {
                id: OrderId::new(r.try_get::<String, _>("id")?),
                seller_id: UserId::new(r.try_get::<String, _>("seller_id")?),
                total_amount: parse_decimal(&total, "orders.total_amount")?,
                status: parse_enum(&status)?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl SettlementStore for Repository {
    async fn find_active_boosts(&self) -> Result<Vec<Boost>, StoreError> {
        self.query_active_boosts().await
    }

    async fn find_boost(&self, id: &BoostId) -> Result<Option<Boost>, StoreError> {
        self.query_boost(id).await
    }

    async fn update_boost(
        &self,
        id: &BoostId,
        expected_until: DateTime<Utc>,
        update: BoostUpdate,
    ) -> Result<BoostWrite, StoreError> {
        self.with_busy_retry(|| self.update_boost_tx(id, expected_until, update))
            .await
    }

    async fn create_earning(&self, earning: &UserEarning) -> Result<UserEarning, StoreError> {
        self.with_busy_retry(|| self.insert_earning(earning)).await?;
        Ok(earning.clone())
    }

    async fn find_earning(&self, id: &EarningId) -> Result<Option<UserEarning>, StoreError> {
        self.query_earning(id).await
    }

    async fn find_due_earnings(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserEarning>, StoreError> {
        self.query_due_earnings(now).await
    }

    async fn release_earning(
        &self,
        earning_id: &EarningId,
        user_id: &UserId,
        net_amount: Decimal,
        released_at: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, StoreError> {
        self.with_busy_retry(|| self.release_earning_tx(earning_id, user_id, net_amount, released_at))
            .await
    }

    async fn available_balance(&self, user_id: &UserId) -> Result<Option<Decimal>, StoreError> {
        self.query_available_balance(user_id).await
    }

    async fn find_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        self.query_order(id).await
    }

    async fn find_disposal(&self, id: &DisposalId) -> Result<Option<Disposal>, StoreError> {
        self.query_disposal(id).await
    }

    async fn create_disposal(&self, disposal: &Disposal) -> Result<Disposal, StoreError> {
        self.with_busy_retry(|| self.insert_disposal(disposal)).await?;
        Ok(disposal.clone())
    }
}

fn parse_decimal(raw: &str, column: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(raw)
        .map_err(|e| StoreError::Corrupt(format!("{} = {:?}: {}", column, raw, e)))
}

fn parse_instant(ms: i64, column: &str) -> Result<DateTime<Utc>, StoreError> {
    from_millis(ms).ok_or_else(|| StoreError::Corrupt(format!("{} = {} out of range", column, ms)))
}

fn parse_enum<T: FromStr<Err = String>>(raw: &str) -> Result<T, StoreError> {
    raw.parse::<T>().map_err(StoreError::Corrupt)
}

/// Map a unique-constraint violation to `Conflict`.
fn conflict_on_unique(err: sqlx::Error, what: String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what),
        _ => StoreError::Database(err),
    }
}
