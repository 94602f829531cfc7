//! Earning operations for the repository.

use super::{conflict_on_unique, parse_decimal, parse_enum, parse_instant, Repository};
use crate::domain::{
    to_millis, Decimal, EarningId, EarningStatus, OrderId, ReleaseOutcome, UserEarning, UserId,
};
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const EARNING_COLUMNS: &str = r#"
    id, order_id, user_id, amount, fee_percent, fee_amount, net_amount,
    release_at_ms, status, created_at_ms, released_at_ms
"#;

impl Repository {
    pub(super) async fn insert_earning(&self, earning: &UserEarning) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_earnings (
                id, order_id, user_id, amount, fee_percent, fee_amount, net_amount,
                release_at_ms, status, created_at_ms, released_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(earning.id.as_str())
        .bind(earning.order_id.as_str())
        .bind(earning.user_id.as_str())
        .bind(earning.amount.to_canonical_string())
        .bind(earning.fee_percent.to_canonical_string())
        .bind(earning.fee_amount.to_canonical_string())
        .bind(earning.net_amount.to_canonical_string())
        .bind(to_millis(earning.release_at))
        .bind(earning.status.as_str())
        .bind(to_millis(earning.created_at))
        .bind(earning.released_at.map(to_millis))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(
                e,
                format!("earning already recorded for order {}", earning.order_id),
            )
        })?;
        Ok(())
    }

    pub(super) async fn query_earning(
        &self,
        id: &EarningId,
    ) -> Result<Option<UserEarning>, StoreError> {
        let sql = format!("SELECT {} FROM user_earnings WHERE id = ?", EARNING_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(earning_from_row).transpose()
    }

    pub(super) async fn query_due_earnings(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserEarning>, StoreError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM user_earnings
            WHERE status = ?
              AND release_at_ms <= ?
              AND net_amount IS NOT NULL
              AND user_id IS NOT NULL
            ORDER BY release_at_ms ASC, id ASC
            "#,
            EARNING_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(EarningStatus::Scheduled.as_str())
            .bind(to_millis(now))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(earning_from_row).collect()
    }

    /// Flip the earning to RELEASED and credit the seller in one transaction.
    ///
    /// The status flip runs first so the write lock is held before the
    /// balance is read.
    pub(super) async fn release_earning_tx(
        &self,
        earning_id: &EarningId,
        user_id: &UserId,
        net_amount: Decimal,
        released_at: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            r#"
            UPDATE user_earnings
            SET status = ?, released_at_ms = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(EarningStatus::Released.as_str())
        .bind(to_millis(released_at))
        .bind(earning_id.as_str())
        .bind(EarningStatus::Scheduled.as_str())
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM user_earnings WHERE id = ?")
                .bind(earning_id.as_str())
                .fetch_optional(&mut *tx)
                .await?
                .is_some();
            tx.rollback().await?;
            return if exists {
                Ok(ReleaseOutcome::AlreadyReleased)
            } else {
                Err(StoreError::not_found("earning", earning_id))
            };
        }

        let balance_row = sqlx::query("SELECT available_balance FROM users WHERE id = ?")
            .bind(user_id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(balance_row) = balance_row else {
            tx.rollback().await?;
            return Err(StoreError::not_found("user", user_id));
        };
        let raw: String = balance_row.try_get("available_balance")?;
        let balance = parse_decimal(&raw, "users.available_balance")?;

        sqlx::query("UPDATE users SET available_balance = ?, updated_at_ms = ? WHERE id = ?")
            .bind((balance + net_amount).to_canonical_string())
            .bind(to_millis(released_at))
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ReleaseOutcome::Released)
    }
}

fn earning_from_row(row: &SqliteRow) -> Result<UserEarning, StoreError> {
    let amount: String = row.try_get("amount")?;
    let fee_percent: String = row.try_get("fee_percent")?;
    let fee_amount: String = row.try_get("fee_amount")?;
    let net_amount: String = row.try_get("net_amount")?;
    let status: String = row.try_get("status")?;
    let released_at: Option<i64> = row.try_get("released_at_ms")?;

    Ok(UserEarning {
        id: EarningId::new(row.try_get::<String, _>("id")?),
        order_id: OrderId::new(row.try_get::<String, _>("order_id")?),
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        amount: parse_decimal(&amount, "user_earnings.amount")?,
        fee_percent: parse_decimal(&fee_percent, "user_earnings.fee_percent")?,
        fee_amount: parse_decimal(&fee_amount, "user_earnings.fee_amount")?,
        net_amount: parse_decimal(&net_amount, "user_earnings.net_amount")?,
        release_at: parse_instant(row.try_get("release_at_ms")?, "user_earnings.release_at_ms")?,
        status: parse_enum(&status)?,
        created_at: parse_instant(row.try_get("created_at_ms")?, "user_earnings.created_at_ms")?,
        released_at: released_at
            .map(|ms| parse_instant(ms, "user_earnings.released_at_ms"))
            .transpose()?,
    })
}
