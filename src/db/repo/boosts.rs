//! Boost operations for the repository.

use super::{parse_decimal, parse_enum, parse_instant, Repository};
use crate::domain::{to_millis, Boost, BoostId, BoostStatus, BoostUpdate, ProductId, UserId};
use crate::store::{BoostWrite, StoreError};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const BOOST_COLUMNS: &str = r#"
    id, product_id, user_id, tier, status, payment_status, price,
    start_date_ms, end_date_ms, until_date_ms, updated_at_ms
"#;

impl Repository {
    /// Insert a boost as created by the purchase flow.
    ///
    /// # Errors
    /// Returns `Conflict` if the id already exists.
    pub async fn insert_boost(&self, boost: &Boost) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO boosts (
                id, product_id, user_id, tier, status, payment_status, price,
                start_date_ms, end_date_ms, until_date_ms, updated_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(boost.id.as_str())
        .bind(boost.product_id.as_str())
        .bind(boost.user_id.as_str())
        .bind(boost.tier)
        .bind(boost.status.as_str())
        .bind(boost.payment_status.as_str())
        .bind(boost.price.to_canonical_string())
        .bind(to_millis(boost.start_date))
        .bind(to_millis(boost.end_date))
        .bind(to_millis(boost.until_date))
        .bind(to_millis(boost.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| super::conflict_on_unique(e, format!("boost {} already exists", boost.id)))?;
        Ok(())
    }

    pub(super) async fn query_active_boosts(&self) -> Result<Vec<Boost>, StoreError> {
        let sql = format!(
            "SELECT {} FROM boosts WHERE status = ? ORDER BY until_date_ms ASC, id ASC",
            BOOST_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(BoostStatus::Active.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(boost_from_row).collect()
    }

    pub(super) async fn query_boost(&self, id: &BoostId) -> Result<Option<Boost>, StoreError> {
        let sql = format!("SELECT {} FROM boosts WHERE id = ?", BOOST_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(boost_from_row).transpose()
    }

    /// Compare-and-set write of one expiry step.
    pub(super) async fn update_boost_tx(
        &self,
        id: &BoostId,
        expected_until: DateTime<Utc>,
        update: BoostUpdate,
    ) -> Result<BoostWrite, StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE boosts
            SET status = ?, until_date_ms = ?, updated_at_ms = ?
            WHERE id = ? AND status = ? AND until_date_ms = ?
            "#,
        )
        .bind(update.status.as_str())
        .bind(to_millis(update.until_date))
        .bind(to_millis(update.updated_at))
        .bind(id.as_str())
        .bind(BoostStatus::Active.as_str())
        .bind(to_millis(expected_until))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            tx.commit().await?;
            return Ok(BoostWrite::Applied);
        }

        let exists = sqlx::query("SELECT 1 FROM boosts WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        tx.rollback().await?;

        if exists {
            Ok(BoostWrite::Stale)
        } else {
            Err(StoreError::not_found("boost", id))
        }
    }
}

fn boost_from_row(row: &SqliteRow) -> Result<Boost, StoreError> {
    let status: String = row.try_get("status")?;
    let payment_status: String = row.try_get("payment_status")?;
    let price: String = row.try_get("price")?;

    Ok(Boost {
        id: BoostId::new(row.try_get::<String, _>("id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        tier: row.try_get("tier")?,
        status: parse_enum(&status)?,
        payment_status: parse_enum(&payment_status)?,
        price: parse_decimal(&price, "boosts.price")?,
        start_date: parse_instant(row.try_get("start_date_ms")?, "boosts.start_date_ms")?,
        end_date: parse_instant(row.try_get("end_date_ms")?, "boosts.end_date_ms")?,
        until_date: parse_instant(row.try_get("until_date_ms")?, "boosts.until_date_ms")?,
        updated_at: parse_instant(row.try_get("updated_at_ms")?, "boosts.updated_at_ms")?,
    })
}
