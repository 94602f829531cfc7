//! Disposal operations for the repository.

use super::{conflict_on_unique, parse_decimal, parse_enum, parse_instant, Repository};
use crate::domain::{to_millis, Disposal, DisposalId, ItemSize, ProductId, UserId};
use crate::store::StoreError;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

impl Repository {
    pub(super) async fn insert_disposal(&self, disposal: &Disposal) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO disposals (
                id, product_id, user_id, disposal_type, status, scheduled_at_ms,
                item_size, base_amount, pickup_fee, final_total_amount, created_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(disposal.id.as_str())
        .bind(disposal.product_id.as_str())
        .bind(disposal.user_id.as_str())
        .bind(disposal.disposal_type.as_str())
        .bind(disposal.status.as_str())
        .bind(disposal.scheduled_at.map(to_millis))
        .bind(disposal.item_size.map(|s| s.as_str()))
        .bind(disposal.base_amount.to_canonical_string())
        .bind(disposal.pickup_fee.map(|f| f.to_canonical_string()))
        .bind(disposal.final_total_amount.to_canonical_string())
        .bind(to_millis(disposal.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, format!("disposal {} already exists", disposal.id)))?;
        Ok(())
    }

    pub(super) async fn query_disposal(
        &self,
        id: &DisposalId,
    ) -> Result<Option<Disposal>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, user_id, disposal_type, status, scheduled_at_ms,
                   item_size, base_amount, pickup_fee, final_total_amount, created_at_ms
            FROM disposals
            WHERE id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(disposal_from_row).transpose()
    }
}

fn disposal_from_row(row: &SqliteRow) -> Result<Disposal, StoreError> {
    let disposal_type: String = row.try_get("disposal_type")?;
    let status: String = row.try_get("status")?;
    let scheduled_at: Option<i64> = row.try_get("scheduled_at_ms")?;
    let item_size: Option<String> = row.try_get("item_size")?;
    let base_amount: String = row.try_get("base_amount")?;
    let pickup_fee: Option<String> = row.try_get("pickup_fee")?;
    let final_total: String = row.try_get("final_total_amount")?;

    Ok(Disposal {
        id: DisposalId::new(row.try_get::<String, _>("id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        disposal_type: parse_enum(&disposal_type)?,
        status: parse_enum(&status)?,
        scheduled_at: scheduled_at
            .map(|ms| parse_instant(ms, "disposals.scheduled_at_ms"))
            .transpose()?,
        item_size: item_size.as_deref().map(parse_enum::<ItemSize>).transpose()?,
        base_amount: parse_decimal(&base_amount, "disposals.base_amount")?,
        pickup_fee: pickup_fee
            .as_deref()
            .map(|raw| parse_decimal(raw, "disposals.pickup_fee"))
            .transpose()?,
        final_total_amount: parse_decimal(&final_total, "disposals.final_total_amount")?,
        created_at: parse_instant(row.try_get("created_at_ms")?, "disposals.created_at_ms")?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::setup_test_db;
    use super::*;
    use crate::domain::{Decimal, DisposalStatus, DisposalType};
    use crate::store::SettlementStore;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_create_and_find_pickup_disposal() {
        let (repo, _temp) = setup_test_db().await;
        let created_at = Utc.with_ymd_and_hms(2024, 6, 4, 9, 0, 0).unwrap();
        let disposal = Disposal {
            id: DisposalId::generate(),
            product_id: ProductId::new("product-1"),
            user_id: UserId::new("owner-1"),
            disposal_type: DisposalType::Pickup,
            status: DisposalStatus::Pending,
            scheduled_at: Some(Utc.with_ymd_and_hms(2024, 6, 8, 9, 0, 0).unwrap()),
            item_size: Some(ItemSize::Medium),
            base_amount: Decimal::from(30),
            pickup_fee: Some(Decimal::from(10)),
            final_total_amount: Decimal::from(40),
            created_at,
        };

        repo.create_disposal(&disposal).await.unwrap();
        let stored = repo.find_disposal(&disposal.id).await.unwrap().unwrap();
        assert_eq!(stored, disposal);

        let err = repo.create_disposal(&disposal).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_find_missing_disposal_is_none() {
        let (repo, _temp) = setup_test_db().await;
        let found = repo.find_disposal(&DisposalId::new("nope")).await.unwrap();
        assert!(found.is_none());
    }
}
