//! Intake of disposal requests.

use super::disposal_window;
use crate::clock::Clock;
use crate::domain::{
    Decimal, Disposal, DisposalId, DisposalStatus, DisposalType, ItemSize, PickupFeeSchedule,
    ProductId, UserId,
};
use crate::error::SettlementError;
use crate::store::SettlementStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// A disposal as submitted by the product owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposalRequest {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub disposal_type: DisposalType,
    /// Required for pickups, ignored for send-ins.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Required for pickups, ignored for send-ins.
    pub item_size: Option<ItemSize>,
    pub base_amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct DisposalDesk {
    store: Arc<dyn SettlementStore>,
    clock: Arc<dyn Clock>,
    fees: PickupFeeSchedule,
}

impl DisposalDesk {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        clock: Arc<dyn Clock>,
        fees: PickupFeeSchedule,
    ) -> Self {
        Self { store, clock, fees }
    }

    /// Validate and persist a disposal request as PENDING.
    ///
    /// # Errors
    /// `Validation` when a pickup slot is outside the weekend window,
    /// `Rejected` when a pickup lacks its slot or size or the amount is
    /// negative, `Transaction` when the write fails.
    pub async fn submit(&self, request: DisposalRequest) -> Result<Disposal, SettlementError> {
        if request.base_amount.is_negative() {
            return Err(SettlementError::Rejected(
                "base amount must not be negative".to_string(),
            ));
        }

        let now = self.clock.now();
        let (scheduled_at, item_size, pickup_fee) = match request.disposal_type {
            DisposalType::Pickup => {
                let scheduled_at = request.scheduled_at.ok_or_else(|| {
                    SettlementError::Rejected("pickup requires a scheduled date".to_string())
                })?;
                let item_size = request.item_size.ok_or_else(|| {
                    SettlementError::Rejected("pickup requires an item size".to_string())
                })?;

                if let Err(e) = disposal_window::validate(scheduled_at, now) {
                    debug!(
                        product_id = %request.product_id,
                        scheduled_at = %scheduled_at,
                        reason = %e,
                        "Pickup rejected"
                    );
                    return Err(e.into());
                }

                (
                    Some(scheduled_at),
                    Some(item_size),
                    Some(self.fees.fee_for(item_size)),
                )
            }
            DisposalType::SendIn => (None, None, None),
        };

        let final_total_amount =
            request.base_amount + pickup_fee.unwrap_or_else(Decimal::zero);

        let disposal = Disposal {
            id: DisposalId::generate(),
            product_id: request.product_id,
            user_id: request.user_id,
            disposal_type: request.disposal_type,
            status: DisposalStatus::Pending,
            scheduled_at,
            item_size,
            base_amount: request.base_amount,
            pickup_fee,
            final_total_amount,
            created_at: now,
        };

        let created = self.store.create_disposal(&disposal).await?;
        info!(
            disposal_id = %created.id,
            disposal_type = created.disposal_type.as_str(),
            final_total_amount = %created.final_total_amount,
            "Disposal submitted"
        );
        Ok(created)
    }

    /// # Errors
    /// `NotFound` if no disposal has this id.
    pub async fn get(&self, id: &DisposalId) -> Result<Disposal, SettlementError> {
        self.store
            .find_disposal(id)
            .await?
            .ok_or_else(|| SettlementError::NotFound(format!("disposal {}", id)))
    }
}
