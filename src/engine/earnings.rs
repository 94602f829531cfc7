//! Seller earnings escrow: scheduling on payment, release after the hold.

use super::RecordFailure;
use crate::clock::Clock;
use crate::config::EarningsPolicy;
use crate::domain::{Decimal, OrderId, ReleaseOutcome, UserEarning, UserId};
use crate::error::SettlementError;
use crate::store::{SettlementStore, StoreError};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one release pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseRunReport {
    /// Due earnings loaded.
    pub examined: usize,
    pub released: usize,
    /// Sum of `net_amount` credited during this pass.
    pub credited: Decimal,
    /// Released by a concurrent pass, or their record vanished.
    pub skipped: usize,
    pub failures: Vec<RecordFailure>,
}

impl ReleaseRunReport {
    pub fn first_error(&self) -> Option<&RecordFailure> {
        self.failures.first()
    }
}

#[derive(Debug, Clone)]
pub struct EarningsLedger {
    store: Arc<dyn SettlementStore>,
    clock: Arc<dyn Clock>,
    policy: EarningsPolicy,
    release_concurrency: usize,
}

impl EarningsLedger {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        clock: Arc<dyn Clock>,
        policy: EarningsPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
            release_concurrency: 1,
        }
    }

    /// Release up to `n` earnings at once; each release stays its own
    /// transaction.
    pub fn with_release_concurrency(mut self, n: usize) -> Self {
        self.release_concurrency = n.max(1);
        self
    }

    pub fn policy(&self) -> EarningsPolicy {
        self.policy
    }

    /// Schedule the seller's share of a paid order for release after the
    /// hold period.
    ///
    /// # Errors
    /// `AlreadyRecorded` if the order already has an earning; `Rejected` for
    /// a negative amount.
    pub async fn record_earning(
        &self,
        order_id: &OrderId,
        seller_id: &UserId,
        amount: Decimal,
    ) -> Result<UserEarning, SettlementError> {
        if amount.is_negative() {
            return Err(SettlementError::Rejected(format!(
                "earning amount for order {} must not be negative",
                order_id
            )));
        }

        let earning = UserEarning::schedule(
            order_id.clone(),
            seller_id.clone(),
            amount,
            self.policy.platform_fee_percent,
            self.clock.now(),
            self.policy.hold,
        );

        match self.store.create_earning(&earning).await {
            Ok(created) => {
                info!(
                    earning_id = %created.id,
                    order_id = %created.order_id,
                    seller_id = %created.user_id,
                    net_amount = %created.net_amount,
                    release_at = %created.release_at,
                    "Earning scheduled"
                );
                Ok(created)
            }
            Err(StoreError::Conflict(_)) => Err(SettlementError::AlreadyRecorded(order_id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Record the earning for an order looked up through the store.
    ///
    /// # Errors
    /// `NotFound` if the order does not exist; `Rejected` unless it is PAID
    /// or DELIVERED.
    pub async fn record_for_order(&self, order_id: &OrderId) -> Result<UserEarning, SettlementError> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or_else(|| SettlementError::NotFound(format!("order {}", order_id)))?;

        if !order.status.is_settleable() {
            return Err(SettlementError::Rejected(format!(
                "order {} is {} and cannot be settled",
                order.id,
                order.status.as_str()
            )));
        }

        self.record_earning(&order.id, &order.seller_id, order.total_amount)
            .await
    }

    /// Release every earning whose hold has elapsed at `now`.
    ///
    /// Each release credits the seller and flips the earning in one
    /// transaction; a failed release is recorded and the pass continues.
    ///
    /// # Errors
    /// Returns an error only if the due earnings cannot be loaded.
    pub async fn release_due_earnings(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ReleaseRunReport, SettlementError> {
        let due = self.store.find_due_earnings(now).await?;
        let mut report = ReleaseRunReport {
            examined: due.len(),
            ..Default::default()
        };

        let outcomes: Vec<(UserEarning, Result<ReleaseOutcome, StoreError>)> = stream::iter(due)
            .map(|earning| async move {
                let result = self
                    .store
                    .release_earning(&earning.id, &earning.user_id, earning.net_amount, now)
                    .await;
                (earning, result)
            })
            .buffer_unordered(self.release_concurrency)
            .collect()
            .await;

        for (earning, result) in outcomes {
            match result {
                Ok(ReleaseOutcome::Released) => {
                    debug!(
                        earning_id = %earning.id,
                        user_id = %earning.user_id,
                        net_amount = %earning.net_amount,
                        "Earning released"
                    );
                    report.released += 1;
                    report.credited = report.credited + earning.net_amount;
                }
                Ok(ReleaseOutcome::AlreadyReleased) => {
                    debug!(earning_id = %earning.id, "Earning already released, skipping");
                    report.skipped += 1;
                }
                Err(StoreError::NotFound { entity, id }) if entity == "earning" => {
                    warn!(earning_id = %id, "Earning disappeared during release pass, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(earning_id = %earning.id, error = %e, "Failed to release earning");
                    report.failures.push(RecordFailure::new(earning.id.as_str(), &e));
                }
            }
        }

        info!(
            examined = report.examined,
            released = report.released,
            credited = %report.credited,
            skipped = report.skipped,
            failed = report.failures.len(),
            "Earnings release pass finished"
        );
        Ok(report)
    }
}
