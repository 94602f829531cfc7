//! Seller earnings held in escrow until their release instant.

use crate::domain::{Decimal, EarningId, OrderId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EarningStatus {
    Scheduled,
    Released,
}

impl EarningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EarningStatus::Scheduled => "SCHEDULED",
            EarningStatus::Released => "RELEASED",
        }
    }
}

impl FromStr for EarningStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(EarningStatus::Scheduled),
            "RELEASED" => Ok(EarningStatus::Released),
            other => Err(format!("unknown earning status {}", other)),
        }
    }
}

/// A seller's share of a paid order.
///
/// `fee_amount` and `net_amount` are fixed at creation and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEarning {
    pub id: EarningId,
    pub order_id: OrderId,
    pub user_id: UserId,
    /// Gross amount of the order attributed to the seller.
    pub amount: Decimal,
    pub fee_percent: Decimal,
    pub fee_amount: Decimal,
    pub net_amount: Decimal,
    pub release_at: DateTime<Utc>,
    pub status: EarningStatus,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl UserEarning {
    /// Compute fee split and release instant for a new scheduled earning.
    pub fn schedule(
        order_id: OrderId,
        user_id: UserId,
        amount: Decimal,
        fee_percent: Decimal,
        now: DateTime<Utc>,
        hold: chrono::Duration,
    ) -> Self {
        let fee_amount = amount.percent_of(fee_percent);
        Self {
            id: EarningId::generate(),
            order_id,
            user_id,
            amount,
            fee_percent,
            fee_amount,
            net_amount: amount - fee_amount,
            release_at: now + hold,
            status: EarningStatus::Scheduled,
            created_at: now,
            released_at: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == EarningStatus::Scheduled && self.release_at <= now
    }
}

/// Result of attempting to release a single earning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Status flipped and the balance was credited.
    Released,
    /// Another run released it first; nothing was credited.
    AlreadyReleased,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_schedule_splits_fee_and_net() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let earning = UserEarning::schedule(
            OrderId::new("order-1"),
            UserId::new("seller-1"),
            d("100"),
            d("10"),
            now,
            chrono::Duration::days(3),
        );
        assert_eq!(earning.fee_amount, d("10"));
        assert_eq!(earning.net_amount, d("90"));
        assert_eq!(earning.release_at, now + chrono::Duration::days(3));
        assert_eq!(earning.status, EarningStatus::Scheduled);
        assert_eq!(earning.released_at, None);
    }

    #[test]
    fn test_fee_and_net_always_sum_to_amount() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let earning = UserEarning::schedule(
            OrderId::new("order-2"),
            UserId::new("seller-1"),
            d("19.99"),
            d("7.5"),
            now,
            chrono::Duration::zero(),
        );
        assert_eq!(earning.fee_amount, d("1.5"));
        assert_eq!(earning.fee_amount + earning.net_amount, earning.amount);
    }

    #[test]
    fn test_is_due_at_release_instant() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let earning = UserEarning::schedule(
            OrderId::new("order-3"),
            UserId::new("seller-1"),
            d("50"),
            d("10"),
            now,
            chrono::Duration::hours(1),
        );
        assert!(!earning.is_due(now));
        assert!(earning.is_due(now + chrono::Duration::hours(1)));
    }
}
