//! Paid, time-boxed product promotions.

use crate::domain::{BoostId, Decimal, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle state of a boost.
///
/// `Expired` is only ever set by the expiry processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoostStatus {
    Pending,
    Active,
    Expired,
}

impl BoostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoostStatus::Pending => "PENDING",
            BoostStatus::Active => "ACTIVE",
            BoostStatus::Expired => "EXPIRED",
        }
    }
}

impl FromStr for BoostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BoostStatus::Pending),
            "ACTIVE" => Ok(BoostStatus::Active),
            "EXPIRED" => Ok(BoostStatus::Expired),
            other => Err(format!("unknown boost status {}", other)),
        }
    }
}

/// Payment state of the boost purchase, owned by the payment collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status {}", other)),
        }
    }
}

/// A paid promotion of a product listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boost {
    pub id: BoostId,
    pub product_id: ProductId,
    pub user_id: UserId,
    /// Ordinal pricing tier.
    pub tier: i32,
    pub status: BoostStatus,
    pub payment_status: PaymentStatus,
    pub price: Decimal,
    pub start_date: DateTime<Utc>,
    /// Intended absolute expiry instant.
    pub end_date: DateTime<Utc>,
    /// Countdown field decremented by the expiry processor.
    pub until_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Boost {
    /// Build an active boost whose countdown starts at `end_date`.
    pub fn active(
        product_id: ProductId,
        user_id: UserId,
        tier: i32,
        price: Decimal,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BoostId::generate(),
            product_id,
            user_id,
            tier,
            status: BoostStatus::Active,
            payment_status: PaymentStatus::Paid,
            price,
            start_date,
            end_date,
            until_date: end_date,
            updated_at: start_date,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BoostStatus::Active
    }
}

/// Fields written back by one expiry step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoostUpdate {
    pub status: BoostStatus,
    pub until_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
