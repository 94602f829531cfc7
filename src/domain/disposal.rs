//! Product disposal requests (courier pickup or customer send-in).

use crate::domain::{Decimal, DisposalId, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisposalType {
    /// Courier collects the item on a weekend slot.
    Pickup,
    /// Customer ships the item themselves.
    SendIn,
}

impl DisposalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisposalType::Pickup => "PICKUP",
            DisposalType::SendIn => "SEND_IN",
        }
    }
}

impl FromStr for DisposalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PICKUP" => Ok(DisposalType::Pickup),
            "SEND_IN" => Ok(DisposalType::SendIn),
            other => Err(format!("unknown disposal type {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisposalStatus {
    Pending,
    Scheduled,
    Completed,
    Cancelled,
}

impl DisposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisposalStatus::Pending => "PENDING",
            DisposalStatus::Scheduled => "SCHEDULED",
            DisposalStatus::Completed => "COMPLETED",
            DisposalStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for DisposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(DisposalStatus::Pending),
            "SCHEDULED" => Ok(DisposalStatus::Scheduled),
            "COMPLETED" => Ok(DisposalStatus::Completed),
            "CANCELLED" => Ok(DisposalStatus::Cancelled),
            other => Err(format!("unknown disposal status {}", other)),
        }
    }
}

/// Size class that prices a pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemSize {
    Small,
    Medium,
    Large,
}

impl ItemSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemSize::Small => "SMALL",
            ItemSize::Medium => "MEDIUM",
            ItemSize::Large => "LARGE",
        }
    }
}

impl FromStr for ItemSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SMALL" => Ok(ItemSize::Small),
            "MEDIUM" => Ok(ItemSize::Medium),
            "LARGE" => Ok(ItemSize::Large),
            other => Err(format!("unknown item size {}", other)),
        }
    }
}

/// Pickup surcharge per item size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickupFeeSchedule {
    pub small: Decimal,
    pub medium: Decimal,
    pub large: Decimal,
}

impl PickupFeeSchedule {
    pub fn fee_for(&self, size: ItemSize) -> Decimal {
        match size {
            ItemSize::Small => self.small,
            ItemSize::Medium => self.medium,
            ItemSize::Large => self.large,
        }
    }
}

impl Default for PickupFeeSchedule {
    fn default() -> Self {
        Self {
            small: Decimal::from(5),
            medium: Decimal::from(10),
            large: Decimal::from(20),
        }
    }
}

/// A persisted disposal request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disposal {
    pub id: DisposalId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub disposal_type: DisposalType,
    pub status: DisposalStatus,
    /// Requested weekend slot; only set for pickups.
    pub scheduled_at: Option<DateTime<Utc>>,
    pub item_size: Option<ItemSize>,
    /// Service amount quoted before any pickup surcharge.
    pub base_amount: Decimal,
    pub pickup_fee: Option<Decimal>,
    pub final_total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}
