//! Persistence seam for the settlement engine.
//!
//! The processors compile against [`SettlementStore`] only. The SQLite
//! implementation lives in [`crate::db`]; [`MemoryStore`] backs unit tests.

use crate::domain::{
    Boost, BoostId, BoostUpdate, Decimal, Disposal, DisposalId, EarningId, Order, OrderId,
    ReleaseOutcome, UserEarning, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStore;

/// Result of a compare-and-set boost write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostWrite {
    Applied,
    /// The boost was no longer ACTIVE with the expected `until_date`.
    Stale,
}

/// Transactional operations over boosts, earnings, disposals and orders.
///
/// Every mutating method is a single transaction scoped to one record.
#[async_trait]
pub trait SettlementStore: Send + Sync + fmt::Debug {
    /// Load every boost whose status is ACTIVE.
    async fn find_active_boosts(&self) -> Result<Vec<Boost>, StoreError>;

    async fn find_boost(&self, id: &BoostId) -> Result<Option<Boost>, StoreError>;

    /// Write `update` only if the boost is still ACTIVE with `expected_until`.
    ///
    /// # Errors
    /// Returns `NotFound` if no boost has this id.
    async fn update_boost(
        &self,
        id: &BoostId,
        expected_until: DateTime<Utc>,
        update: BoostUpdate,
    ) -> Result<BoostWrite, StoreError>;

    /// Persist a new scheduled earning.
    ///
    /// # Errors
    /// Returns `Conflict` if an earning already exists for the same order.
    async fn create_earning(&self, earning: &UserEarning) -> Result<UserEarning, StoreError>;

    async fn find_earning(&self, id: &EarningId) -> Result<Option<UserEarning>, StoreError>;

    /// Load SCHEDULED earnings with `release_at <= now`.
    async fn find_due_earnings(&self, now: DateTime<Utc>)
        -> Result<Vec<UserEarning>, StoreError>;

    /// Flip an earning to RELEASED and credit `net_amount` to the user's
    /// available balance in one transaction.
    ///
    /// # Errors
    /// Returns `NotFound` (and changes nothing) if the earning or user is
    /// missing.
    async fn release_earning(
        &self,
        earning_id: &EarningId,
        user_id: &UserId,
        net_amount: Decimal,
        released_at: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, StoreError>;

    async fn available_balance(&self, user_id: &UserId) -> Result<Option<Decimal>, StoreError>;

    async fn find_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;

    async fn find_disposal(&self, id: &DisposalId) -> Result<Option<Disposal>, StoreError>;

    async fn create_disposal(&self, disposal: &Disposal) -> Result<Disposal, StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// SQLite reported the database as busy or locked.
    pub fn is_busy(&self) -> bool {
        match self {
            // Extended codes such as SQLITE_BUSY_SNAPSHOT keep the primary
            // code in the low byte.
            StoreError::Database(sqlx::Error::Database(db)) => db
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| matches!(code & 0xff, 5 | 6))
                .unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::not_found("earning", "e-1");
        assert_eq!(err.to_string(), "earning e-1 not found");

        let err = StoreError::Conflict("earning already recorded for order o-1".to_string());
        assert_eq!(
            err.to_string(),
            "conflict: earning already recorded for order o-1"
        );
    }

    #[test]
    fn test_non_database_errors_are_not_busy() {
        assert!(!StoreError::Unavailable("down".to_string()).is_busy());
        assert!(!StoreError::Database(sqlx::Error::RowNotFound).is_busy());
    }
}
