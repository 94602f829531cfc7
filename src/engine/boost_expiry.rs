//! Retirement of boosts whose promotion window has elapsed.

use super::RecordFailure;
use crate::config::{BoostExpiryMode, BoostExpiryPolicy};
use crate::domain::{Boost, BoostStatus, BoostUpdate};
use crate::error::SettlementError;
use crate::store::{BoostWrite, SettlementStore, StoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one expiry pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoostRunReport {
    /// ACTIVE boosts loaded, whatever happened to them.
    pub processed: usize,
    pub expired: usize,
    /// Countdown moved but the boost stays ACTIVE.
    pub decayed: usize,
    /// Changed or removed by someone else since loading.
    pub skipped: usize,
    pub failures: Vec<RecordFailure>,
}

impl BoostRunReport {
    pub fn first_error(&self) -> Option<&RecordFailure> {
        self.failures.first()
    }
}

#[derive(Debug, Clone)]
pub struct BoostExpiryProcessor {
    store: Arc<dyn SettlementStore>,
    policy: BoostExpiryPolicy,
}

impl BoostExpiryProcessor {
    pub fn new(store: Arc<dyn SettlementStore>, policy: BoostExpiryPolicy) -> Self {
        Self { store, policy }
    }

    /// The write one pass applies to `boost` at `now`, if any.
    ///
    /// In countdown mode every active boost loses one decay step and expires
    /// once the countdown reaches `now`. In deadline mode only boosts whose
    /// `end_date` has passed are touched.
    pub fn next_step(&self, boost: &Boost, now: DateTime<Utc>) -> Option<BoostUpdate> {
        match self.policy.mode {
            BoostExpiryMode::Countdown => {
                let candidate = boost.until_date - self.policy.decay_step;
                let status = if candidate <= now {
                    BoostStatus::Expired
                } else {
                    BoostStatus::Active
                };
                Some(BoostUpdate {
                    status,
                    until_date: candidate,
                    updated_at: now,
                })
            }
            BoostExpiryMode::Deadline => (boost.end_date <= now).then_some(BoostUpdate {
                status: BoostStatus::Expired,
                until_date: boost.end_date,
                updated_at: now,
            }),
        }
    }

    /// Run one expiry pass over every ACTIVE boost.
    ///
    /// A failed write is recorded in the report and the pass continues.
    ///
    /// # Errors
    /// Returns an error only if the active boosts cannot be loaded.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<BoostRunReport, SettlementError> {
        let boosts = self.store.find_active_boosts().await?;
        let mut report = BoostRunReport {
            processed: boosts.len(),
            ..Default::default()
        };

        for boost in &boosts {
            let Some(update) = self.next_step(boost, now) else {
                continue;
            };

            match self
                .store
                .update_boost(&boost.id, boost.until_date, update)
                .await
            {
                Ok(BoostWrite::Applied) if update.status == BoostStatus::Expired => {
                    debug!(boost_id = %boost.id, until_date = %update.until_date, "Boost expired");
                    report.expired += 1;
                }
                Ok(BoostWrite::Applied) => {
                    report.decayed += 1;
                }
                Ok(BoostWrite::Stale) => {
                    debug!(boost_id = %boost.id, "Boost changed since load, skipping");
                    report.skipped += 1;
                }
                Err(StoreError::NotFound { .. }) => {
                    warn!(boost_id = %boost.id, "Boost disappeared during expiry pass, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(boost_id = %boost.id, error = %e, "Failed to update boost");
                    report.failures.push(RecordFailure::new(boost.id.as_str(), &e));
                }
            }
        }

        info!(
            processed = report.processed,
            expired = report.expired,
            decayed = report.decayed,
            skipped = report.skipped,
            failed = report.failures.len(),
            "Boost expiry pass finished"
        );
        Ok(report)
    }
}
