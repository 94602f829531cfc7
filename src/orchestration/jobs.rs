//! Adapters binding the settlement processors to the scheduler.

use super::scheduler::{JobSummary, SettlementJob};
use crate::clock::Clock;
use crate::engine::{BoostExpiryProcessor, EarningsLedger};
use crate::error::SettlementError;
use async_trait::async_trait;
use std::sync::Arc;

pub const BOOST_EXPIRY_JOB: &str = "boost-expiry";
pub const EARNINGS_RELEASE_JOB: &str = "earnings-release";

/// Runs one boost expiry pass at the clock's current instant.
#[derive(Debug, Clone)]
pub struct BoostExpiryJob {
    processor: BoostExpiryProcessor,
    clock: Arc<dyn Clock>,
}

impl BoostExpiryJob {
    pub fn new(processor: BoostExpiryProcessor, clock: Arc<dyn Clock>) -> Self {
        Self { processor, clock }
    }
}

#[async_trait]
impl SettlementJob for BoostExpiryJob {
    fn name(&self) -> &'static str {
        BOOST_EXPIRY_JOB
    }

    async fn run_once(&self) -> Result<JobSummary, SettlementError> {
        let report = self.processor.run(self.clock.now()).await?;
        Ok(JobSummary {
            examined: report.processed,
            settled: report.expired,
            failed: report.failures.len(),
        })
    }
}

/// Releases every earning whose hold has elapsed at the clock's instant.
#[derive(Debug, Clone)]
pub struct EarningsReleaseJob {
    ledger: EarningsLedger,
    clock: Arc<dyn Clock>,
}

impl EarningsReleaseJob {
    pub fn new(ledger: EarningsLedger, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, clock }
    }
}

#[async_trait]
impl SettlementJob for EarningsReleaseJob {
    fn name(&self) -> &'static str {
        EARNINGS_RELEASE_JOB
    }

    async fn run_once(&self) -> Result<JobSummary, SettlementError> {
        let report = self.ledger.release_due_earnings(self.clock.now()).await?;
        Ok(JobSummary {
            examined: report.examined,
            settled: report.released,
            failed: report.failures.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{BoostExpiryPolicy, EarningsPolicy};
    use crate::domain::{Boost, Decimal, OrderId, ProductId, UserId};
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    #[tokio::test]
    async fn test_boost_job_reads_clock() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
        let boost = Boost::active(
            ProductId::new("product-1"),
            UserId::new("seller-1"),
            2,
            Decimal::from(15),
            now - Duration::days(1),
            now + Duration::minutes(20),
        );
        let store = Arc::new(MemoryStore::new().with_boost(boost));
        let clock = Arc::new(ManualClock::new(now));
        let job = BoostExpiryJob::new(
            BoostExpiryProcessor::new(store, BoostExpiryPolicy::default()),
            clock,
        );

        let summary = job.run_once().await.unwrap();
        assert_eq!(
            summary,
            JobSummary {
                examined: 1,
                settled: 1,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn test_release_job_waits_for_hold() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
        let seller = UserId::new("seller-1");
        let store = Arc::new(MemoryStore::new().with_user(seller.clone(), Decimal::zero()));
        let clock = Arc::new(ManualClock::new(now));
        let ledger = EarningsLedger::new(store, clock.clone(), EarningsPolicy::default());
        ledger
            .record_earning(&OrderId::new("order-1"), &seller, Decimal::from(100))
            .await
            .unwrap();
        let job = EarningsReleaseJob::new(ledger, clock.clone());

        assert_eq!(job.run_once().await.unwrap().settled, 0);
        clock.advance(Duration::days(3));
        assert_eq!(job.run_once().await.unwrap().settled, 1);
    }
}
