pub mod jobs;
pub mod scheduler;

pub use jobs::{BoostExpiryJob, EarningsReleaseJob, BOOST_EXPIRY_JOB, EARNINGS_RELEASE_JOB};
pub use scheduler::{JobSummary, RunOutcome, SettlementJob, SettlementScheduler};
