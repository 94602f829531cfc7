//! Settlement processors and the pickup window rules they enforce.

use std::fmt;

pub mod boost_expiry;
pub mod disposal_desk;
pub mod disposal_window;
pub mod earnings;

pub use boost_expiry::{BoostExpiryProcessor, BoostRunReport};
pub use disposal_desk::{DisposalDesk, DisposalRequest};
pub use disposal_window::{booking_cutoff, validate, WindowError};
pub use earnings::{EarningsLedger, ReleaseRunReport};

/// A record a batch pass could not settle; it is retried on the next tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub record_id: String,
    pub error: String,
}

impl RecordFailure {
    pub fn new(record_id: &str, error: &impl fmt::Display) -> Self {
        Self {
            record_id: record_id.to_string(),
            error: error.to_string(),
        }
    }
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.record_id, self.error)
    }
}
