//! Domain types for the settlement engine.
//!
//! This module provides:
//! - Lossless money handling via the Decimal wrapper
//! - Record identifiers and instant/millisecond conversion
//! - Boost, UserEarning, Disposal and Order records

pub mod boost;
pub mod decimal;
pub mod disposal;
pub mod earning;
pub mod order;
pub mod primitives;

pub use boost::{Boost, BoostStatus, BoostUpdate, PaymentStatus};
pub use decimal::Decimal;
pub use disposal::{
    Disposal, DisposalStatus, DisposalType, ItemSize, PickupFeeSchedule,
};
pub use earning::{EarningStatus, ReleaseOutcome, UserEarning};
pub use order::{Order, OrderStatus};
pub use primitives::{
    from_millis, to_millis, BoostId, DisposalId, EarningId, OrderId, ProductId, UserId,
};
