pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BoostExpiryMode, BoostExpiryPolicy, Config, EarningsPolicy};
pub use db::{init_db, Repository};
pub use domain::{
    Boost, BoostId, BoostStatus, Decimal, Disposal, DisposalId, DisposalStatus, DisposalType,
    EarningId, EarningStatus, ItemSize, Order, OrderId, OrderStatus, PickupFeeSchedule, ProductId,
    UserEarning, UserId,
};
pub use engine::{
    BoostExpiryProcessor, BoostRunReport, DisposalDesk, DisposalRequest, EarningsLedger,
    ReleaseRunReport, WindowError,
};
pub use error::SettlementError;
pub use orchestration::{RunOutcome, SettlementJob, SettlementScheduler};
pub use store::{MemoryStore, SettlementStore, StoreError};
