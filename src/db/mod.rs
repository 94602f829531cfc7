//! SQLite persistence for the settlement engine.
//!
//! This module provides:
//! - Database initialization, schema and pragma configuration
//! - `Repository`, the SQLite implementation of `SettlementStore`

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
