//! Database module for the snapshot store.
//!
//! This module provides:
//! - Database opening, pragma configuration and versioned migrations
//! - Repository layer for snapshot rows
//! - The store engine that gates CRUD on an explicit readiness state

pub mod migrations;
pub mod repo;
pub mod store;

pub use migrations::{init_db, MigrationOutcome, SCHEMA_VERSION};
pub use repo::Repository;
pub use store::{EngineStatus, SnapshotStorage, SnapshotStore};
