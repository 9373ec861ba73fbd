//! Domain types for clipped pages.
//!
//! - `Snapshot` / `NewSnapshot`: persisted and not-yet-persisted records
//! - `capture`: excerpt truncation and reading metrics computed by producers

pub mod capture;
pub mod snapshot;

pub use capture::{CaptureSettings, Excerpt, PageCapture};
pub use snapshot::{capture_timestamp, NewSnapshot, Snapshot, SnapshotId};
