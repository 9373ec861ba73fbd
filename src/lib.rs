pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod host;
pub mod panel;
pub mod relay;

pub use config::Config;
pub use db::{init_db, EngineStatus, SnapshotStorage, SnapshotStore, SCHEMA_VERSION};
pub use domain::{CaptureSettings, NewSnapshot, PageCapture, Snapshot, SnapshotId};
pub use error::StoreError;
pub use host::Host;
pub use panel::{Panel, PanelView};
pub use relay::{CaptureInbox, CaptureRelay};
