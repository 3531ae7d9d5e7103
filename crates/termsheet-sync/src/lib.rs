//! Intake API client and the polling task that keeps a dashboard's view of
//! term sheet pairs fresh.

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub mod poller;

#[cfg(feature = "http")]
pub use http::{IntakeClient, SyncError, TraderFeed, TraderStats};
#[cfg(feature = "http")]
pub use poller::{PollHandle, Snapshot, SnapshotOrigin, TermsheetSource, spawn_poller};
