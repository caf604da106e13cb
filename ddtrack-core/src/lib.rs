//! Presence tracking for DDNet players.
//!
//! Turns successive master-server snapshots into create/update/delete
//! operations on one notification per server.

mod error;
mod key;
pub mod lifecycle;
mod models;
pub mod presence;
pub mod reconcile;
pub mod tracker;
mod watchlist;

pub use error::{CoreError, OperationError, Result, SinkError, SourceError};
pub use key::server_key;
pub use lifecycle::{NotificationManager, Renderer, Sink, SnapshotSource};
pub use models::{
  Artifact, ChannelId, ClientInfo, MessageRef, Notification, Participant, PlayerName,
  PresenceMatch, ServerKey, ServerMeta, ServerPresence, ServerRecord, Snapshot,
};
pub use reconcile::{Operation, ReconciliationState};
pub use tracker::{TickOutcome, TickReport, Tracker, TrackerOptions, TrackerStatus};
pub use watchlist::WatchList;
