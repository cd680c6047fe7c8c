//! Reconciliation between the local store and the task service
//!
//! [`SyncEngine`] is the long-lived object a driver holds: it owns the client
//! and the store, allows one run at a time and can be cancelled from another
//! task. Each run builds a fresh session that walks three phases:
//!
//! 1. snapshot the remote lists, tasks and metadata shadows
//! 2. reconcile folders (system folders first)
//! 3. reconcile notes, purge locally deleted rows and refresh sync ids

mod engine;
mod session;

pub use engine::SyncEngine;

use crate::node::SyncAction;
use crate::{FailureKind, NoteSyncError, Result};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::broadcast;

/// Default event channel capacity
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Success,
    NetworkError,
    InternalError,
    InProgress,
    Cancelled,
}

impl SyncStatus {
    pub fn from_result(result: &Result<SyncReport>) -> Self {
        match result {
            Ok(report) if report.cancelled => SyncStatus::Cancelled,
            Ok(_) => SyncStatus::Success,
            Err(NoteSyncError::InProgress) => SyncStatus::InProgress,
            Err(e) => match e.kind() {
                FailureKind::Transport => SyncStatus::NetworkError,
                FailureKind::Logic => SyncStatus::InternalError,
            },
        }
    }

    pub fn is_success(self) -> bool {
        self == SyncStatus::Success
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Success => "success",
            SyncStatus::NetworkError => "network error",
            SyncStatus::InternalError => "internal error",
            SyncStatus::InProgress => "already in progress",
            SyncStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Stage of a run, reported through [`SyncEvent::Phase`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Login,
    Snapshot,
    Folders,
    Content,
    Refresh,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncPhase::Login => "logging in",
            SyncPhase::Snapshot => "fetching remote lists",
            SyncPhase::Folders => "syncing folders",
            SyncPhase::Content => "syncing notes",
            SyncPhase::Refresh => "refreshing sync ids",
        };
        write!(f, "{}", s)
    }
}

/// Progress of a run
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Started,
    Phase(SyncPhase),
    /// An action other than [`SyncAction::None`] was executed
    Applied {
        action: SyncAction,
        name: String,
    },
    Finished(SyncStatus),
}

/// Per-action counters of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub unchanged: usize,
    pub added_local: usize,
    pub added_remote: usize,
    pub deleted_local: usize,
    pub deleted_remote: usize,
    pub updated_local: usize,
    pub updated_remote: usize,
    /// Changed on both sides; resolved in favour of the local copy
    pub conflicts: usize,
}

impl SyncStats {
    pub fn record(&mut self, action: SyncAction) {
        match action {
            SyncAction::None => self.unchanged += 1,
            SyncAction::AddLocal => self.added_local += 1,
            SyncAction::AddRemote => self.added_remote += 1,
            SyncAction::DelLocal => self.deleted_local += 1,
            SyncAction::DelRemote => self.deleted_remote += 1,
            SyncAction::UpdateLocal => self.updated_local += 1,
            SyncAction::UpdateRemote => self.updated_remote += 1,
            SyncAction::UpdateConflict => self.conflicts += 1,
            SyncAction::Error => {}
        }
    }

    /// Number of executed actions that changed something
    pub fn change_count(&self) -> usize {
        self.added_local
            + self.added_remote
            + self.deleted_local
            + self.deleted_remote
            + self.updated_local
            + self.updated_remote
            + self.conflicts
    }

    pub fn has_changes(&self) -> bool {
        self.change_count() > 0
    }
}

/// What a completed (or cancelled) run leaves behind
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub stats: SyncStats,
    pub gid_to_nid: HashMap<String, i64>,
    pub nid_to_gid: HashMap<i64, String>,
    /// The run stopped early; sync ids were not refreshed
    pub cancelled: bool,
}

/// Send an event, logging if nobody is listening
pub(crate) fn send_event(tx: &broadcast::Sender<SyncEvent>, event: SyncEvent) {
    if tx.send(event).is_err() {
        tracing::trace!("Event sent but no receivers subscribed");
    }
}
