//! Node model
//!
//! The remote side of one sync run: task lists, tasks and metadata shadows,
//! all stored in a [`NodeArena`] and addressed by typed handles.
//!
//! - **TaskList**: a remote list, the counterpart of a local folder
//! - **Task**: a remote task, the counterpart of a local note
//! - **MetaData**: a task in the reserved meta list carrying the local-only
//!   fields of one note
//!
//! Only lists and tasks can be projected to local content or classified against
//! a local row; [`NodeRef`] has no metadata variant, so asking either question
//! of a shadow does not compile.

mod action;
mod arena;
mod content;
pub mod keys;
mod meta;
mod task;
mod task_list;

pub use action::{Action, EntityDelta, EntityType};
pub use arena::{ChildId, EntityRef, ListId, MetaId, NodeArena, NodeRef, TaskId};
pub use content::{
    DataFields, MetaInfo, NoteContent, NoteFields, NoteType, ID_CALL_RECORD_FOLDER,
    ID_ROOT_FOLDER, ID_TEMP_FOLDER, ID_TRASH_FOLDER,
};
pub use meta::MetaData;
pub use task::Task;
pub use task_list::TaskList;

use crate::store::NoteRow;
use serde::Deserialize;
use std::fmt;

/// Outcome of comparing one local row with its remote counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncAction {
    None,
    AddRemote,
    AddLocal,
    DelRemote,
    DelLocal,
    UpdateRemote,
    UpdateLocal,
    UpdateConflict,
    Error,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncAction::None => "none",
            SyncAction::AddRemote => "add-remote",
            SyncAction::AddLocal => "add-local",
            SyncAction::DelRemote => "del-remote",
            SyncAction::DelLocal => "del-local",
            SyncAction::UpdateRemote => "update-remote",
            SyncAction::UpdateLocal => "update-local",
            SyncAction::UpdateConflict => "update-conflict",
            SyncAction::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Fields every remote entity has
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeBase {
    /// Remote id; `None` until the entity has been created remotely
    pub gid: Option<String>,
    pub name: String,
    /// Remote version stamp
    pub last_modified: i64,
    pub deleted: bool,
}

impl NodeBase {
    pub fn gid(&self) -> Option<&str> {
        self.gid.as_deref()
    }

    /// Copy the fields present in a remote payload; absent ones keep their value
    pub(crate) fn apply_remote(&mut self, entity: &RemoteEntity) {
        if let Some(ref id) = entity.id {
            self.gid = Some(id.clone());
        }
        if let Some(last_modified) = entity.last_modified {
            self.last_modified = last_modified;
        }
        if let Some(ref name) = entity.name {
            self.name = name.clone();
        }
        if let Some(deleted) = entity.deleted {
            self.deleted = deleted;
        }
    }

    /// The version table shared by lists and tasks
    ///
    /// `conflict` is what a row that changed on both sides becomes.
    pub(crate) fn classify(&self, row: &NoteRow, conflict: SyncAction) -> SyncAction {
        if !row.local_modified {
            if row.sync_id == self.last_modified {
                SyncAction::None
            } else {
                SyncAction::UpdateLocal
            }
        } else if row.gid() != self.gid() {
            tracing::error!(
                row = row.id,
                row_gid = %row.gtask_id,
                node_gid = ?self.gid,
                "Remote id does not match"
            );
            SyncAction::Error
        } else if row.sync_id == self.last_modified {
            SyncAction::UpdateRemote
        } else {
            conflict
        }
    }
}

/// A list or task as the remote service returns it
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemoteEntity {
    pub id: Option<String>,
    pub name: Option<String>,
    pub last_modified: Option<i64>,
    pub notes: Option<String>,
    pub deleted: Option<bool>,
    pub completed: Option<bool>,
}

impl RemoteEntity {
    /// Decode one item of a fetch; `None` (with a warning) if it is not an entity
    pub fn parse(value: &serde_json::Value) -> Option<Self> {
        match serde_json::from_value(value.clone()) {
            Ok(entity) => Some(entity),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping undecodable remote item");
                None
            }
        }
    }
}
