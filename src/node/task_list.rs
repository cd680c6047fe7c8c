//! Remote task list, the counterpart of a local folder

use super::action::{Action, EntityDelta, EntityType};
use super::arena::ChildId;
use super::content::{NoteContent, NoteFields, NoteType, ID_CALL_RECORD_FOLDER, ID_ROOT_FOLDER};
use super::keys::{
    folder_list_name, strip_folder_prefix, CALL_NOTE_LIST_NAME, CREATOR_ID_NULL,
    FOLDER_CALL_NOTE, FOLDER_DEFAULT, ROOT_LIST_NAME,
};
use super::{NodeBase, RemoteEntity, SyncAction};
use crate::store::NoteRow;
use crate::{NoteSyncError, Result};

/// An ordered list of tasks
#[derive(Debug, Clone, PartialEq)]
pub struct TaskList {
    pub base: NodeBase,
    /// Position among the remote lists; only sent on create
    pub index: i32,
    pub(crate) children: Vec<ChildId>,
}

impl Default for TaskList {
    fn default() -> Self {
        Self {
            base: NodeBase::default(),
            index: 1,
            children: Vec::new(),
        }
    }
}

impl TaskList {
    pub fn named(name: impl Into<String>) -> Self {
        let mut list = Self::default();
        list.base.name = name.into();
        list
    }

    pub fn from_remote(entity: &RemoteEntity) -> Self {
        let mut list = Self::default();
        list.set_content_from_remote(entity);
        list
    }

    pub fn children(&self) -> &[ChildId] {
        &self.children
    }

    pub fn create_action(&self, action_id: i64) -> Action {
        Action::Create {
            action_id,
            index: self.index as i64,
            entity_delta: EntityDelta {
                name: Some(self.base.name.clone()),
                creator_id: Some(CREATOR_ID_NULL.to_string()),
                entity_type: Some(EntityType::Group),
                ..Default::default()
            },
            parent_id: None,
            dest_parent_type: None,
            list_id: None,
            prior_sibling_id: None,
        }
    }

    pub fn update_action(&self, action_id: i64) -> Result<Action> {
        let id = self
            .base
            .gid
            .clone()
            .ok_or_else(|| NoteSyncError::action("cannot update a task list without a gid"))?;

        Ok(Action::Update {
            action_id,
            id,
            entity_delta: EntityDelta {
                name: Some(self.base.name.clone()),
                deleted: Some(self.base.deleted),
                ..Default::default()
            },
        })
    }

    pub fn set_content_from_remote(&mut self, entity: &RemoteEntity) {
        self.base.apply_remote(entity);
    }

    /// Take the name from a local folder row's content
    pub fn set_content_from_local(&mut self, content: &NoteContent) {
        let folder = &content.meta_note;

        match folder.note_type {
            Some(NoteType::Folder) => {
                let title = folder.snippet.as_deref().unwrap_or_default();
                self.base.name = folder_list_name(title);
            }
            Some(NoteType::System) => match folder.id {
                Some(ID_ROOT_FOLDER) => self.base.name = ROOT_LIST_NAME.to_string(),
                Some(ID_CALL_RECORD_FOLDER) => self.base.name = CALL_NOTE_LIST_NAME.to_string(),
                other => tracing::error!(id = ?other, "Invalid system folder"),
            },
            other => tracing::error!(note_type = ?other, "Not a folder"),
        }
    }

    /// The folder row this list maps to
    pub fn to_local_content(&self) -> NoteContent {
        let title = strip_folder_prefix(&self.base.name);
        let note_type = if title == FOLDER_DEFAULT || title == FOLDER_CALL_NOTE {
            NoteType::System
        } else {
            NoteType::Folder
        };

        NoteContent {
            meta_note: NoteFields {
                snippet: Some(title.to_string()),
                note_type: Some(note_type),
                ..Default::default()
            },
            meta_data: Vec::new(),
        }
    }

    /// Folders resolve conflicts in favour of the local side directly
    pub fn classify(&self, row: &NoteRow) -> SyncAction {
        self.base.classify(row, SyncAction::UpdateRemote)
    }
}
