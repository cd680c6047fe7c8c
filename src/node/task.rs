//! Remote task, the counterpart of a local note

use super::action::{Action, EntityDelta, EntityType};
use super::arena::{ChildId, ListId};
use super::content::{DataFields, NoteContent, NoteType};
use super::keys::CREATOR_ID_NULL;
use super::meta::MetaData;
use super::task_list::TaskList;
use super::{NodeBase, RemoteEntity, SyncAction};
use crate::store::NoteRow;
use crate::{NoteSyncError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Task {
    pub base: NodeBase,
    pub notes: Option<String>,
    pub completed: bool,
    /// Local content recovered from this task's metadata shadow
    pub meta_info: Option<NoteContent>,
    pub(crate) parent: Option<ListId>,
    pub(crate) prior_sibling: Option<ChildId>,
}

impl Task {
    pub fn from_remote(entity: &RemoteEntity) -> Self {
        let mut task = Self::default();
        task.set_content_from_remote(entity);
        task
    }

    pub fn parent(&self) -> Option<ListId> {
        self.parent
    }

    pub fn prior_sibling(&self) -> Option<ChildId> {
        self.prior_sibling
    }

    /// Create action for a task sitting at `index` in `parent`
    pub fn create_action(
        &self,
        action_id: i64,
        parent: &TaskList,
        index: usize,
        prior_gid: Option<&str>,
    ) -> Result<Action> {
        let parent_gid = parent
            .base
            .gid
            .clone()
            .ok_or_else(|| NoteSyncError::action("parent list has no gid yet"))?;

        Ok(Action::Create {
            action_id,
            index: index as i64,
            entity_delta: EntityDelta {
                name: Some(self.base.name.clone()),
                creator_id: Some(CREATOR_ID_NULL.to_string()),
                entity_type: Some(EntityType::Task),
                notes: self.notes.clone(),
                deleted: None,
            },
            parent_id: Some(parent_gid.clone()),
            dest_parent_type: Some(EntityType::Group),
            list_id: Some(parent_gid),
            prior_sibling_id: prior_gid.map(str::to_string),
        })
    }

    pub fn update_action(&self, action_id: i64) -> Result<Action> {
        let id = self
            .base
            .gid
            .clone()
            .ok_or_else(|| NoteSyncError::action("cannot update a task without a gid"))?;

        Ok(Action::Update {
            action_id,
            id,
            entity_delta: EntityDelta {
                name: Some(self.base.name.clone()),
                notes: self.notes.clone(),
                deleted: Some(self.base.deleted),
                ..Default::default()
            },
        })
    }

    pub fn set_content_from_remote(&mut self, entity: &RemoteEntity) {
        self.base.apply_remote(entity);
        if let Some(ref notes) = entity.notes {
            self.notes = Some(notes.clone());
        }
        if let Some(completed) = entity.completed {
            self.completed = completed;
        }
    }

    /// Take the name from a local note's body
    pub fn set_content_from_local(&mut self, content: &NoteContent) {
        if content.note_type() != Some(NoteType::Note) {
            tracing::error!(note_type = ?content.note_type(), "Invalid note type");
            return;
        }

        if let Some(body) = content.body() {
            self.base.name = body.to_string();
        }
    }

    /// The note row this task maps to
    ///
    /// A task created on the remote side has no shadow yet and becomes a plain
    /// text note. A synced task reuses the recorded local content with the
    /// body replaced by the current name.
    pub fn to_local_content(&self) -> Result<NoteContent> {
        match self.meta_info {
            None => {
                if self.base.name.is_empty() {
                    tracing::warn!(gid = ?self.base.gid, "The note seems to be an empty one");
                    return Err(NoteSyncError::action("remote task has neither name nor metadata"));
                }

                let mut content = NoteContent::default();
                content.meta_note.note_type = Some(NoteType::Note);
                content.meta_data.push(DataFields::text(self.base.name.clone()));
                Ok(content)
            }
            Some(ref meta) => {
                let mut content = meta.clone();
                if let Some(body) = content.body_mut() {
                    body.content = Some(self.base.name.clone());
                }
                content.meta_note.note_type = Some(NoteType::Note);
                Ok(content)
            }
        }
    }

    /// Attach the local content recorded by a shadow, if there is one
    pub fn set_meta_info(&mut self, meta: Option<&MetaData>) {
        self.meta_info = meta.and_then(MetaData::note_content);
    }

    pub fn is_worth_saving(&self) -> bool {
        self.meta_info.is_some()
            || !self.base.name.trim().is_empty()
            || self
                .notes
                .as_deref()
                .is_some_and(|notes| !notes.trim().is_empty())
    }

    /// Compare with the local row; a change on both sides is a conflict
    pub fn classify(&self, row: &NoteRow) -> SyncAction {
        let Some(ref note) = self.meta_info else {
            tracing::warn!(gid = ?self.base.gid, "Note metadata has been deleted");
            return SyncAction::UpdateRemote;
        };

        match note.meta_note.id {
            None => {
                tracing::warn!(gid = ?self.base.gid, "Remote note id seems to be deleted");
                SyncAction::UpdateLocal
            }
            Some(id) if id != row.id => {
                tracing::warn!(row = row.id, recorded = id, "Note id doesn't match");
                SyncAction::UpdateLocal
            }
            Some(_) => self.base.classify(row, SyncAction::UpdateConflict),
        }
    }
}
