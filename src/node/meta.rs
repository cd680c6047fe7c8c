//! Metadata shadows
//!
//! The remote side cannot hold local ids or attachment rows, so every synced
//! note gets a companion task in the meta list whose `notes` field is the JSON
//! of the note's full local content plus the gid of the task it describes.
//! A shadow is never projected to a local row and never classified.

use super::content::{MetaInfo, NoteContent};
use super::keys::META_NOTE_NAME;
use super::task::Task;
use super::RemoteEntity;
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaData {
    pub task: Task,
    related_gid: Option<String>,
}

impl MetaData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_remote(entity: &RemoteEntity) -> Self {
        let mut meta = Self::default();
        meta.set_content_from_remote(entity);
        meta
    }

    /// Record `content` as the local side of the task `gid`
    pub fn set_meta(&mut self, gid: &str, content: &NoteContent) -> Result<()> {
        let info = MetaInfo {
            meta_gid: Some(gid.to_string()),
            content: content.clone(),
        };
        self.task.notes = Some(serde_json::to_string(&info)?);
        self.task.base.name = META_NOTE_NAME.to_string();
        self.related_gid = Some(gid.to_string());
        Ok(())
    }

    /// Gid of the task this shadow describes
    pub fn related_gid(&self) -> Option<&str> {
        self.related_gid.as_deref()
    }

    pub fn set_content_from_remote(&mut self, entity: &RemoteEntity) {
        self.task.set_content_from_remote(entity);

        self.related_gid = match self.info() {
            Some(info) => info.meta_gid,
            None => None,
        };
        if self.related_gid.is_none() && self.task.notes.is_some() {
            tracing::warn!(gid = ?self.task.base.gid, "Failed to get related gid from shadow");
        }
    }

    pub fn is_worth_saving(&self) -> bool {
        self.task.notes.is_some()
    }

    /// The recorded local content, if the notes decode
    pub fn note_content(&self) -> Option<NoteContent> {
        self.info().map(|info| info.content)
    }

    fn info(&self) -> Option<MetaInfo> {
        let notes = self.task.notes.as_deref()?;
        match serde_json::from_str::<MetaInfo>(notes.trim()) {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(error = %e, gid = ?self.task.base.gid, "Undecodable shadow notes");
                None
            }
        }
    }
}
