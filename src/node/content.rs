//! Local representation of a note as it travels through the remote side
//!
//! A [`NoteContent`] is what the local store produces for one row and what a
//! metadata shadow carries in its `notes` field. Every field is optional so a
//! partial object (e.g. a folder projection with just `snippet` and `type`)
//! round-trips without inventing values.

use super::keys::{MIME_CALL_NOTE, MIME_TEXT_NOTE};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Root folder; notes without a folder live here
pub const ID_ROOT_FOLDER: i64 = 0;
/// Temporary folder used by the editor for unsaved notes
pub const ID_TEMP_FOLDER: i64 = -1;
/// System folder collecting call notes
pub const ID_CALL_RECORD_FOLDER: i64 = -2;
/// Trash folder
pub const ID_TRASH_FOLDER: i64 = -3;

/// Row type, stored as an integer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum NoteType {
    #[default]
    Note = 0,
    Folder = 1,
    System = 2,
}

impl NoteType {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(NoteType::Note),
            1 => Some(NoteType::Folder),
            2 => Some(NoteType::System),
            _ => None,
        }
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

/// Note-level columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteFields {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg_color_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_attachment: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub note_type: Option<NoteType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widget_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widget_type: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

/// One attachment/data row of a note
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataFields {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data1: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data2: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data3: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data5: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<i64>,
}

impl DataFields {
    /// A plain text body
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            mime_type: Some(MIME_TEXT_NOTE.to_string()),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// True for the rows whose content is the note's visible body
    pub fn is_body(&self) -> bool {
        matches!(
            self.mime_type.as_deref(),
            Some(MIME_TEXT_NOTE) | Some(MIME_CALL_NOTE)
        )
    }
}

/// A note (or folder) with its data rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteContent {
    pub meta_note: NoteFields,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub meta_data: Vec<DataFields>,
}

impl NoteContent {
    /// Body text: content of the first text or call-note row
    pub fn body(&self) -> Option<&str> {
        self.meta_data
            .iter()
            .find(|d| d.is_body())
            .and_then(|d| d.content.as_deref())
    }

    pub fn body_mut(&mut self) -> Option<&mut DataFields> {
        self.meta_data.iter_mut().find(|d| d.is_body())
    }

    pub fn note_type(&self) -> Option<NoteType> {
        self.meta_note.note_type
    }
}

/// What a metadata shadow stores in its `notes` field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_gid: Option<String>,
    #[serde(flatten)]
    pub content: NoteContent,
}
