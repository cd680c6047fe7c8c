//! Local note store
//!
//! The engine reads local rows through [`NoteStore`] and edits single notes
//! through [`NoteRecord`]. [`SqliteNoteStore`] is the bundled implementation.

mod record;
mod sqlite;

pub use record::NoteRecord;
pub use sqlite::{SqliteNoteStore, StoreSummary};

use crate::node::NoteType;
use crate::Result;

/// Columns of every note query, in order
pub const PROJECTION_NOTE: &str = "_id, alert_date, bg_color_id, created_date, has_attachment, \
     modified_date, notes_count, parent_id, snippet, type, widget_id, widget_type, sync_id, \
     local_modified, origin_parent_id, gtask_id, version";

pub const ID_COLUMN: usize = 0;
pub const ALERT_DATE_COLUMN: usize = 1;
pub const BG_COLOR_ID_COLUMN: usize = 2;
pub const CREATED_DATE_COLUMN: usize = 3;
pub const HAS_ATTACHMENT_COLUMN: usize = 4;
pub const MODIFIED_DATE_COLUMN: usize = 5;
pub const NOTES_COUNT_COLUMN: usize = 6;
pub const PARENT_ID_COLUMN: usize = 7;
pub const SNIPPET_COLUMN: usize = 8;
pub const TYPE_COLUMN: usize = 9;
pub const WIDGET_ID_COLUMN: usize = 10;
pub const WIDGET_TYPE_COLUMN: usize = 11;
pub const SYNC_ID_COLUMN: usize = 12;
pub const LOCAL_MODIFIED_COLUMN: usize = 13;
pub const ORIGIN_PARENT_ID_COLUMN: usize = 14;
pub const GTASK_ID_COLUMN: usize = 15;
pub const VERSION_COLUMN: usize = 16;

/// One note or folder row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteRow {
    pub id: i64,
    pub alert_date: i64,
    pub bg_color_id: i64,
    pub created_date: i64,
    pub has_attachment: i64,
    pub modified_date: i64,
    pub notes_count: i64,
    pub parent_id: i64,
    pub snippet: String,
    pub note_type: NoteType,
    pub widget_id: i64,
    pub widget_type: i64,
    /// Remote version stamp seen at the last successful sync
    pub sync_id: i64,
    /// Edited locally since the last sync
    pub local_modified: bool,
    pub origin_parent_id: i64,
    /// Remote id, empty when never synced
    pub gtask_id: String,
    pub version: i64,
}

impl NoteRow {
    /// Remote id, or `None` for a blank one
    pub fn gid(&self) -> Option<&str> {
        let gid = self.gtask_id.trim();
        if gid.is_empty() {
            None
        } else {
            Some(gid)
        }
    }

    pub fn is_note(&self) -> bool {
        self.note_type == NoteType::Note
    }
}

/// Row selections the engine needs; each is one forward scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    /// Non-system rows in the trash folder
    Trashed,
    /// Notes anywhere but the trash
    NotesOutsideTrash,
    /// User folders anywhere but the trash
    FoldersOutsideTrash,
    /// Every non-system row outside the trash
    SyncedOutsideTrash,
}

/// Row-level access to the local replica
pub trait NoteStore: Send {
    /// Rows matching `filter`, folders before notes
    fn query(&self, filter: RowFilter) -> Result<Vec<NoteRow>>;

    fn get(&self, id: i64) -> Result<Option<NoteRow>>;

    /// A row together with its data rows, ready for editing
    fn load(&self, id: i64) -> Result<Option<NoteRecord>>;

    /// Insert or update `record`, writing assigned ids back into it
    fn commit(&mut self, record: &mut NoteRecord) -> Result<i64>;

    fn note_exists(&self, id: i64) -> Result<bool>;

    fn data_exists(&self, id: i64) -> Result<bool>;

    /// Delete notes and their data rows in one transaction
    fn batch_delete(&mut self, ids: &[i64]) -> Result<()>;

    fn set_sync_id(&mut self, id: i64, sync_id: i64) -> Result<()>;
}
