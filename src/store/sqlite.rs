//! SQLite note store

use super::{
    NoteRecord, NoteRow, NoteStore, RowFilter, ALERT_DATE_COLUMN, BG_COLOR_ID_COLUMN,
    CREATED_DATE_COLUMN, GTASK_ID_COLUMN, HAS_ATTACHMENT_COLUMN, ID_COLUMN,
    LOCAL_MODIFIED_COLUMN, MODIFIED_DATE_COLUMN, NOTES_COUNT_COLUMN, ORIGIN_PARENT_ID_COLUMN,
    PARENT_ID_COLUMN, PROJECTION_NOTE, SNIPPET_COLUMN, SYNC_ID_COLUMN, TYPE_COLUMN,
    VERSION_COLUMN, WIDGET_ID_COLUMN, WIDGET_TYPE_COLUMN,
};
use crate::node::{
    DataFields, NoteContent, NoteFields, NoteType, ID_CALL_RECORD_FOLDER, ID_ROOT_FOLDER,
    ID_TEMP_FOLDER, ID_TRASH_FOLDER,
};
use crate::{NoteSyncError, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Counters shown by `notesync status`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub folders: i64,
    pub notes: i64,
    pub trashed: i64,
    /// Rows that have never been pushed
    pub unsynced: i64,
    /// Rows edited since the last sync
    pub modified: i64,
}

/// Note store backed by a SQLite file
pub struct SqliteNoteStore {
    conn: Connection,
}

impl SqliteNoteStore {
    /// Open or create a store database
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(path = %path.display(), "Opening note store");

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// A throwaway store, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS note (
                _id INTEGER PRIMARY KEY,
                parent_id INTEGER NOT NULL DEFAULT 0,
                alert_date INTEGER NOT NULL DEFAULT 0,
                bg_color_id INTEGER NOT NULL DEFAULT 0,
                created_date INTEGER NOT NULL DEFAULT (strftime('%s','now') * 1000),
                has_attachment INTEGER NOT NULL DEFAULT 0,
                modified_date INTEGER NOT NULL DEFAULT (strftime('%s','now') * 1000),
                notes_count INTEGER NOT NULL DEFAULT 0,
                snippet TEXT NOT NULL DEFAULT '',
                type INTEGER NOT NULL DEFAULT 0,
                widget_id INTEGER NOT NULL DEFAULT 0,
                widget_type INTEGER NOT NULL DEFAULT -1,
                sync_id INTEGER NOT NULL DEFAULT 0,
                local_modified INTEGER NOT NULL DEFAULT 0,
                origin_parent_id INTEGER NOT NULL DEFAULT 0,
                gtask_id TEXT NOT NULL DEFAULT '',
                version INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS data (
                _id INTEGER PRIMARY KEY,
                mime_type TEXT NOT NULL,
                note_id INTEGER NOT NULL DEFAULT 0,
                created_date INTEGER NOT NULL DEFAULT (strftime('%s','now') * 1000),
                modified_date INTEGER NOT NULL DEFAULT (strftime('%s','now') * 1000),
                content TEXT NOT NULL DEFAULT '',
                data1 INTEGER,
                data2 INTEGER,
                data3 TEXT NOT NULL DEFAULT '',
                data4 TEXT NOT NULL DEFAULT '',
                data5 TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_data_note_id ON data(note_id);

            CREATE TRIGGER IF NOT EXISTS increase_folder_count_on_insert
                AFTER INSERT ON note
            BEGIN
                UPDATE note SET notes_count = notes_count + 1 WHERE _id = new.parent_id;
            END;

            CREATE TRIGGER IF NOT EXISTS decrease_folder_count_on_delete
                AFTER DELETE ON note
            BEGIN
                UPDATE note SET notes_count = notes_count - 1
                    WHERE _id = old.parent_id AND notes_count > 0;
            END;

            CREATE TRIGGER IF NOT EXISTS update_folder_count_on_move
                AFTER UPDATE OF parent_id ON note
                WHEN old.parent_id <> new.parent_id
            BEGIN
                UPDATE note SET notes_count = notes_count + 1 WHERE _id = new.parent_id;
                UPDATE note SET notes_count = notes_count - 1
                    WHERE _id = old.parent_id AND notes_count > 0;
            END;

            CREATE TRIGGER IF NOT EXISTS folder_move_notes_on_trash
                AFTER UPDATE OF parent_id ON note
                WHEN new.parent_id = -3 AND new.type = 1
            BEGIN
                UPDATE note SET origin_parent_id = parent_id, parent_id = -3
                    WHERE parent_id = old._id;
            END;

            CREATE TRIGGER IF NOT EXISTS delete_data_on_delete
                AFTER DELETE ON note
            BEGIN
                DELETE FROM data WHERE note_id = old._id;
            END;
            "#,
        )?;

        for (id, snippet) in [
            (ID_ROOT_FOLDER, ""),
            (ID_TEMP_FOLDER, ""),
            (ID_CALL_RECORD_FOLDER, "Call_Note"),
            (ID_TRASH_FOLDER, "Trash"),
        ] {
            self.conn.execute(
                "INSERT OR IGNORE INTO note (_id, parent_id, snippet, type) VALUES (?1, 0, ?2, ?3)",
                params![id, snippet, NoteType::System.as_i64()],
            )?;
        }

        Ok(())
    }

    // Editor side. Every change sets local_modified the way the app does.

    /// Create a folder under the root
    pub fn create_folder(&mut self, name: &str) -> Result<i64> {
        self.ensure_folder_name_free(name, None)?;
        let mut record = NoteRecord::from_new();
        record.set_content(&NoteContent {
            meta_note: NoteFields {
                snippet: Some(name.to_string()),
                note_type: Some(NoteType::Folder),
                ..Default::default()
            },
            meta_data: Vec::new(),
        });
        record.mark_local_modified();
        self.commit(&mut record)
    }

    /// Create a text note in `folder`
    pub fn create_note(&mut self, folder: i64, body: &str) -> Result<i64> {
        let mut record = NoteRecord::from_new();
        record.set_parent_id(folder);
        record.set_body(body);
        record.mark_local_modified();
        self.commit(&mut record)
    }

    pub fn edit_note(&mut self, id: i64, body: &str) -> Result<()> {
        let mut record = self.require(id)?;
        if !record.is_note_type() {
            return Err(NoteSyncError::Storage(format!("{} is not a note", id)));
        }
        record.set_body(body);
        record.mark_local_modified();
        self.commit(&mut record)?;
        Ok(())
    }

    pub fn rename_folder(&mut self, id: i64, name: &str) -> Result<()> {
        let mut record = self.require(id)?;
        if record.row().note_type != NoteType::Folder {
            return Err(NoteSyncError::Storage(format!("{} is not a folder", id)));
        }
        self.ensure_folder_name_free(name, Some(id))?;
        record.row.snippet = name.to_string();
        record.mark_local_modified();
        self.commit(&mut record)?;
        Ok(())
    }

    pub fn move_note(&mut self, id: i64, folder: i64) -> Result<()> {
        let mut record = self.require(id)?;
        record.row.origin_parent_id = record.parent_id();
        record.set_parent_id(folder);
        record.mark_local_modified();
        self.commit(&mut record)?;
        Ok(())
    }

    /// Move a note or folder to the trash; a folder takes its notes along
    pub fn trash_note(&mut self, id: i64) -> Result<()> {
        self.move_note(id, ID_TRASH_FOLDER)
    }

    /// Notes in `folder`, or in every folder outside the trash
    pub fn list_notes(&self, folder: Option<i64>) -> Result<Vec<NoteRow>> {
        let notes = self.query(RowFilter::NotesOutsideTrash)?;
        Ok(match folder {
            Some(folder) => notes.into_iter().filter(|n| n.parent_id == folder).collect(),
            None => notes,
        })
    }

    pub fn summary(&self) -> Result<StoreSummary> {
        let summary = self.conn.query_row(
            r#"
            SELECT
                COALESCE(SUM(type = 1 AND parent_id <> -3), 0),
                COALESCE(SUM(type = 0 AND parent_id <> -3), 0),
                COALESCE(SUM(type <> 2 AND parent_id = -3), 0),
                COALESCE(SUM(type <> 2 AND parent_id <> -3 AND gtask_id = ''), 0),
                COALESCE(SUM(type <> 2 AND local_modified = 1), 0)
            FROM note
            "#,
            [],
            |row| {
                Ok(StoreSummary {
                    folders: row.get(0)?,
                    notes: row.get(1)?,
                    trashed: row.get(2)?,
                    unsynced: row.get(3)?,
                    modified: row.get(4)?,
                })
            },
        )?;
        Ok(summary)
    }

    /// Folder names outside the trash are unique; each maps to one remote list
    fn ensure_folder_name_free(&self, name: &str, except: Option<i64>) -> Result<()> {
        let taken: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM note WHERE type = 1 AND parent_id <> ?1 AND snippet = ?2 \
             AND (?3 IS NULL OR _id <> ?3)",
            params![ID_TRASH_FOLDER, name, except],
            |row| row.get(0),
        )?;
        if taken > 0 {
            return Err(NoteSyncError::Storage(format!(
                "a folder named '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    fn require(&self, id: i64) -> Result<NoteRecord> {
        self.load(id)?
            .ok_or_else(|| NoteSyncError::Storage(format!("note {} not found", id)))
    }

    fn load_data(&self, note_id: i64) -> Result<Vec<DataFields>> {
        let mut stmt = self.conn.prepare(
            "SELECT _id, mime_type, content, data1, data2, data3, data4, data5, \
             created_date, modified_date FROM data WHERE note_id = ?1 ORDER BY _id",
        )?;

        let rows = stmt.query_map([note_id], |row| {
            Ok(DataFields {
                id: Some(row.get(0)?),
                mime_type: Some(row.get(1)?),
                content: Some(row.get(2)?),
                data1: row.get(3)?,
                data2: row.get(4)?,
                data3: Some(row.get(5)?),
                data4: Some(row.get(6)?),
                data5: Some(row.get(7)?),
                created_date: Some(row.get(8)?),
                modified_date: Some(row.get(9)?),
            })
        })?;

        let mut data = Vec::new();
        for row in rows {
            data.push(row?);
        }
        Ok(data)
    }
}

impl NoteRow {
    fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let raw_type: i64 = row.get(TYPE_COLUMN)?;
        let note_type = NoteType::from_i64(raw_type).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                TYPE_COLUMN,
                Type::Integer,
                Box::new(NoteSyncError::Storage(format!("unknown note type {}", raw_type))),
            )
        })?;

        Ok(Self {
            id: row.get(ID_COLUMN)?,
            alert_date: row.get(ALERT_DATE_COLUMN)?,
            bg_color_id: row.get(BG_COLOR_ID_COLUMN)?,
            created_date: row.get(CREATED_DATE_COLUMN)?,
            has_attachment: row.get(HAS_ATTACHMENT_COLUMN)?,
            modified_date: row.get(MODIFIED_DATE_COLUMN)?,
            notes_count: row.get(NOTES_COUNT_COLUMN)?,
            parent_id: row.get(PARENT_ID_COLUMN)?,
            snippet: row.get(SNIPPET_COLUMN)?,
            note_type,
            widget_id: row.get(WIDGET_ID_COLUMN)?,
            widget_type: row.get(WIDGET_TYPE_COLUMN)?,
            sync_id: row.get(SYNC_ID_COLUMN)?,
            local_modified: row.get::<_, i64>(LOCAL_MODIFIED_COLUMN)? != 0,
            origin_parent_id: row.get(ORIGIN_PARENT_ID_COLUMN)?,
            gtask_id: row.get(GTASK_ID_COLUMN)?,
            version: row.get(VERSION_COLUMN)?,
        })
    }
}

fn filter_clause(filter: RowFilter) -> &'static str {
    match filter {
        RowFilter::Trashed => "type <> 2 AND parent_id = -3",
        RowFilter::NotesOutsideTrash => "type = 0 AND parent_id <> -3",
        RowFilter::FoldersOutsideTrash => "type = 1 AND parent_id <> -3",
        RowFilter::SyncedOutsideTrash => "type <> 2 AND parent_id <> -3",
    }
}

fn exists(conn: &Connection, sql: &str, id: i64) -> Result<bool> {
    Ok(conn
        .query_row(sql, [id], |_| Ok(()))
        .optional()?
        .is_some())
}

/// Write one data row, returning its id
fn commit_data(conn: &Connection, note_id: i64, data: &DataFields, now: i64) -> Result<i64> {
    let owner: Option<i64> = match data.id {
        Some(id) => conn
            .query_row("SELECT note_id FROM data WHERE _id = ?1", [id], |row| row.get(0))
            .optional()?,
        None => None,
    };

    if let (Some(id), Some(owner)) = (data.id, owner) {
        if owner == note_id {
            conn.execute(
                r#"
                UPDATE data SET
                    mime_type = COALESCE(?2, mime_type),
                    content = COALESCE(?3, content),
                    data1 = COALESCE(?4, data1),
                    data2 = COALESCE(?5, data2),
                    data3 = COALESCE(?6, data3),
                    data4 = COALESCE(?7, data4),
                    data5 = COALESCE(?8, data5),
                    modified_date = ?9
                WHERE _id = ?1
                "#,
                params![
                    id,
                    data.mime_type,
                    data.content,
                    data.data1,
                    data.data2,
                    data.data3,
                    data.data4,
                    data.data5,
                    now,
                ],
            )?;
            return Ok(id);
        }
        tracing::warn!(data_id = id, owner, note_id, "Data id taken by another note");
    }

    // An id nobody owns is kept; one owned by another note is dropped
    let explicit = if owner.is_none() { data.id } else { None };
    conn.execute(
        r#"
        INSERT INTO data (
            _id, mime_type, note_id, created_date, modified_date,
            content, data1, data2, data3, data4, data5
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            explicit,
            data.mime_type.as_deref().unwrap_or_default(),
            note_id,
            data.created_date.unwrap_or(now),
            data.modified_date.unwrap_or(now),
            data.content.as_deref().unwrap_or_default(),
            data.data1,
            data.data2,
            data.data3.as_deref().unwrap_or_default(),
            data.data4.as_deref().unwrap_or_default(),
            data.data5.as_deref().unwrap_or_default(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl NoteStore for SqliteNoteStore {
    fn query(&self, filter: RowFilter) -> Result<Vec<NoteRow>> {
        let sql = format!(
            "SELECT {} FROM note WHERE {} ORDER BY type DESC, _id ASC",
            PROJECTION_NOTE,
            filter_clause(filter)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], NoteRow::from_sql)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn get(&self, id: i64) -> Result<Option<NoteRow>> {
        let sql = format!("SELECT {} FROM note WHERE _id = ?1", PROJECTION_NOTE);
        Ok(self
            .conn
            .query_row(&sql, [id], NoteRow::from_sql)
            .optional()?)
    }

    fn load(&self, id: i64) -> Result<Option<NoteRecord>> {
        let Some(row) = self.get(id)? else {
            return Ok(None);
        };
        let data = self.load_data(id)?;
        Ok(Some(NoteRecord::from_row(row, data)))
    }

    fn commit(&mut self, record: &mut NoteRecord) -> Result<i64> {
        let now = chrono::Utc::now().timestamp_millis();
        let tx = self.conn.unchecked_transaction()?;

        let stored = match record.id {
            Some(id) => exists(&tx, "SELECT 1 FROM note WHERE _id = ?1", id)?,
            None => false,
        };

        let row = &record.row;
        let id = if stored {
            let id = record.id.unwrap_or_default();
            tx.execute(
                r#"
                UPDATE note SET
                    parent_id = ?2, alert_date = ?3, bg_color_id = ?4, created_date = ?5,
                    has_attachment = ?6, modified_date = ?7, snippet = ?8, type = ?9,
                    widget_id = ?10, widget_type = ?11, sync_id = ?12, local_modified = ?13,
                    origin_parent_id = ?14, gtask_id = ?15, version = ?16
                WHERE _id = ?1
                "#,
                params![
                    id,
                    row.parent_id,
                    row.alert_date,
                    row.bg_color_id,
                    row.created_date,
                    row.has_attachment,
                    row.modified_date,
                    &row.snippet,
                    row.note_type.as_i64(),
                    row.widget_id,
                    row.widget_type,
                    row.sync_id,
                    row.local_modified as i64,
                    row.origin_parent_id,
                    &row.gtask_id,
                    row.version,
                ],
            )?;
            id
        } else {
            tx.execute(
                r#"
                INSERT INTO note (
                    _id, parent_id, alert_date, bg_color_id, created_date,
                    has_attachment, modified_date, snippet, type, widget_id,
                    widget_type, sync_id, local_modified, origin_parent_id, gtask_id, version
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                "#,
                params![
                    record.id,
                    row.parent_id,
                    row.alert_date,
                    row.bg_color_id,
                    row.created_date,
                    row.has_attachment,
                    row.modified_date,
                    &row.snippet,
                    row.note_type.as_i64(),
                    row.widget_id,
                    row.widget_type,
                    row.sync_id,
                    row.local_modified as i64,
                    row.origin_parent_id,
                    &row.gtask_id,
                    row.version,
                ],
            )?;
            tx.last_insert_rowid()
        };

        if record.is_note_type() {
            for data in record.data.iter_mut() {
                let data_id = commit_data(&tx, id, data, now)?;
                data.id = Some(data_id);
            }
        }

        tx.commit()?;

        record.id = Some(id);
        record.row.id = id;
        tracing::debug!(id, parent = record.row.parent_id, "Committed note");
        Ok(id)
    }

    fn note_exists(&self, id: i64) -> Result<bool> {
        exists(&self.conn, "SELECT 1 FROM note WHERE _id = ?1", id)
    }

    fn data_exists(&self, id: i64) -> Result<bool> {
        exists(&self.conn, "SELECT 1 FROM data WHERE _id = ?1", id)
    }

    fn batch_delete(&mut self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut deleted = 0;
        for &id in ids {
            if id <= ID_ROOT_FOLDER {
                tracing::warn!(id, "Refusing to delete a system folder");
                continue;
            }
            deleted += tx.execute("DELETE FROM note WHERE _id = ?1", [id])?;
        }
        tx.commit()?;

        tracing::info!(requested = ids.len(), deleted, "Deleted local notes");
        Ok(())
    }

    fn set_sync_id(&mut self, id: i64, sync_id: i64) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE note SET sync_id = ?2 WHERE _id = ?1",
            params![id, sync_id],
        )?;
        if updated == 0 {
            return Err(NoteSyncError::Storage(format!(
                "cannot set sync id of missing note {}",
                id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> SqliteNoteStore {
        SqliteNoteStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_system_folders_exist() {
        let store = store();
        for id in [ID_ROOT_FOLDER, ID_TEMP_FOLDER, ID_CALL_RECORD_FOLDER, ID_TRASH_FOLDER] {
            let row = store.get(id).unwrap().unwrap();
            assert_eq!(row.note_type, NoteType::System);
        }
        assert!(store.query(RowFilter::SyncedOutsideTrash).unwrap().is_empty());
    }

    #[test]
    fn test_open_file_twice() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("notes.db");

        let id = {
            let mut store = SqliteNoteStore::open(&path).unwrap();
            store.create_note(ID_ROOT_FOLDER, "kept").unwrap()
        };

        let store = SqliteNoteStore::open(&path).unwrap();
        assert_eq!(store.get(id).unwrap().unwrap().snippet, "kept");
    }

    #[test]
    fn test_create_note_marks_modified() {
        let mut store = store();
        let folder = store.create_folder("Work").unwrap();
        let note = store.create_note(folder, "buy milk").unwrap();

        let row = store.get(note).unwrap().unwrap();
        assert!(row.local_modified);
        assert_eq!(row.parent_id, folder);
        assert_eq!(row.snippet, "buy milk");
        assert_eq!(row.gid(), None);

        let record = store.load(note).unwrap().unwrap();
        assert_eq!(record.data().len(), 1);
        assert_eq!(record.content().body(), Some("buy milk"));

        assert_eq!(store.get(folder).unwrap().unwrap().notes_count, 1);
    }

    #[test]
    fn test_filters() {
        let mut store = store();
        let folder = store.create_folder("Work").unwrap();
        let keep = store.create_note(folder, "keep").unwrap();
        let gone = store.create_note(ID_ROOT_FOLDER, "gone").unwrap();
        store.trash_note(gone).unwrap();

        let ids = |filter| -> Vec<i64> {
            store.query(filter).unwrap().iter().map(|r| r.id).collect()
        };
        assert_eq!(ids(RowFilter::FoldersOutsideTrash), vec![folder]);
        assert_eq!(ids(RowFilter::NotesOutsideTrash), vec![keep]);
        assert_eq!(ids(RowFilter::Trashed), vec![gone]);
        // Folders sort before notes
        assert_eq!(ids(RowFilter::SyncedOutsideTrash), vec![folder, keep]);
    }

    #[test]
    fn test_trashing_folder_moves_its_notes() {
        let mut store = store();
        let folder = store.create_folder("Old").unwrap();
        let note = store.create_note(folder, "inside").unwrap();

        store.trash_note(folder).unwrap();

        let row = store.get(note).unwrap().unwrap();
        assert_eq!(row.parent_id, ID_TRASH_FOLDER);
        assert_eq!(row.origin_parent_id, folder);
        assert_eq!(store.query(RowFilter::Trashed).unwrap().len(), 2);
    }

    #[test]
    fn test_commit_honours_explicit_ids() {
        let mut store = store();
        let mut record = NoteRecord::from_new();
        record.set_content(&NoteContent {
            meta_note: NoteFields {
                id: Some(500),
                note_type: Some(NoteType::Note),
                ..Default::default()
            },
            meta_data: vec![DataFields {
                id: Some(900),
                ..DataFields::text("restored")
            }],
        });

        assert_eq!(store.commit(&mut record).unwrap(), 500);
        assert!(store.note_exists(500).unwrap());
        assert!(store.data_exists(900).unwrap());
        assert_eq!(record.data()[0].id, Some(900));
    }

    #[test]
    fn test_foreign_data_id_gets_fresh_row() {
        let mut store = store();
        let first = store.create_note(ID_ROOT_FOLDER, "first").unwrap();
        let taken = store.load(first).unwrap().unwrap().data()[0].id.unwrap();

        let mut record = NoteRecord::from_new();
        record.set_content(&NoteContent {
            meta_note: NoteFields {
                note_type: Some(NoteType::Note),
                ..Default::default()
            },
            meta_data: vec![DataFields {
                id: Some(taken),
                ..DataFields::text("second")
            }],
        });
        let second = store.commit(&mut record).unwrap();

        let stolen = record.data()[0].id.unwrap();
        assert_ne!(stolen, taken);
        assert_eq!(
            store.load(first).unwrap().unwrap().content().body(),
            Some("first")
        );
        assert_eq!(
            store.load(second).unwrap().unwrap().content().body(),
            Some("second")
        );
    }

    #[test]
    fn test_edit_updates_data_in_place() {
        let mut store = store();
        let note = store.create_note(ID_ROOT_FOLDER, "v1").unwrap();
        let data_id = store.load(note).unwrap().unwrap().data()[0].id;

        store.edit_note(note, "v2").unwrap();

        let record = store.load(note).unwrap().unwrap();
        assert_eq!(record.data().len(), 1);
        assert_eq!(record.data()[0].id, data_id);
        assert_eq!(record.snippet(), "v2");
    }

    #[test]
    fn test_batch_delete_removes_data_and_skips_system() {
        let mut store = store();
        let a = store.create_note(ID_ROOT_FOLDER, "a").unwrap();
        let b = store.create_note(ID_ROOT_FOLDER, "b").unwrap();
        let data_id = store.load(a).unwrap().unwrap().data()[0].id.unwrap();

        store.batch_delete(&[a, b, ID_ROOT_FOLDER]).unwrap();

        assert!(!store.note_exists(a).unwrap());
        assert!(!store.note_exists(b).unwrap());
        assert!(!store.data_exists(data_id).unwrap());
        assert!(store.note_exists(ID_ROOT_FOLDER).unwrap());
    }

    #[test]
    fn test_set_sync_id() {
        let mut store = store();
        let note = store.create_note(ID_ROOT_FOLDER, "a").unwrap();
        store.set_sync_id(note, 1234).unwrap();
        assert_eq!(store.get(note).unwrap().unwrap().sync_id, 1234);
        assert!(store.set_sync_id(9999, 1).is_err());
    }

    #[test]
    fn test_summary() {
        let mut store = store();
        let folder = store.create_folder("Work").unwrap();
        store.create_note(folder, "a").unwrap();
        let b = store.create_note(folder, "b").unwrap();
        store.trash_note(b).unwrap();

        let summary = store.summary().unwrap();
        assert_eq!(summary.folders, 1);
        assert_eq!(summary.notes, 1);
        assert_eq!(summary.trashed, 1);
        assert_eq!(summary.unsynced, 2);
        assert_eq!(summary.modified, 3);
    }

    #[test]
    fn test_edit_rejects_folder() {
        let mut store = store();
        let folder = store.create_folder("Work").unwrap();
        assert!(store.edit_note(folder, "x").is_err());
        store.rename_folder(folder, "Home").unwrap();
        assert_eq!(store.get(folder).unwrap().unwrap().snippet, "Home");
    }

    #[test]
    fn test_folder_names_are_unique_outside_trash() {
        let mut store = store();
        let work = store.create_folder("Work").unwrap();
        let home = store.create_folder("Home").unwrap();

        assert!(store.create_folder("Work").is_err());
        assert!(store.rename_folder(home, "Work").is_err());
        assert_eq!(store.get(home).unwrap().unwrap().snippet, "Home");

        // Renaming to its own name is fine
        store.rename_folder(work, "Work").unwrap();

        store.trash_note(work).unwrap();
        let again = store.create_folder("Work").unwrap();
        assert_ne!(again, work);
        assert_eq!(store.query(RowFilter::FoldersOutsideTrash).unwrap().len(), 2);
    }
}
