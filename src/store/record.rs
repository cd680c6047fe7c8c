//! Row-level editor for one local note and its data rows

use super::NoteRow;
use crate::node::{DataFields, NoteContent, NoteFields, NoteType, ID_ROOT_FOLDER};

/// A note (or folder) being created or edited
///
/// Changes stay in memory until [`NoteStore::commit`](super::NoteStore::commit).
#[derive(Debug, Clone, PartialEq)]
pub struct NoteRecord {
    pub(crate) id: Option<i64>,
    pub(crate) row: NoteRow,
    pub(crate) data: Vec<DataFields>,
}

impl NoteRecord {
    /// A fresh note under the root folder
    pub fn from_new() -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: None,
            row: NoteRow {
                created_date: now,
                modified_date: now,
                parent_id: ID_ROOT_FOLDER,
                note_type: NoteType::Note,
                widget_type: -1,
                local_modified: false,
                ..NoteRow::default()
            },
            data: Vec::new(),
        }
    }

    pub(crate) fn from_row(row: NoteRow, data: Vec<DataFields>) -> Self {
        Self {
            id: Some(row.id),
            row,
            data,
        }
    }

    /// Row id; `None` until the first commit of a new record
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn row(&self) -> &NoteRow {
        &self.row
    }

    pub fn data(&self) -> &[DataFields] {
        &self.data
    }

    pub fn parent_id(&self) -> i64 {
        self.row.parent_id
    }

    pub fn snippet(&self) -> &str {
        &self.row.snippet
    }

    pub fn gtask_id(&self) -> &str {
        &self.row.gtask_id
    }

    pub fn is_note_type(&self) -> bool {
        self.row.note_type == NoteType::Note
    }

    /// Full local content, ids included
    pub fn content(&self) -> NoteContent {
        let row = &self.row;
        NoteContent {
            meta_note: NoteFields {
                id: self.id,
                parent_id: Some(row.parent_id),
                alert_date: Some(row.alert_date),
                bg_color_id: Some(row.bg_color_id),
                created_date: Some(row.created_date),
                modified_date: Some(row.modified_date),
                has_attachment: Some(row.has_attachment),
                snippet: Some(row.snippet.clone()),
                note_type: Some(row.note_type),
                widget_id: Some(row.widget_id),
                widget_type: Some(row.widget_type),
                version: Some(row.version),
            },
            meta_data: if self.is_note_type() {
                self.data.clone()
            } else {
                Vec::new()
            },
        }
    }

    /// Merge `content` into the record
    ///
    /// Absent fields keep their value. An `_id` is only taken by a record that
    /// has not been stored yet. Data entries are matched by id, then by mime
    /// type; rows missing from `content` are left alone.
    pub fn set_content(&mut self, content: &NoteContent) {
        let note = &content.meta_note;
        let row = &mut self.row;

        if self.id.is_none() {
            self.id = note.id;
        }
        if let Some(v) = note.parent_id {
            row.parent_id = v;
        }
        if let Some(v) = note.alert_date {
            row.alert_date = v;
        }
        if let Some(v) = note.bg_color_id {
            row.bg_color_id = v;
        }
        if let Some(v) = note.created_date {
            row.created_date = v;
        }
        if let Some(v) = note.modified_date {
            row.modified_date = v;
        }
        if let Some(v) = note.has_attachment {
            row.has_attachment = v;
        }
        if let Some(ref v) = note.snippet {
            row.snippet = v.clone();
        }
        if let Some(v) = note.note_type {
            row.note_type = v;
        }
        if let Some(v) = note.widget_id {
            row.widget_id = v;
        }
        if let Some(v) = note.widget_type {
            row.widget_type = v;
        }
        if let Some(v) = note.version {
            row.version = v;
        }

        if !self.is_note_type() {
            return;
        }

        let mut matched = vec![false; self.data.len()];
        for incoming in &content.meta_data {
            let slot = match incoming.id {
                Some(id) => self.data.iter().position(|d| d.id == Some(id)),
                None => self.data.iter().enumerate().position(|(i, d)| {
                    !matched[i] && d.mime_type.is_some() && d.mime_type == incoming.mime_type
                }),
            };

            match slot {
                Some(i) => {
                    matched[i] = true;
                    merge_data(&mut self.data[i], incoming);
                }
                None => {
                    self.data.push(incoming.clone());
                    matched.push(true);
                }
            }
        }

        if let Some(body) = self.data.iter().find(|d| d.is_body()) {
            self.row.snippet = body.content.clone().unwrap_or_default();
        }
    }

    pub fn set_parent_id(&mut self, parent_id: i64) {
        self.row.parent_id = parent_id;
    }

    pub fn set_gtask_id(&mut self, gid: impl Into<String>) {
        self.row.gtask_id = gid.into();
    }

    pub fn reset_local_modified(&mut self) {
        self.row.local_modified = false;
    }

    /// Flag the record the way the editor does after a user change
    pub fn mark_local_modified(&mut self) {
        self.row.local_modified = true;
        self.row.modified_date = chrono::Utc::now().timestamp_millis();
    }

    /// Replace the body text, adding a text row if there is none
    pub fn set_body(&mut self, body: &str) {
        match self.data.iter_mut().find(|d| d.is_body()) {
            Some(data) => data.content = Some(body.to_string()),
            None => self.data.push(DataFields::text(body)),
        }
        self.row.snippet = body.to_string();
    }
}

fn merge_data(target: &mut DataFields, incoming: &DataFields) {
    if incoming.id.is_some() {
        target.id = incoming.id;
    }
    if incoming.mime_type.is_some() {
        target.mime_type = incoming.mime_type.clone();
    }
    if incoming.content.is_some() {
        target.content = incoming.content.clone();
    }
    if incoming.data1.is_some() {
        target.data1 = incoming.data1;
    }
    if incoming.data2.is_some() {
        target.data2 = incoming.data2;
    }
    if incoming.data3.is_some() {
        target.data3 = incoming.data3.clone();
    }
    if incoming.data4.is_some() {
        target.data4 = incoming.data4.clone();
    }
    if incoming.data5.is_some() {
        target.data5 = incoming.data5.clone();
    }
    if incoming.created_date.is_some() {
        target.created_date = incoming.created_date;
    }
    if incoming.modified_date.is_some() {
        target.modified_date = incoming.modified_date;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::keys::MIME_CALL_NOTE;

    fn note_content(id: Option<i64>, data: Vec<DataFields>) -> NoteContent {
        NoteContent {
            meta_note: NoteFields {
                id,
                note_type: Some(NoteType::Note),
                ..Default::default()
            },
            meta_data: data,
        }
    }

    #[test]
    fn test_from_new_defaults() {
        let record = NoteRecord::from_new();
        assert_eq!(record.id(), None);
        assert_eq!(record.parent_id(), ID_ROOT_FOLDER);
        assert!(record.is_note_type());
        assert!(!record.row().local_modified);
        assert_eq!(record.row().widget_type, -1);
    }

    #[test]
    fn test_new_record_takes_explicit_id() {
        let mut record = NoteRecord::from_new();
        record.set_content(&note_content(Some(42), vec![DataFields::text("a")]));
        assert_eq!(record.id(), Some(42));
        assert_eq!(record.snippet(), "a");
    }

    #[test]
    fn test_stored_record_keeps_its_id() {
        let row = NoteRow {
            id: 5,
            ..NoteRow::default()
        };
        let mut record = NoteRecord::from_row(row, vec![]);
        record.set_content(&note_content(Some(42), vec![]));
        assert_eq!(record.id(), Some(5));
    }

    #[test]
    fn test_data_matched_by_id_then_mime() {
        let row = NoteRow {
            id: 5,
            ..NoteRow::default()
        };
        let existing = vec![
            DataFields {
                id: Some(10),
                ..DataFields::text("old")
            },
            DataFields {
                id: Some(11),
                mime_type: Some(MIME_CALL_NOTE.into()),
                content: Some("call".into()),
                ..Default::default()
            },
        ];
        let mut record = NoteRecord::from_row(row, existing);

        record.set_content(&note_content(
            Some(5),
            vec![
                DataFields {
                    id: Some(11),
                    content: Some("call later".into()),
                    ..Default::default()
                },
                DataFields::text("new body"),
            ],
        ));

        assert_eq!(record.data().len(), 2);
        assert_eq!(record.data()[0].id, Some(10));
        assert_eq!(record.data()[0].content.as_deref(), Some("new body"));
        assert_eq!(record.data()[1].content.as_deref(), Some("call later"));
        assert_eq!(record.snippet(), "new body");
    }

    #[test]
    fn test_unmatched_data_is_appended() {
        let mut record = NoteRecord::from_new();
        record.set_content(&note_content(
            None,
            vec![
                DataFields::text("one"),
                DataFields {
                    mime_type: Some("image/png".into()),
                    ..Default::default()
                },
            ],
        ));
        assert_eq!(record.data().len(), 2);
    }

    #[test]
    fn test_folder_content_has_no_data() {
        let mut record = NoteRecord::from_new();
        record.set_content(&NoteContent {
            meta_note: NoteFields {
                snippet: Some("Work".into()),
                note_type: Some(NoteType::Folder),
                ..Default::default()
            },
            meta_data: vec![DataFields::text("ignored")],
        });

        assert!(!record.is_note_type());
        assert_eq!(record.snippet(), "Work");
        assert!(record.content().meta_data.is_empty());
    }

    #[test]
    fn test_content_round_trips_ids() {
        let row = NoteRow {
            id: 9,
            parent_id: 4,
            snippet: "x".into(),
            ..NoteRow::default()
        };
        let record = NoteRecord::from_row(
            row,
            vec![DataFields {
                id: Some(90),
                ..DataFields::text("x")
            }],
        );

        let content = record.content();
        assert_eq!(content.meta_note.id, Some(9));
        assert_eq!(content.meta_note.parent_id, Some(4));
        assert_eq!(content.meta_data[0].id, Some(90));
    }

    #[test]
    fn test_set_body() {
        let mut record = NoteRecord::from_new();
        record.set_body("first");
        record.set_body("second");
        assert_eq!(record.data().len(), 1);
        assert_eq!(record.snippet(), "second");
    }
}
