//! Names shared by both replicas
//!
//! Local folders appear remotely as task lists whose name starts with
//! [`FOLDER_PREFIX`]. Two suffixes are reserved for the system folders and a
//! third for the list holding the metadata shadows.

/// Prefix marking a remote list as one of ours
pub const FOLDER_PREFIX: &str = "[MIUI_Notes]";

pub const FOLDER_DEFAULT: &str = "Default";
pub const FOLDER_CALL_NOTE: &str = "Call_Note";
pub const FOLDER_META: &str = "METADATA";

/// Remote list mirroring the local root folder
pub const ROOT_LIST_NAME: &str = "[MIUI_Notes]Default";

/// Remote list mirroring the local call-record folder
pub const CALL_NOTE_LIST_NAME: &str = "[MIUI_Notes]Call_Note";

/// Remote list holding one metadata shadow per synced note
pub const META_LIST_NAME: &str = "[MIUI_Notes]METADATA";

/// Name every metadata shadow carries
pub const META_NOTE_NAME: &str = "[META INFO] DON'T UPDATE AND DELETE";

/// Key under which a shadow records the gid of the note it describes
pub const META_HEAD_GTASK_ID: &str = "meta_gid";
pub const META_HEAD_NOTE: &str = "meta_note";
pub const META_HEAD_DATA: &str = "meta_data";

pub const MIME_TEXT_NOTE: &str = "vnd.android.cursor.item/text_note";
pub const MIME_CALL_NOTE: &str = "vnd.android.cursor.item/call_note";

/// Creator id sent with every create action
pub const CREATOR_ID_NULL: &str = "null";

/// Strip [`FOLDER_PREFIX`] from a remote list name
pub fn strip_folder_prefix(name: &str) -> &str {
    name.strip_prefix(FOLDER_PREFIX).unwrap_or(name)
}

/// Remote list name for a local folder title
pub fn folder_list_name(title: &str) -> String {
    format!("{}{}", FOLDER_PREFIX, title)
}
