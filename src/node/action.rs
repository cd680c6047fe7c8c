//! Remote mutation actions
//!
//! Every request to the task service carries a list of these. The tag field
//! is `action_type`; the remaining fields depend on the variant.

use serde::{Deserialize, Serialize};

/// Remote entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    /// A task list
    Group,
    Task,
}

/// The changed fields of an entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

/// One entry of an `action_list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum Action {
    Create {
        action_id: i64,
        index: i64,
        entity_delta: EntityDelta,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dest_parent_type: Option<EntityType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        list_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prior_sibling_id: Option<String>,
    },
    Update {
        action_id: i64,
        id: String,
        entity_delta: EntityDelta,
    },
    Move {
        action_id: i64,
        id: String,
        source_list: String,
        dest_parent: String,
        /// Only present when the task changes list
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dest_list: Option<String>,
        /// Only present for a move inside one list, not to the head
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prior_sibling_id: Option<String>,
    },
    GetAll {
        action_id: i64,
        list_id: String,
        get_deleted: bool,
    },
}

impl Action {
    pub fn action_id(&self) -> i64 {
        match self {
            Action::Create { action_id, .. }
            | Action::Update { action_id, .. }
            | Action::Move { action_id, .. }
            | Action::GetAll { action_id, .. } => *action_id,
        }
    }

    /// True for actions that change remote state
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Action::GetAll { .. })
    }
}
