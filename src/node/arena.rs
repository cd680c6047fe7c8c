//! Typed slab storage for the nodes of one sync run
//!
//! Parents and siblings are handles into the arena rather than pointers, so a
//! task can name its list and its prior sibling without owning either.

use super::action::Action;
use super::meta::MetaData;
use super::task::Task;
use super::task_list::TaskList;
use super::NodeBase;
use crate::{NoteSyncError, Result};

/// Handle of a [`TaskList`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListId(usize);

/// Handle of a [`Task`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(usize);

/// Handle of a [`MetaData`] shadow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetaId(usize);

/// Anything a list can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChildId {
    Task(TaskId),
    Meta(MetaId),
}

/// A content node: something with a local counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRef {
    List(ListId),
    Task(TaskId),
}

/// Any remote entity, for building wire actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    List(ListId),
    Task(TaskId),
    Meta(MetaId),
}

impl From<NodeRef> for EntityRef {
    fn from(node: NodeRef) -> Self {
        match node {
            NodeRef::List(id) => EntityRef::List(id),
            NodeRef::Task(id) => EntityRef::Task(id),
        }
    }
}

impl From<ChildId> for EntityRef {
    fn from(child: ChildId) -> Self {
        match child {
            ChildId::Task(id) => EntityRef::Task(id),
            ChildId::Meta(id) => EntityRef::Meta(id),
        }
    }
}

impl From<ListId> for EntityRef {
    fn from(id: ListId) -> Self {
        EntityRef::List(id)
    }
}

impl From<TaskId> for EntityRef {
    fn from(id: TaskId) -> Self {
        EntityRef::Task(id)
    }
}

impl From<MetaId> for EntityRef {
    fn from(id: MetaId) -> Self {
        EntityRef::Meta(id)
    }
}

/// All nodes of one run
#[derive(Debug, Default)]
pub struct NodeArena {
    lists: Vec<TaskList>,
    tasks: Vec<Task>,
    metas: Vec<MetaData>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_list(&mut self, list: TaskList) -> ListId {
        self.lists.push(list);
        ListId(self.lists.len() - 1)
    }

    pub fn alloc_task(&mut self, task: Task) -> TaskId {
        self.tasks.push(task);
        TaskId(self.tasks.len() - 1)
    }

    pub fn alloc_meta(&mut self, meta: MetaData) -> MetaId {
        self.metas.push(meta);
        MetaId(self.metas.len() - 1)
    }

    // Handles are only minted by the alloc_* methods of this arena, so indexing
    // cannot go out of bounds.

    pub fn list(&self, id: ListId) -> &TaskList {
        &self.lists[id.0]
    }

    pub fn list_mut(&mut self, id: ListId) -> &mut TaskList {
        &mut self.lists[id.0]
    }

    pub fn task(&self, id: TaskId) -> &Task {
        &self.tasks[id.0]
    }

    pub fn task_mut(&mut self, id: TaskId) -> &mut Task {
        &mut self.tasks[id.0]
    }

    pub fn meta(&self, id: MetaId) -> &MetaData {
        &self.metas[id.0]
    }

    pub fn meta_mut(&mut self, id: MetaId) -> &mut MetaData {
        &mut self.metas[id.0]
    }

    /// The task behind a child handle (a shadow's inner task for metadata)
    pub fn child(&self, child: ChildId) -> &Task {
        match child {
            ChildId::Task(id) => self.task(id),
            ChildId::Meta(id) => &self.meta(id).task,
        }
    }

    fn child_mut(&mut self, child: ChildId) -> &mut Task {
        match child {
            ChildId::Task(id) => self.task_mut(id),
            ChildId::Meta(id) => &mut self.meta_mut(id).task,
        }
    }

    pub fn base(&self, entity: impl Into<EntityRef>) -> &NodeBase {
        match entity.into() {
            EntityRef::List(id) => &self.list(id).base,
            EntityRef::Task(id) => &self.task(id).base,
            EntityRef::Meta(id) => &self.meta(id).task.base,
        }
    }

    pub fn base_mut(&mut self, entity: impl Into<EntityRef>) -> &mut NodeBase {
        match entity.into() {
            EntityRef::List(id) => &mut self.list_mut(id).base,
            EntityRef::Task(id) => &mut self.task_mut(id).base,
            EntityRef::Meta(id) => &mut self.meta_mut(id).task.base,
        }
    }

    pub fn gid(&self, entity: impl Into<EntityRef>) -> Option<&str> {
        self.base(entity).gid()
    }

    // Child management. After every call, each child's prior sibling is the
    // child before it in the list and its parent is the list.

    /// Append `child`; false if it is already in the list
    pub fn add_child(&mut self, list: ListId, child: ChildId) -> bool {
        if self.list(list).children.contains(&child) {
            return false;
        }

        let prior = self.list(list).children.last().copied();
        self.list_mut(list).children.push(child);

        let task = self.child_mut(child);
        task.prior_sibling = prior;
        task.parent = Some(list);
        true
    }

    /// Insert `child` at `index` (`0..=len`)
    pub fn insert_child(&mut self, list: ListId, child: ChildId, index: usize) -> bool {
        let len = self.list(list).children.len();
        if index > len {
            tracing::error!(index, len, "Insert child: invalid index");
            return false;
        }
        if self.list(list).children.contains(&child) {
            return false;
        }

        self.list_mut(list).children.insert(index, child);

        let prior = index
            .checked_sub(1)
            .map(|i| self.list(list).children[i]);
        let next = self.list(list).children.get(index + 1).copied();

        let task = self.child_mut(child);
        task.prior_sibling = prior;
        task.parent = Some(list);

        if let Some(next) = next {
            self.child_mut(next).prior_sibling = Some(child);
        }
        true
    }

    /// Remove `child`; false if it is not in the list
    pub fn remove_child(&mut self, list: ListId, child: ChildId) -> bool {
        let Some(index) = self.child_index(list, child) else {
            return false;
        };

        self.list_mut(list).children.remove(index);

        let task = self.child_mut(child);
        task.prior_sibling = None;
        task.parent = None;

        let children = &self.list(list).children;
        if let Some(&moved_up) = children.get(index) {
            let prior = index.checked_sub(1).map(|i| children[i]);
            self.child_mut(moved_up).prior_sibling = prior;
        }
        true
    }

    /// Move a child already in the list to `index` (`0..len`)
    pub fn move_child(&mut self, list: ListId, child: ChildId, index: usize) -> bool {
        let len = self.list(list).children.len();
        if index >= len {
            tracing::error!(index, len, "Move child: invalid index");
            return false;
        }

        let Some(pos) = self.child_index(list, child) else {
            tracing::error!("Move child: the child is not in the list");
            return false;
        };

        if pos == index {
            return true;
        }
        self.remove_child(list, child) && self.insert_child(list, child, index)
    }

    pub fn find_child_by_gid(&self, list: ListId, gid: &str) -> Option<ChildId> {
        self.list(list)
            .children
            .iter()
            .copied()
            .find(|&c| self.child(c).base.gid() == Some(gid))
    }

    pub fn child_index(&self, list: ListId, child: ChildId) -> Option<usize> {
        self.list(list).children.iter().position(|&c| c == child)
    }

    pub fn child_at(&self, list: ListId, index: usize) -> Option<ChildId> {
        self.list(list).children.get(index).copied()
    }

    pub fn child_count(&self, list: ListId) -> usize {
        self.list(list).children.len()
    }

    // Wire actions

    pub fn create_action(&self, entity: impl Into<EntityRef>, action_id: i64) -> Result<Action> {
        match entity.into() {
            EntityRef::List(id) => Ok(self.list(id).create_action(action_id)),
            EntityRef::Task(id) => self.child_create_action(ChildId::Task(id), action_id),
            EntityRef::Meta(id) => self.child_create_action(ChildId::Meta(id), action_id),
        }
    }

    fn child_create_action(&self, child: ChildId, action_id: i64) -> Result<Action> {
        let task = self.child(child);
        let parent = task
            .parent
            .ok_or_else(|| NoteSyncError::action("cannot create a task without a parent list"))?;
        let index = self.child_index(parent, child).ok_or_else(|| {
            NoteSyncError::action("task is not among its parent's children")
        })?;
        let prior_gid = task.prior_sibling.and_then(|p| self.child(p).base.gid());

        task.create_action(action_id, self.list(parent), index, prior_gid)
    }

    pub fn update_action(&self, entity: impl Into<EntityRef>, action_id: i64) -> Result<Action> {
        match entity.into() {
            EntityRef::List(id) => self.list(id).update_action(action_id),
            EntityRef::Task(id) => self.task(id).update_action(action_id),
            EntityRef::Meta(id) => self.meta(id).task.update_action(action_id),
        }
    }
}
