//! State and steps of one sync run

use super::{send_event, SyncEvent, SyncPhase, SyncReport, SyncStats};
use crate::node::keys::{
    folder_list_name, CALL_NOTE_LIST_NAME, FOLDER_CALL_NOTE, FOLDER_DEFAULT, FOLDER_PREFIX,
    META_LIST_NAME, ROOT_LIST_NAME,
};
use crate::node::{
    ChildId, ListId, MetaData, MetaId, NodeArena, NodeRef, RemoteEntity, SyncAction, Task,
    TaskId, TaskList, ID_CALL_RECORD_FOLDER, ID_ROOT_FOLDER,
};
use crate::remote::{CredentialSource, GTaskClient, Transport};
use crate::store::{NoteRecord, NoteRow, NoteStore, RowFilter};
use crate::{NoteSyncError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub(crate) struct SyncSession<'a, T: Transport, S: NoteStore> {
    client: &'a mut GTaskClient<T>,
    store: &'a mut S,
    cancelled: &'a AtomicBool,
    events: &'a broadcast::Sender<SyncEvent>,

    arena: NodeArena,
    meta_list: Option<ListId>,
    /// Content lists by gid
    lists: HashMap<String, ListId>,
    /// Lists and tasks not yet paired with a local row
    nodes: HashMap<String, NodeRef>,
    /// Shadows by the gid of the task they describe
    metas: HashMap<String, MetaId>,
    /// Gids recorded on local folder rows, never reused by name
    held_gids: HashSet<String>,
    local_deletes: HashSet<i64>,
    gid_to_nid: HashMap<String, i64>,
    nid_to_gid: HashMap<i64, String>,
    stats: SyncStats,
}

fn missing(what: &str) -> NoteSyncError {
    NoteSyncError::action(format!("sync action without {}", what))
}

impl<'a, T: Transport, S: NoteStore> SyncSession<'a, T, S> {
    pub(crate) fn new(
        client: &'a mut GTaskClient<T>,
        store: &'a mut S,
        cancelled: &'a AtomicBool,
        events: &'a broadcast::Sender<SyncEvent>,
    ) -> Self {
        Self {
            client,
            store,
            cancelled,
            events,
            arena: NodeArena::new(),
            meta_list: None,
            lists: HashMap::new(),
            nodes: HashMap::new(),
            metas: HashMap::new(),
            held_gids: HashSet::new(),
            local_deletes: HashSet::new(),
            gid_to_nid: HashMap::new(),
            nid_to_gid: HashMap::new(),
            stats: SyncStats::default(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn emit(&self, event: SyncEvent) {
        send_event(self.events, event);
    }

    pub(crate) async fn run(mut self, creds: &dyn CredentialSource) -> Result<SyncReport> {
        self.client.reset_pending();

        self.emit(SyncEvent::Phase(SyncPhase::Login));
        self.client.login(creds).await?;

        self.emit(SyncEvent::Phase(SyncPhase::Snapshot));
        self.snapshot().await?;

        self.sync_folders().await?;
        self.sync_content().await?;

        let cancelled = self.is_cancelled();
        if cancelled {
            // Rows already committed as pushed must not lose their queued updates
            self.client.commit_update().await?;
            info!(stats = ?self.stats, "Sync cancelled");
        } else {
            info!(stats = ?self.stats, "Sync finished");
        }

        Ok(SyncReport {
            stats: self.stats,
            gid_to_nid: self.gid_to_nid,
            nid_to_gid: self.nid_to_gid,
            cancelled,
        })
    }

    fn map(&mut self, gid: &str, nid: i64) {
        self.gid_to_nid.insert(gid.to_string(), nid);
        self.nid_to_gid.insert(nid, gid.to_string());
    }

    // Phase A: remote snapshot

    async fn snapshot(&mut self) -> Result<()> {
        if self.is_cancelled() {
            return Ok(());
        }

        let raw_lists = self.client.fetch_lists().await?;
        let entities: Vec<RemoteEntity> = raw_lists.iter().filter_map(RemoteEntity::parse).collect();

        // The shadows first, so every task can be given its metadata
        let meta_entity = entities
            .iter()
            .find(|e| e.name.as_deref() == Some(META_LIST_NAME) && e.id.is_some());
        if let Some(entity) = meta_entity {
            let gid = entity.id.clone().unwrap_or_default();
            let list = self.arena.alloc_list(TaskList::from_remote(entity));
            self.meta_list = Some(list);

            for raw in self.client.fetch_items(&gid).await? {
                let Some(item) = RemoteEntity::parse(&raw) else {
                    continue;
                };
                let meta = MetaData::from_remote(&item);
                if !meta.is_worth_saving() {
                    continue;
                }

                let related = meta.related_gid().map(str::to_string);
                let id = self.arena.alloc_meta(meta);
                match related {
                    Some(related) if self.metas.contains_key(&related) => {
                        warn!(related = %related, "Deleting duplicate metadata shadow");
                        self.client.delete_node(&mut self.arena, id).await?;
                    }
                    Some(related) => {
                        self.arena.add_child(list, ChildId::Meta(id));
                        self.metas.insert(related, id);
                    }
                    None => {
                        self.arena.add_child(list, ChildId::Meta(id));
                    }
                }
            }
        }

        if self.meta_list.is_none() {
            let list = self.arena.alloc_list(TaskList::named(META_LIST_NAME));
            self.client.create_list(&mut self.arena, list).await?;
            info!("Created metadata list");
            self.meta_list = Some(list);
        }

        for entity in &entities {
            let Some(ref name) = entity.name else {
                continue;
            };
            if !name.starts_with(FOLDER_PREFIX) || name == META_LIST_NAME {
                continue;
            }
            let Some(gid) = entity.id.clone() else {
                continue;
            };

            let list = self.arena.alloc_list(TaskList::from_remote(entity));
            self.lists.insert(gid.clone(), list);
            self.nodes.insert(gid.clone(), NodeRef::List(list));

            for raw in self.client.fetch_items(&gid).await? {
                let Some(item) = RemoteEntity::parse(&raw) else {
                    continue;
                };
                let mut task = Task::from_remote(&item);
                if !task.is_worth_saving() {
                    continue;
                }
                let Some(task_gid) = task.base.gid.clone() else {
                    continue;
                };

                let meta = self.metas.get(&task_gid).map(|&m| self.arena.meta(m));
                task.set_meta_info(meta);

                let id = self.arena.alloc_task(task);
                self.arena.add_child(list, ChildId::Task(id));
                self.nodes.insert(task_gid, NodeRef::Task(id));
            }
        }

        debug!(
            lists = self.lists.len(),
            nodes = self.nodes.len(),
            metas = self.metas.len(),
            "Remote snapshot loaded"
        );
        Ok(())
    }

    // Phase B: folders

    async fn sync_folders(&mut self) -> Result<()> {
        if self.is_cancelled() {
            return Ok(());
        }
        self.emit(SyncEvent::Phase(SyncPhase::Folders));

        // Lists of trashed folders are deleted with the trash, not re-added
        let trashed: HashSet<String> = self
            .store
            .query(RowFilter::Trashed)?
            .iter()
            .filter_map(|row| row.gid().map(str::to_string))
            .collect();

        let folders = self.store.query(RowFilter::FoldersOutsideTrash)?;
        self.held_gids = folders
            .iter()
            .filter_map(|row| row.gid().map(str::to_string))
            .chain(trashed.iter().cloned())
            .collect();
        for id in [ID_ROOT_FOLDER, ID_CALL_RECORD_FOLDER] {
            if let Some(gid) = self.store.get(id)?.as_ref().and_then(|row| row.gid()) {
                self.held_gids.insert(gid.to_string());
            }
        }

        for (id, reserved) in [
            (ID_ROOT_FOLDER, ROOT_LIST_NAME),
            (ID_CALL_RECORD_FOLDER, CALL_NOTE_LIST_NAME),
        ] {
            if self.is_cancelled() {
                return Ok(());
            }
            let Some(row) = self.store.get(id)? else {
                warn!(id, "System folder is missing");
                continue;
            };

            match row.gid().and_then(|gid| self.nodes.remove(gid)) {
                Some(node) => {
                    let gid = row.gtask_id.trim().to_string();
                    self.map(&gid, id);
                    if self.arena.base(node).name != reserved {
                        self.do_sync(SyncAction::UpdateRemote, Some(node), Some(&row))
                            .await?;
                    }
                }
                None => {
                    self.do_sync(SyncAction::AddRemote, None, Some(&row)).await?;
                }
            }
        }

        for row in folders {
            if self.is_cancelled() {
                return Ok(());
            }
            self.sync_row(&row).await?;
        }

        let mut leftovers: Vec<(ListId, String)> = self
            .lists
            .iter()
            .filter(|(gid, _)| self.nodes.contains_key(*gid))
            .map(|(gid, &list)| (list, gid.clone()))
            .collect();
        leftovers.sort();

        for (list, gid) in leftovers {
            if self.is_cancelled() {
                return Ok(());
            }
            if trashed.contains(&gid) {
                debug!(gid = %gid, "Skipping list of a trashed folder");
                continue;
            }
            self.nodes.remove(&gid);
            self.do_sync(SyncAction::AddLocal, Some(NodeRef::List(list)), None)
                .await?;
        }

        if !self.is_cancelled() {
            self.client.commit_update().await?;
        }
        Ok(())
    }

    // Phase C: notes

    async fn sync_content(&mut self) -> Result<()> {
        if self.is_cancelled() {
            return Ok(());
        }
        self.emit(SyncEvent::Phase(SyncPhase::Content));
        self.local_deletes.clear();

        for row in self.store.query(RowFilter::Trashed)? {
            if self.is_cancelled() {
                return Ok(());
            }
            if let Some(node) = row.gid().and_then(|gid| self.nodes.remove(gid)) {
                self.gid_to_nid.remove(row.gtask_id.trim());
                self.nid_to_gid.remove(&row.id);
                self.do_sync(SyncAction::DelRemote, Some(node), Some(&row))
                    .await?;
            }
            self.local_deletes.insert(row.id);
        }

        for row in self.store.query(RowFilter::NotesOutsideTrash)? {
            if self.is_cancelled() {
                return Ok(());
            }
            self.sync_row(&row).await?;
        }

        let mut leftovers: Vec<TaskId> = self
            .nodes
            .values()
            .filter_map(|node| match node {
                NodeRef::Task(id) => Some(*id),
                NodeRef::List(_) => None,
            })
            .collect();
        leftovers.sort();

        for task in leftovers {
            if self.is_cancelled() {
                return Ok(());
            }
            let parent_deleted = self
                .arena
                .task(task)
                .parent()
                .is_some_and(|list| self.arena.list(list).base.deleted);
            if parent_deleted {
                continue;
            }
            if let Some(gid) = self.arena.gid(task).map(str::to_string) {
                self.nodes.remove(&gid);
            }
            self.do_sync(SyncAction::AddLocal, Some(NodeRef::Task(task)), None)
                .await?;
        }

        if self.is_cancelled() {
            return Ok(());
        }
        let mut deletes: Vec<i64> = self.local_deletes.iter().copied().collect();
        deletes.sort_unstable();
        self.store.batch_delete(&deletes)?;

        if self.is_cancelled() {
            return Ok(());
        }
        self.client.commit_update().await?;
        self.refresh_sync_ids().await
    }

    /// Pair a folder or note row with its remote node and act on the result
    async fn sync_row(&mut self, row: &NoteRow) -> Result<()> {
        let node = row.gid().and_then(|gid| self.nodes.remove(gid));

        let action = match node {
            Some(node) => {
                let gid = row.gtask_id.trim().to_string();
                self.map(&gid, row.id);
                match node {
                    NodeRef::List(id) => self.arena.list(id).classify(row),
                    NodeRef::Task(id) => self.arena.task(id).classify(row),
                }
            }
            None if row.gid().is_none() => SyncAction::AddRemote,
            None => SyncAction::DelLocal,
        };

        self.do_sync(action, node, Some(row)).await
    }

    async fn refresh_sync_ids(&mut self) -> Result<()> {
        if self.is_cancelled() {
            return Ok(());
        }
        self.emit(SyncEvent::Phase(SyncPhase::Refresh));

        self.arena = NodeArena::new();
        self.meta_list = None;
        self.lists.clear();
        self.nodes.clear();
        self.metas.clear();
        self.snapshot().await?;

        for row in self.store.query(RowFilter::SyncedOutsideTrash)? {
            if self.is_cancelled() {
                return Ok(());
            }
            match row.gid().and_then(|gid| self.nodes.remove(gid)) {
                Some(node) => {
                    let last_modified = self.arena.base(node).last_modified;
                    self.store.set_sync_id(row.id, last_modified)?;
                }
                None => {
                    warn!(id = row.id, "Local item has no remote counterpart after sync");
                    return Err(NoteSyncError::action(
                        "some local items don't have gid after sync",
                    ));
                }
            }
        }
        Ok(())
    }

    // Action execution

    async fn do_sync(
        &mut self,
        action: SyncAction,
        node: Option<NodeRef>,
        row: Option<&NoteRow>,
    ) -> Result<()> {
        if self.is_cancelled() {
            return Ok(());
        }

        self.stats.record(action);
        if action != SyncAction::None {
            let name = match (node, row) {
                (Some(node), _) => self.arena.base(node).name.clone(),
                (None, Some(row)) => row.snippet.clone(),
                (None, None) => String::new(),
            };
            debug!(action = %action, name = %name, "Executing sync action");
            self.emit(SyncEvent::Applied { action, name });
        }

        match action {
            SyncAction::None => Ok(()),
            SyncAction::AddLocal => self.add_local(node.ok_or_else(|| missing("node"))?).await,
            SyncAction::AddRemote => self.add_remote(row.ok_or_else(|| missing("row"))?).await,
            SyncAction::DelLocal => {
                let row = row.ok_or_else(|| missing("row"))?;
                self.delete_meta(row.gid()).await?;
                self.local_deletes.insert(row.id);
                Ok(())
            }
            SyncAction::DelRemote => {
                let node = node.ok_or_else(|| missing("node"))?;
                let gid = self.arena.gid(node).map(str::to_string);
                self.delete_meta(gid.as_deref()).await?;
                self.client.delete_node(&mut self.arena, node).await
            }
            SyncAction::UpdateLocal => {
                self.update_local(row.ok_or_else(|| missing("row"))?, node.ok_or_else(|| missing("node"))?)
                    .await
            }
            SyncAction::UpdateRemote | SyncAction::UpdateConflict => {
                // Conflicts keep the local copy
                self.update_remote(row.ok_or_else(|| missing("row"))?, node.ok_or_else(|| missing("node"))?)
                    .await
            }
            SyncAction::Error => Err(NoteSyncError::action("unknown sync action type")),
        }
    }

    async fn delete_meta(&mut self, gid: Option<&str>) -> Result<()> {
        if let Some(meta) = gid.and_then(|gid| self.metas.get(gid).copied()) {
            self.client.delete_node(&mut self.arena, meta).await?;
        }
        Ok(())
    }

    fn load(&self, id: i64) -> Result<NoteRecord> {
        self.store
            .load(id)?
            .ok_or_else(|| NoteSyncError::Storage(format!("note {} disappeared during sync", id)))
    }

    /// Local id of the folder a task's list maps to
    fn parent_nid(&self, task: TaskId) -> Option<i64> {
        let list = self.arena.task(task).parent()?;
        let gid = self.arena.gid(list)?;
        self.gid_to_nid.get(gid).copied()
    }

    async fn add_local(&mut self, node: NodeRef) -> Result<()> {
        let mut record = match node {
            NodeRef::List(list) => {
                let name = self.arena.list(list).base.name.clone();
                if name == ROOT_LIST_NAME {
                    self.load(ID_ROOT_FOLDER)?
                } else if name == CALL_NOTE_LIST_NAME {
                    self.load(ID_CALL_RECORD_FOLDER)?
                } else {
                    let mut record = NoteRecord::from_new();
                    record.set_content(&self.arena.list(list).to_local_content());
                    record.set_parent_id(ID_ROOT_FOLDER);
                    record
                }
            }
            NodeRef::Task(task) => {
                let mut content = self.arena.task(task).to_local_content()?;

                // Ids recorded by the shadow may have been reused locally since
                if let Some(id) = content.meta_note.id {
                    if self.store.note_exists(id)? {
                        content.meta_note.id = None;
                    }
                }
                for data in content.meta_data.iter_mut() {
                    if let Some(id) = data.id {
                        if self.store.data_exists(id)? {
                            data.id = None;
                        }
                    }
                }

                let parent = self
                    .parent_nid(task)
                    .ok_or_else(|| NoteSyncError::action("cannot add local node"))?;

                let mut record = NoteRecord::from_new();
                record.set_content(&content);
                record.set_parent_id(parent);
                record
            }
        };

        let gid = self
            .arena
            .gid(node)
            .ok_or_else(|| missing("remote gid"))?
            .to_string();
        record.set_gtask_id(gid.clone());
        record.reset_local_modified();
        let nid = self.store.commit(&mut record)?;
        self.map(&gid, nid);

        self.update_remote_meta(&gid, &record).await
    }

    async fn add_remote(&mut self, row: &NoteRow) -> Result<()> {
        let mut record = self.load(row.id)?;

        let node = if record.is_note_type() {
            let mut task = Task::default();
            task.set_content_from_local(&record.content());

            let list = self
                .nid_to_gid
                .get(&record.parent_id())
                .and_then(|gid| self.lists.get(gid))
                .copied()
                .ok_or_else(|| NoteSyncError::action("cannot add remote task"))?;

            let id = self.arena.alloc_task(task);
            self.arena.add_child(list, ChildId::Task(id));
            self.client.create_task(&mut self.arena, id).await?;

            let gid = self.arena.gid(id).ok_or_else(|| missing("created gid"))?.to_string();
            self.update_remote_meta(&gid, &record).await?;
            NodeRef::Task(id)
        } else {
            let title = match record.id() {
                Some(ID_ROOT_FOLDER) => FOLDER_DEFAULT.to_string(),
                Some(ID_CALL_RECORD_FOLDER) => FOLDER_CALL_NOTE.to_string(),
                _ => record.snippet().to_string(),
            };
            let name = folder_list_name(&title);

            // Only a list no local row has claimed can be adopted by name
            let mut candidates: Vec<(ListId, String)> = self
                .lists
                .iter()
                .filter(|(gid, _)| {
                    self.nodes.contains_key(*gid) && !self.held_gids.contains(*gid)
                })
                .map(|(gid, &list)| (list, gid.clone()))
                .collect();
            candidates.sort();
            let existing = candidates
                .into_iter()
                .find(|(list, _)| self.arena.list(*list).base.name == name);

            match existing {
                Some((list, gid)) => {
                    debug!(name = %name, gid = %gid, "Reusing remote list with the same name");
                    self.nodes.remove(&gid);
                    NodeRef::List(list)
                }
                None => {
                    let mut list = TaskList::default();
                    list.set_content_from_local(&record.content());
                    let list = self.arena.alloc_list(list);
                    self.client.create_list(&mut self.arena, list).await?;

                    let gid = self.arena.gid(list).ok_or_else(|| missing("created gid"))?;
                    self.lists.insert(gid.to_string(), list);
                    NodeRef::List(list)
                }
            }
        };

        let gid = self
            .arena
            .gid(node)
            .ok_or_else(|| missing("remote gid"))?
            .to_string();
        record.set_gtask_id(gid.clone());
        record.reset_local_modified();
        self.store.commit(&mut record)?;
        self.map(&gid, row.id);
        Ok(())
    }

    async fn update_local(&mut self, row: &NoteRow, node: NodeRef) -> Result<()> {
        let mut record = self.load(row.id)?;

        let (content, parent) = match node {
            NodeRef::List(list) => (self.arena.list(list).to_local_content(), ID_ROOT_FOLDER),
            NodeRef::Task(task) => {
                let content = self.arena.task(task).to_local_content()?;
                let parent = self.parent_nid(task).ok_or_else(|| {
                    NoteSyncError::action("cannot find task's parent id locally")
                })?;
                (content, parent)
            }
        };

        record.set_content(&content);
        record.set_parent_id(parent);
        record.reset_local_modified();
        self.store.commit(&mut record)?;

        let gid = self
            .arena
            .gid(node)
            .ok_or_else(|| missing("remote gid"))?
            .to_string();
        self.update_remote_meta(&gid, &record).await
    }

    async fn update_remote(&mut self, row: &NoteRow, node: NodeRef) -> Result<()> {
        let mut record = self.load(row.id)?;
        let content = record.content();

        match node {
            NodeRef::List(list) => self.arena.list_mut(list).set_content_from_local(&content),
            NodeRef::Task(task) => self.arena.task_mut(task).set_content_from_local(&content),
        }
        self.client.add_update(&self.arena, node).await?;

        let gid = self
            .arena
            .gid(node)
            .ok_or_else(|| missing("remote gid"))?
            .to_string();
        self.update_remote_meta(&gid, &record).await?;

        if let (true, NodeRef::Task(task)) = (record.is_note_type(), node) {
            let previous = self
                .arena
                .task(task)
                .parent()
                .ok_or_else(|| NoteSyncError::action("task has no parent list"))?;
            let current = self
                .nid_to_gid
                .get(&record.parent_id())
                .and_then(|gid| self.lists.get(gid))
                .copied()
                .ok_or_else(|| NoteSyncError::action("cannot find task's parent tasklist"))?;

            if previous != current {
                debug!(gid = %gid, "Moving task to another list");
                self.arena.remove_child(previous, ChildId::Task(task));
                self.arena.add_child(current, ChildId::Task(task));
                self.client
                    .move_task(&self.arena, task, previous, current)
                    .await?;
            }
        }

        record.reset_local_modified();
        self.store.commit(&mut record)?;
        Ok(())
    }

    /// Record a note's full local content in its shadow
    async fn update_remote_meta(&mut self, gid: &str, record: &NoteRecord) -> Result<()> {
        if !record.is_note_type() {
            return Ok(());
        }
        let content = record.content();

        match self.metas.get(gid).copied() {
            Some(meta) => {
                self.arena.meta_mut(meta).set_meta(gid, &content)?;
                self.client.add_update(&self.arena, meta).await
            }
            None => {
                let meta_list = self
                    .meta_list
                    .ok_or_else(|| NoteSyncError::action("metadata list is missing"))?;

                let mut meta = MetaData::new();
                meta.set_meta(gid, &content)?;
                let meta = self.arena.alloc_meta(meta);
                self.arena.add_child(meta_list, ChildId::Meta(meta));
                self.metas.insert(gid.to_string(), meta);
                self.client.create_meta(&mut self.arena, meta).await
            }
        }
    }
}
