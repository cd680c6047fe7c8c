//! In-memory stand-in for the remote task service

#![allow(dead_code)]

use async_trait::async_trait;
use notesync::remote::{HttpReply, Transport};
use notesync::{NoteSyncError, Result};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const BASE_URL: &str = "https://tasks.test";
pub const ACCOUNT: &str = "tester@gmail.com";

#[derive(Debug, Clone, PartialEq)]
pub struct FakeList {
    pub id: String,
    pub name: String,
    pub last_modified: i64,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FakeTask {
    pub id: String,
    pub list_id: String,
    pub name: String,
    pub notes: Option<String>,
    pub last_modified: i64,
    pub deleted: bool,
}

#[derive(Default)]
struct State {
    clock: i64,
    next_id: u64,
    lists: Vec<FakeList>,
    tasks: Vec<FakeTask>,
    mutations: usize,
    action_types: Vec<String>,
    cancel_after: Option<(usize, Arc<AtomicBool>)>,
}

impl State {
    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn new_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }

    fn count_mutation(&mut self) {
        self.mutations += 1;
        if let Some((limit, ref flag)) = self.cancel_after {
            if self.mutations >= limit {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }

    fn landing_page(&self) -> String {
        let lists: Vec<Value> = self
            .lists
            .iter()
            .filter(|l| !l.deleted)
            .map(|l| json!({"id": l.id, "name": l.name, "last_modified": l.last_modified}))
            .collect();
        let setup = json!({"v": 42, "t": {"lists": lists}});
        format!(
            "<html><head><script>_setup({})}}</script></head></html>",
            setup
        )
    }

    fn apply(&mut self, action: &Value) -> Value {
        let action_id = action["action_id"].clone();
        let action_type = action["action_type"].as_str().unwrap_or_default().to_string();
        self.action_types.push(action_type.clone());

        match action_type.as_str() {
            "create" => {
                self.count_mutation();
                let delta = &action["entity_delta"];
                let name = delta["name"].as_str().unwrap_or_default().to_string();
                let now = self.tick();

                if delta["entity_type"] == "GROUP" {
                    let id = self.new_id("list-");
                    self.lists.push(FakeList {
                        id: id.clone(),
                        name,
                        last_modified: now,
                        deleted: false,
                    });
                    json!({"action_id": action_id, "new_id": id})
                } else {
                    let id = self.new_id("task-");
                    let list_id = action["list_id"]
                        .as_str()
                        .or_else(|| action["parent_id"].as_str())
                        .unwrap_or_default()
                        .to_string();
                    self.tasks.push(FakeTask {
                        id: id.clone(),
                        list_id,
                        name,
                        notes: delta["notes"].as_str().map(str::to_string),
                        last_modified: now,
                        deleted: false,
                    });
                    json!({"action_id": action_id, "new_id": id})
                }
            }
            "update" => {
                self.count_mutation();
                let id = action["id"].as_str().unwrap_or_default().to_string();
                let delta = action["entity_delta"].clone();
                let now = self.tick();

                if let Some(list) = self.lists.iter_mut().find(|l| l.id == id) {
                    if let Some(name) = delta["name"].as_str() {
                        list.name = name.to_string();
                    }
                    if let Some(deleted) = delta["deleted"].as_bool() {
                        list.deleted = deleted;
                    }
                    list.last_modified = now;
                } else if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
                    if let Some(name) = delta["name"].as_str() {
                        task.name = name.to_string();
                    }
                    if let Some(notes) = delta["notes"].as_str() {
                        task.notes = Some(notes.to_string());
                    }
                    if let Some(deleted) = delta["deleted"].as_bool() {
                        task.deleted = deleted;
                    }
                    task.last_modified = now;
                }
                json!({"action_id": action_id})
            }
            "move" => {
                self.count_mutation();
                let id = action["id"].as_str().unwrap_or_default().to_string();
                let dest = action["dest_list"].as_str().map(str::to_string);
                let now = self.tick();

                if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
                    if let Some(dest) = dest {
                        task.list_id = dest;
                    }
                    task.last_modified = now;
                }
                json!({"action_id": action_id})
            }
            _ => json!({"action_id": action_id}),
        }
    }

    fn items(&self, list_id: &str) -> Vec<Value> {
        self.tasks
            .iter()
            .filter(|t| t.list_id == list_id && !t.deleted)
            .map(|t| {
                json!({
                    "id": t.id,
                    "name": t.name,
                    "notes": t.notes,
                    "last_modified": t.last_modified,
                    "deleted": false
                })
            })
            .collect()
    }
}

/// Shared handle; clones see the same state
#[derive(Clone, Default)]
pub struct FakeTaskService {
    state: Arc<Mutex<State>>,
    failing: Arc<AtomicBool>,
    gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl FakeTaskService {
    pub fn new() -> Self {
        let service = Self::default();
        service.state.lock().unwrap().clock = 1000;
        service
    }

    /// Every request fails with a network error while set
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Raise `flag` once `limit` mutations have been applied
    pub fn cancel_after(&self, limit: usize, flag: Arc<AtomicBool>) {
        self.state.lock().unwrap().cancel_after = Some((limit, flag));
    }

    pub fn clear_cancel(&self) {
        self.state.lock().unwrap().cancel_after = None;
    }

    /// Hold the next GET until `gate` is notified
    pub fn hold_next_get(&self, gate: Arc<Notify>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    pub fn mutations(&self) -> usize {
        self.state.lock().unwrap().mutations
    }

    pub fn reset_counters(&self) {
        let mut state = self.state.lock().unwrap();
        state.mutations = 0;
        state.action_types.clear();
    }

    pub fn action_count(&self, action_type: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .action_types
            .iter()
            .filter(|t| t.as_str() == action_type)
            .count()
    }

    pub fn lists(&self) -> Vec<FakeList> {
        let state = self.state.lock().unwrap();
        state.lists.iter().filter(|l| !l.deleted).cloned().collect()
    }

    pub fn list_by_name(&self, name: &str) -> Option<FakeList> {
        self.lists().into_iter().find(|l| l.name == name)
    }

    /// Live tasks of the live list called `list_name`
    pub fn tasks_in(&self, list_name: &str) -> Vec<FakeTask> {
        let Some(list) = self.list_by_name(list_name) else {
            return Vec::new();
        };
        let state = self.state.lock().unwrap();
        state
            .tasks
            .iter()
            .filter(|t| t.list_id == list.id && !t.deleted)
            .cloned()
            .collect()
    }

    pub fn task_by_name(&self, name: &str) -> Option<FakeTask> {
        let state = self.state.lock().unwrap();
        state
            .tasks
            .iter()
            .find(|t| t.name == name && !t.deleted)
            .cloned()
    }

    /// Edit a task the way another client would
    pub fn rename_task(&self, id: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        let now = state.tick();
        if let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) {
            task.name = name.to_string();
            task.last_modified = now;
        }
    }

    pub fn delete_task(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        let now = state.tick();
        if let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) {
            task.deleted = true;
            task.last_modified = now;
        }
    }

    pub fn add_list(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.new_id("list-");
        let now = state.tick();
        state.lists.push(FakeList {
            id: id.clone(),
            name: name.to_string(),
            last_modified: now,
            deleted: false,
        });
        id
    }

    pub fn add_task(&self, list_id: &str, name: &str, notes: Option<&str>) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.new_id("task-");
        let now = state.tick();
        state.tasks.push(FakeTask {
            id: id.clone(),
            list_id: list_id.to_string(),
            name: name.to_string(),
            notes: notes.map(str::to_string),
            last_modified: now,
            deleted: false,
        });
        id
    }

    fn check_network(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NoteSyncError::Network("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for FakeTaskService {
    async fn get(&self, _url: &str, _query: &[(&str, &str)]) -> Result<HttpReply> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check_network()?;

        let body = self.state.lock().unwrap().landing_page();
        Ok(HttpReply {
            status: 200,
            body,
            cookies: vec!["GTL".to_string()],
        })
    }

    async fn post_form(
        &self,
        _url: &str,
        form: &[(&str, &str)],
        _headers: &[(&str, &str)],
    ) -> Result<HttpReply> {
        self.check_network()?;

        let raw = form
            .iter()
            .find(|(key, _)| *key == "r")
            .map(|(_, value)| *value)
            .unwrap_or_default();
        let request: Value = serde_json::from_str(raw)?;
        let actions = request["action_list"].as_array().cloned().unwrap_or_default();

        let mut state = self.state.lock().unwrap();
        let mut results = Vec::new();
        let mut response = json!({});
        for action in &actions {
            if action["action_type"] == "get_all" {
                let list_id = action["list_id"].as_str().unwrap_or_default();
                response["tasks"] = Value::Array(state.items(list_id));
            } else {
                results.push(state.apply(action));
            }
        }
        response["results"] = Value::Array(results);

        Ok(HttpReply::ok(response.to_string()))
    }
}
