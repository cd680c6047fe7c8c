//! Task service protocol client
//!
//! Holds the session (login state, client version, next action id) and the
//! queue of pending update actions. Updates are batched; every other call
//! flushes the queue first so the server sees actions in the order they
//! were issued.

use super::credentials::CredentialSource;
use super::transport::Transport;
use super::wire::{self, Envelope};
use crate::config::RemoteConfig;
use crate::node::{Action, EntityRef, ListId, MetaId, NodeArena, TaskId};
use crate::{NoteSyncError, Result};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Most update actions sent in one request
pub const UPDATE_BATCH_LIMIT: usize = 10;

const DEFAULT_LOGIN_TTL: Duration = Duration::from_secs(300);

pub struct GTaskClient<T: Transport> {
    transport: T,
    base_url: String,
    get_url: String,
    post_url: String,
    client_version: i64,
    logged_in: bool,
    last_login: Option<Instant>,
    login_ttl: Duration,
    account: Option<String>,
    action_id: i64,
    pending: Vec<Action>,
}

impl<T: Transport> GTaskClient<T> {
    pub fn new(transport: T, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            transport,
            get_url: format!("{}/ig", base_url),
            post_url: format!("{}/r/ig", base_url),
            base_url,
            client_version: -1,
            logged_in: false,
            last_login: None,
            login_ttl: DEFAULT_LOGIN_TTL,
            account: None,
            action_id: 1,
            pending: Vec::new(),
        }
    }

    pub fn from_config(transport: T, config: &RemoteConfig) -> Self {
        Self::new(transport, config.base_url.clone()).with_login_ttl(config.login_ttl())
    }

    pub fn with_login_ttl(mut self, ttl: Duration) -> Self {
        self.login_ttl = ttl;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn client_version(&self) -> i64 {
        self.client_version
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop queued updates left over from an earlier run
    pub fn reset_pending(&mut self) {
        if !self.pending.is_empty() {
            debug!(count = self.pending.len(), "Dropping pending updates");
        }
        self.pending.clear();
    }

    /// Log in unless a login for the same account is still fresh
    pub async fn login(&mut self, creds: &dyn CredentialSource) -> Result<()> {
        let account = creds.account_name();

        if self.logged_in {
            let expired = self
                .last_login
                .map_or(true, |at| at.elapsed() > self.login_ttl);
            if expired {
                debug!("Login expired");
                self.logged_in = false;
            } else if self.account.as_deref() != Some(account.as_str()) {
                debug!(account = %account, "Account changed, logging in again");
                self.logged_in = false;
            }
        }

        if self.logged_in {
            debug!("Already logged in");
            return Ok(());
        }

        if account.trim().is_empty() {
            return Err(NoteSyncError::Auth("no account configured".to_string()));
        }

        self.last_login = Some(Instant::now());
        let token = creds.auth_token(false).await?;
        self.account = Some(account.clone());

        let lower = account.to_lowercase();
        if !(lower.ends_with("gmail.com") || lower.ends_with("googlemail.com")) {
            if let Some((_, domain)) = account.split_once('@') {
                self.get_url = format!("{}/a/{}/ig", self.base_url, domain);
                self.post_url = format!("{}/a/{}/r/ig", self.base_url, domain);

                match self.try_login(creds, &token).await {
                    Ok(()) => self.logged_in = true,
                    Err(e) => warn!(error = %e, domain = %domain, "Custom domain login failed"),
                }
            }
        }

        if !self.logged_in {
            self.get_url = format!("{}/ig", self.base_url);
            self.post_url = format!("{}/r/ig", self.base_url);

            if let Err(e) = self.try_login(creds, &token).await {
                return Err(NoteSyncError::Network(format!("login failed: {}", e)));
            }
        }

        self.logged_in = true;
        info!(account = %account, version = self.client_version, "Logged in");
        Ok(())
    }

    /// One login attempt, then one more with a fresh token
    async fn try_login(&mut self, creds: &dyn CredentialSource, token: &str) -> Result<()> {
        match self.login_once(token).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Login refused, invalidating token");
                let fresh = creds.auth_token(true).await?;
                self.login_once(&fresh).await
            }
        }
    }

    async fn login_once(&mut self, token: &str) -> Result<()> {
        let reply = self
            .transport
            .get(&self.get_url, &[("auth", token)])
            .await?;

        if !reply.is_success() {
            return Err(NoteSyncError::Network(format!(
                "login returned HTTP {}",
                reply.status
            )));
        }

        if !reply.cookies.iter().any(|name| name.contains("GTL")) {
            warn!("It seems that there is no auth cookie");
        }

        let setup = wire::extract_setup(&reply.body)?;
        self.client_version = wire::client_version(&setup)?;
        Ok(())
    }

    fn next_action_id(&mut self) -> i64 {
        let id = self.action_id;
        self.action_id += 1;
        id
    }

    async fn post(&mut self, actions: &[Action]) -> Result<Value> {
        if !self.logged_in {
            return Err(NoteSyncError::action("please login first"));
        }

        let body = Envelope::new(actions, self.client_version).to_json()?;
        debug!(actions = actions.len(), "Posting action list");

        let reply = self
            .transport
            .post_form(&self.post_url, &[("r", body.as_str())], &[("AT", "1")])
            .await?;

        if !reply.is_success() {
            return Err(NoteSyncError::Network(format!(
                "post returned HTTP {}",
                reply.status
            )));
        }

        wire::parse_response(&reply.body)
    }

    /// Send every queued update in one request
    pub async fn commit_update(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let actions = std::mem::take(&mut self.pending);
        debug!(count = actions.len(), "Committing updates");
        if let Err(e) = self.post(&actions).await {
            // Queue stays intact until the server has taken it
            self.pending = actions;
            return Err(e);
        }
        Ok(())
    }

    /// Queue the update action of `entity`, flushing a full queue first
    pub async fn add_update(
        &mut self,
        arena: &NodeArena,
        entity: impl Into<EntityRef>,
    ) -> Result<()> {
        if self.pending.len() >= UPDATE_BATCH_LIMIT {
            self.commit_update().await?;
        }

        let action_id = self.next_action_id();
        let action = arena.update_action(entity, action_id)?;
        self.pending.push(action);
        Ok(())
    }

    async fn create(&mut self, arena: &mut NodeArena, entity: EntityRef) -> Result<()> {
        self.commit_update().await?;

        let action_id = self.next_action_id();
        let action = arena.create_action(entity, action_id)?;
        let response = self.post(std::slice::from_ref(&action)).await?;

        let gid = wire::new_id(&response)?;
        debug!(gid = %gid, "Created remote entity");
        arena.base_mut(entity).gid = Some(gid);
        Ok(())
    }

    pub async fn create_list(&mut self, arena: &mut NodeArena, list: ListId) -> Result<()> {
        self.create(arena, list.into()).await
    }

    pub async fn create_task(&mut self, arena: &mut NodeArena, task: TaskId) -> Result<()> {
        self.create(arena, task.into()).await
    }

    pub async fn create_meta(&mut self, arena: &mut NodeArena, meta: MetaId) -> Result<()> {
        self.create(arena, meta.into()).await
    }

    /// Tell the server `task` moved from `from` to its current place in `to`
    pub async fn move_task(
        &mut self,
        arena: &NodeArena,
        task: TaskId,
        from: ListId,
        to: ListId,
    ) -> Result<()> {
        self.commit_update().await?;

        let missing = |what: &str| NoteSyncError::action(format!("cannot move task: {} has no gid", what));
        let id = arena.gid(task).ok_or_else(|| missing("task"))?.to_string();
        let source_list = arena.gid(from).ok_or_else(|| missing("source list"))?.to_string();
        let dest_parent = arena.gid(to).ok_or_else(|| missing("destination list"))?.to_string();

        let (dest_list, prior_sibling_id) = if from != to {
            (Some(dest_parent.clone()), None)
        } else {
            let prior = arena
                .task(task)
                .prior_sibling()
                .and_then(|p| arena.child(p).base.gid())
                .map(str::to_string);
            (None, prior)
        };

        let action = Action::Move {
            action_id: self.next_action_id(),
            id,
            source_list,
            dest_parent,
            dest_list,
            prior_sibling_id,
        };
        self.post(std::slice::from_ref(&action)).await?;
        Ok(())
    }

    /// Mark `entity` deleted remotely
    pub async fn delete_node(
        &mut self,
        arena: &mut NodeArena,
        entity: impl Into<EntityRef>,
    ) -> Result<()> {
        let entity = entity.into();
        self.commit_update().await?;

        arena.base_mut(entity).deleted = true;
        let action_id = self.next_action_id();
        let action = arena.update_action(entity, action_id)?;
        self.post(std::slice::from_ref(&action)).await?;
        Ok(())
    }

    /// Raw list objects from the landing page
    pub async fn fetch_lists(&mut self) -> Result<Vec<Value>> {
        if !self.logged_in {
            return Err(NoteSyncError::action("please login first"));
        }

        let reply = self.transport.get(&self.get_url, &[]).await?;
        if !reply.is_success() {
            return Err(NoteSyncError::Network(format!(
                "fetching lists returned HTTP {}",
                reply.status
            )));
        }

        let setup = wire::extract_setup(&reply.body)?;
        wire::setup_lists(&setup)
    }

    /// Raw task objects of one list, deleted ones excluded
    pub async fn fetch_items(&mut self, list_gid: &str) -> Result<Vec<Value>> {
        self.commit_update().await?;

        let action = Action::GetAll {
            action_id: self.next_action_id(),
            list_id: list_gid.to_string(),
            get_deleted: false,
        };
        let response = self.post(std::slice::from_ref(&action)).await?;
        wire::tasks(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ChildId, Task, TaskList};
    use crate::remote::credentials::StaticCredentials;
    use crate::remote::transport::HttpReply;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    const BASE: &str = "https://tasks.test";

    /// Accepts logins on `open_urls`; answers posts by action type
    struct ScriptedTransport {
        open_urls: Vec<String>,
        gets: Mutex<Vec<String>>,
        posts: Mutex<Vec<Value>>,
        refusals_left: AtomicUsize,
        posts_fail: AtomicBool,
    }

    impl ScriptedTransport {
        fn accepting(urls: &[&str]) -> Self {
            Self {
                open_urls: urls.iter().map(|u| format!("{}{}", BASE, u)).collect(),
                gets: Mutex::new(Vec::new()),
                posts: Mutex::new(Vec::new()),
                refusals_left: AtomicUsize::new(0),
                posts_fail: AtomicBool::new(false),
            }
        }

        fn posts(&self) -> Vec<Value> {
            self.posts.lock().unwrap().clone()
        }

        fn gets(&self) -> Vec<String> {
            self.gets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, url: &str, _query: &[(&str, &str)]) -> Result<HttpReply> {
            self.gets.lock().unwrap().push(url.to_string());

            let refused = self
                .refusals_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if refused || !self.open_urls.iter().any(|u| u == url) {
                return Ok(HttpReply {
                    status: 401,
                    ..HttpReply::default()
                });
            }

            Ok(HttpReply {
                status: 200,
                body: r#"<script>_setup({"v": 42, "t": {"lists": [{"id": "l1", "name": "x"}]}})}</script>"#.into(),
                cookies: vec!["GTL".into()],
            })
        }

        async fn post_form(
            &self,
            _url: &str,
            form: &[(&str, &str)],
            headers: &[(&str, &str)],
        ) -> Result<HttpReply> {
            assert!(headers.contains(&("AT", "1")));
            if self.posts_fail.load(Ordering::SeqCst) {
                return Err(NoteSyncError::Network("connection reset".into()));
            }
            let (_, body) = form.iter().find(|(k, _)| *k == "r").unwrap();
            let envelope: Value = serde_json::from_str(body).unwrap();
            let first = envelope["action_list"][0].clone();
            self.posts.lock().unwrap().push(envelope);

            let reply = match first["action_type"].as_str() {
                Some("create") => json!({"results": [{"new_id": format!("new-{}", first["action_id"])}]}),
                Some("get_all") => json!({"tasks": [{"id": "t1", "name": "milk"}]}),
                _ => json!({"results": []}),
            };
            Ok(HttpReply::ok(reply.to_string()))
        }
    }

    async fn logged_in() -> GTaskClient<ScriptedTransport> {
        let mut client = GTaskClient::new(ScriptedTransport::accepting(&["/ig"]), BASE);
        client
            .login(&StaticCredentials::new("me@gmail.com", "tok"))
            .await
            .unwrap();
        client
    }

    fn list_with_gid(arena: &mut NodeArena, gid: &str) -> ListId {
        let mut list = TaskList::named("[MIUI_Notes]Work");
        list.base.gid = Some(gid.into());
        arena.alloc_list(list)
    }

    fn task_in(arena: &mut NodeArena, list: ListId, gid: &str) -> TaskId {
        let mut task = Task::default();
        task.base.gid = Some(gid.into());
        task.base.name = gid.into();
        let id = arena.alloc_task(task);
        arena.add_child(list, ChildId::Task(id));
        id
    }

    #[tokio::test]
    async fn test_login_reads_client_version() {
        let client = logged_in().await;
        assert!(client.is_logged_in());
        assert_eq!(client.client_version(), 42);
        assert_eq!(client.transport().gets(), vec![format!("{}/ig", BASE)]);
    }

    #[tokio::test]
    async fn test_login_is_reused_within_ttl() {
        let mut client = logged_in().await;
        let creds = StaticCredentials::new("me@gmail.com", "tok");
        client.login(&creds).await.unwrap();
        assert_eq!(client.transport().gets().len(), 1);

        client
            .login(&StaticCredentials::new("other@gmail.com", "tok"))
            .await
            .unwrap();
        assert_eq!(client.transport().gets().len(), 2);
        assert_eq!(client.account(), Some("other@gmail.com"));
    }

    #[tokio::test]
    async fn test_login_expires() {
        let mut client = logged_in().await.with_login_ttl(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        client
            .login(&StaticCredentials::new("me@gmail.com", "tok"))
            .await
            .unwrap();
        assert_eq!(client.transport().gets().len(), 2);
    }

    #[tokio::test]
    async fn test_custom_domain_first() {
        let transport = ScriptedTransport::accepting(&["/a/corp.example/ig"]);
        let mut client = GTaskClient::new(transport, BASE);
        client
            .login(&StaticCredentials::new("me@corp.example", "tok"))
            .await
            .unwrap();
        assert_eq!(
            client.transport().gets(),
            vec![format!("{}/a/corp.example/ig", BASE)]
        );
    }

    #[tokio::test]
    async fn test_custom_domain_falls_back() {
        let transport = ScriptedTransport::accepting(&["/ig"]);
        let mut client = GTaskClient::new(transport, BASE);
        client
            .login(&StaticCredentials::new("me@corp.example", "tok"))
            .await
            .unwrap();

        // Two refused attempts on the domain URL, then the standard one
        let gets = client.transport().gets();
        assert_eq!(gets.len(), 3);
        assert_eq!(gets[2], format!("{}/ig", BASE));
    }

    #[tokio::test]
    async fn test_refused_token_is_retried_once() {
        let transport = ScriptedTransport::accepting(&["/ig"]);
        transport.refusals_left.store(1, Ordering::SeqCst);
        let mut client = GTaskClient::new(transport, BASE);
        client
            .login(&StaticCredentials::new("me@gmail.com", "tok"))
            .await
            .unwrap();
        assert_eq!(client.transport().gets().len(), 2);
    }

    #[tokio::test]
    async fn test_login_failure_is_transport() {
        let transport = ScriptedTransport::accepting(&[]);
        let mut client = GTaskClient::new(transport, BASE);
        let err = client
            .login(&StaticCredentials::new("me@gmail.com", "tok"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::FailureKind::Transport);
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_post_requires_login() {
        let mut client = GTaskClient::new(ScriptedTransport::accepting(&["/ig"]), BASE);
        let err = client.fetch_items("l1").await.unwrap_err();
        assert_eq!(err.kind(), crate::FailureKind::Logic);
    }

    #[tokio::test]
    async fn test_updates_are_batched_by_ten() {
        let mut client = logged_in().await;
        let mut arena = NodeArena::new();
        let list = list_with_gid(&mut arena, "l1");

        for i in 0..11 {
            let task = task_in(&mut arena, list, &format!("t{}", i));
            client.add_update(&arena, task).await.unwrap();
        }

        let posts = client.transport().posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["action_list"].as_array().unwrap().len(), 10);
        assert_eq!(posts[0]["client_version"], 42);
        assert_eq!(client.pending_len(), 1);

        client.commit_update().await.unwrap();
        client.commit_update().await.unwrap();
        let posts = client.transport().posts();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1]["action_list"].as_array().unwrap().len(), 1);

        let ids: Vec<i64> = posts
            .iter()
            .flat_map(|p| p["action_list"].as_array().unwrap().clone())
            .map(|a| a["action_id"].as_i64().unwrap())
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_queue() {
        let mut client = logged_in().await;
        let mut arena = NodeArena::new();
        let list = list_with_gid(&mut arena, "l1");
        for gid in ["t0", "t1"] {
            let task = task_in(&mut arena, list, gid);
            client.add_update(&arena, task).await.unwrap();
        }

        client.transport().posts_fail.store(true, Ordering::SeqCst);
        let err = client.commit_update().await.unwrap_err();
        assert_eq!(err.kind(), crate::FailureKind::Transport);
        assert_eq!(client.pending_len(), 2);

        client.transport().posts_fail.store(false, Ordering::SeqCst);
        client.commit_update().await.unwrap();
        assert_eq!(client.pending_len(), 0);
        let posts = client.transport().posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["action_list"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_flushes_then_assigns_gid() {
        let mut client = logged_in().await;
        let mut arena = NodeArena::new();
        let list = list_with_gid(&mut arena, "l1");
        let existing = task_in(&mut arena, list, "t0");
        client.add_update(&arena, existing).await.unwrap();

        let fresh = arena.alloc_list(TaskList::named("[MIUI_Notes]Home"));
        client.create_list(&mut arena, fresh).await.unwrap();

        let posts = client.transport().posts();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0]["action_list"][0]["action_type"], "update");
        assert_eq!(posts[1]["action_list"][0]["action_type"], "create");
        assert_eq!(arena.gid(fresh), Some("new-2"));
    }

    #[tokio::test]
    async fn test_move_across_lists() {
        let mut client = logged_in().await;
        let mut arena = NodeArena::new();
        let from = list_with_gid(&mut arena, "l1");
        let to = list_with_gid(&mut arena, "l2");
        task_in(&mut arena, to, "head");
        let task = task_in(&mut arena, to, "t1");

        client.move_task(&arena, task, from, to).await.unwrap();

        let action = &client.transport().posts()[0]["action_list"][0];
        assert_eq!(action["action_type"], "move");
        assert_eq!(action["source_list"], "l1");
        assert_eq!(action["dest_parent"], "l2");
        assert_eq!(action["dest_list"], "l2");
        assert!(action.get("prior_sibling_id").is_none());
    }

    #[tokio::test]
    async fn test_move_within_list_names_prior_sibling() {
        let mut client = logged_in().await;
        let mut arena = NodeArena::new();
        let list = list_with_gid(&mut arena, "l1");
        let head = task_in(&mut arena, list, "head");
        let task = task_in(&mut arena, list, "t1");

        client.move_task(&arena, task, list, list).await.unwrap();
        client.move_task(&arena, head, list, list).await.unwrap();

        let posts = client.transport().posts();
        let first = &posts[0]["action_list"][0];
        assert!(first.get("dest_list").is_none());
        assert_eq!(first["prior_sibling_id"], "head");

        let second = &posts[1]["action_list"][0];
        assert!(second.get("prior_sibling_id").is_none());
    }

    #[tokio::test]
    async fn test_delete_node_marks_deleted() {
        let mut client = logged_in().await;
        let mut arena = NodeArena::new();
        let list = list_with_gid(&mut arena, "l1");
        let task = task_in(&mut arena, list, "t1");

        client.delete_node(&mut arena, task).await.unwrap();

        assert!(arena.base(task).deleted);
        let action = &client.transport().posts()[0]["action_list"][0];
        assert_eq!(action["entity_delta"]["deleted"], true);
    }

    #[tokio::test]
    async fn test_fetches() {
        let mut client = logged_in().await;
        let lists = client.fetch_lists().await.unwrap();
        assert_eq!(lists[0]["id"], "l1");

        let tasks = client.fetch_items("l1").await.unwrap();
        assert_eq!(tasks[0]["name"], "milk");

        let action = &client.transport().posts()[0]["action_list"][0];
        assert_eq!(action["action_type"], "get_all");
        assert_eq!(action["get_deleted"], false);
    }

    #[tokio::test]
    async fn test_reset_pending() {
        let mut client = logged_in().await;
        let mut arena = NodeArena::new();
        let list = list_with_gid(&mut arena, "l1");
        client.add_update(&arena, list).await.unwrap();
        client.reset_pending();
        client.commit_update().await.unwrap();
        assert!(client.transport().posts().is_empty());
    }
}
