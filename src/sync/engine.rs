//! Long-lived sync engine

use super::session::SyncSession;
use super::{
    send_event, SyncEvent, SyncReport, SyncStatus, DEFAULT_EVENT_CHANNEL_CAPACITY,
};
use crate::remote::{CredentialSource, GTaskClient, Transport};
use crate::store::NoteStore;
use crate::{NoteSyncError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

/// Owns the protocol client and the local store and runs syncs between them
///
/// Share it as `Arc<SyncEngine<..>>`: one task runs [`SyncEngine::sync`],
/// others may [`cancel`](SyncEngine::cancel) or [`subscribe`](SyncEngine::subscribe).
pub struct SyncEngine<T: Transport, S: NoteStore> {
    client: Mutex<GTaskClient<T>>,
    store: Mutex<S>,
    credentials: Arc<dyn CredentialSource>,
    syncing: AtomicBool,
    cancelled: Arc<AtomicBool>,
    event_tx: broadcast::Sender<SyncEvent>,
}

/// Clears the single-flight flag when a run ends, however it ends
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<T: Transport, S: NoteStore> SyncEngine<T, S> {
    pub fn new(client: GTaskClient<T>, store: S, credentials: Arc<dyn CredentialSource>) -> Self {
        let (event_tx, _) = broadcast::channel(DEFAULT_EVENT_CHANNEL_CAPACITY);
        Self {
            client: Mutex::new(client),
            store: Mutex::new(store),
            credentials,
            syncing: AtomicBool::new(false),
            cancelled: Arc::new(AtomicBool::new(false)),
            event_tx,
        }
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// Ask the running sync to stop at its next check
    pub fn cancel(&self) {
        if self.is_syncing() {
            info!("Cancelling sync");
        }
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// The flag behind [`cancel`](Self::cancel), for signal handlers
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &Mutex<S> {
        &self.store
    }

    pub fn client(&self) -> &Mutex<GTaskClient<T>> {
        &self.client
    }

    /// Run one sync and report how it ended
    pub async fn sync(&self) -> SyncStatus {
        SyncStatus::from_result(&self.run().await)
    }

    /// Run one sync
    ///
    /// Fails with [`NoteSyncError::InProgress`] while another run is active.
    /// A cancelled run is still `Ok`, with [`SyncReport::cancelled`] set.
    pub async fn run(&self) -> Result<SyncReport> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Sync requested while another one is running");
            return Err(NoteSyncError::InProgress);
        }
        let _guard = RunGuard(&self.syncing);

        self.cancelled.store(false, Ordering::SeqCst);
        send_event(&self.event_tx, SyncEvent::Started);

        let result = {
            let mut client = self.client.lock().await;
            let mut store = self.store.lock().await;
            let session = SyncSession::new(&mut *client, &mut *store, &self.cancelled, &self.event_tx);
            session.run(self.credentials.as_ref()).await
        };

        let status = SyncStatus::from_result(&result);
        match &result {
            Ok(report) => info!(status = %status, changes = report.stats.change_count(), "Sync ended"),
            Err(e) if status == SyncStatus::NetworkError => warn!(error = %e, "Sync failed"),
            Err(e) => error!(error = %e, "Sync failed"),
        }
        send_event(&self.event_tx, SyncEvent::Finished(status));

        result
    }
}
