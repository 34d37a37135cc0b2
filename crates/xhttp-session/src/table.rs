use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;
use xhttp_core::SessionId;
use xhttp_queue::{UploadQueue, UploadQueueConfig};

use crate::config::SessionTableConfig;
use crate::session::HttpSession;

struct Inner {
    sessions: DashMap<SessionId, Arc<HttpSession>>,
    config: SessionTableConfig,
    upload_queue_config: UploadQueueConfig,
    active_count: AtomicU64,
    reaped_count: AtomicU64,
}

/// Server-side session map (C2, spec §4.2). Cheap to clone; every clone
/// shares the same underlying map and counters.
#[derive(Clone)]
pub struct SessionTable {
    inner: Arc<Inner>,
}

impl SessionTable {
    #[must_use]
    pub fn new(config: SessionTableConfig) -> Self {
        Self::with_upload_queue_config(config, UploadQueueConfig::default())
    }

    #[must_use]
    pub fn with_upload_queue_config(
        config: SessionTableConfig,
        upload_queue_config: UploadQueueConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: DashMap::new(),
                config,
                upload_queue_config,
                active_count: AtomicU64::new(0),
                reaped_count: AtomicU64::new(0),
            }),
        }
    }

    /// Atomic get-or-create. The fast path is a sharded-map read; the slow
    /// path (session absent) takes that shard's write lock once to insert,
    /// so two concurrent `upsert`s for the same id never create duplicate
    /// sessions.
    pub fn upsert(&self, id: SessionId) -> Arc<HttpSession> {
        if let Some(existing) = self.inner.sessions.get(&id) {
            return existing.value().clone();
        }

        let mut spawned_reaper = None;
        let entry = self
            .inner
            .sessions
            .entry(id.clone())
            .or_insert_with(|| {
                let upload_queue = Arc::new(UploadQueue::new(self.inner.upload_queue_config));
                let (session, connected_rx) = HttpSession::new(id.clone(), upload_queue);
                self.inner.active_count.fetch_add(1, Ordering::Relaxed);
                spawned_reaper = Some(connected_rx);
                Arc::new(session)
            });
        let session = entry.value().clone();
        drop(entry);

        if let Some(connected_rx) = spawned_reaper {
            self.spawn_reaper(id, connected_rx);
        }
        session
    }

    /// Fires when the paired download GET adopts the session, cancelling
    /// its reaper. A no-op if the id is unknown (already reaped or never
    /// created).
    pub fn mark_fully_connected(&self, id: &SessionId) {
        if let Some(session) = self.inner.sessions.get(id) {
            session.mark_fully_connected();
        }
    }

    /// Deletes the session and closes its upload queue. Idempotent.
    pub fn remove(&self, id: &SessionId) {
        if let Some((_, session)) = self.inner.sessions.remove(id) {
            session.upload_queue.close();
            self.inner.active_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Number of sessions currently reachable from the table.
    #[must_use]
    pub fn active_count(&self) -> u64 {
        self.inner.active_count.load(Ordering::Relaxed)
    }

    /// Cumulative number of sessions the reaper has removed for never
    /// completing their handshake.
    #[must_use]
    pub fn reaped_count(&self) -> u64 {
        self.inner.reaped_count.load(Ordering::Relaxed)
    }

    fn spawn_reaper(&self, id: SessionId, mut connected_rx: oneshot::Receiver<()>) {
        let inner = self.inner.clone();
        let reap_after = inner.config.reap_after;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(reap_after) => {
                    if let Some((_, session)) = inner.sessions.remove(&id) {
                        session.upload_queue.close();
                        inner.active_count.fetch_sub(1, Ordering::Relaxed);
                        inner.reaped_count.fetch_add(1, Ordering::Relaxed);
                        debug!(session_id = %id, "session reaped: no download GET arrived in time");
                    }
                }
                _ = &mut connected_rx => {
                    debug!(session_id = %id, "session fully connected, reaper cancelled");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn upsert_is_idempotent_for_same_id() {
        let table = SessionTable::new(SessionTableConfig::default());
        let id = SessionId::new();
        let a = table.upsert(id.clone());
        let b = table.upsert(id);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(table.active_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_upsert_creates_one_session() {
        let table = SessionTable::new(SessionTableConfig::default());
        let id = SessionId::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let table = table.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move { table.upsert(id) }));
        }
        let mut sessions = Vec::new();
        for h in handles {
            sessions.push(h.await.unwrap());
        }
        let first = &sessions[0];
        assert!(sessions.iter().all(|s| Arc::ptr_eq(s, first)));
        assert_eq!(table.active_count(), 1);
    }

    #[tokio::test]
    async fn reaper_closes_unconnected_session_after_ttl() {
        let table = SessionTable::new(SessionTableConfig {
            reap_after: Duration::from_millis(20),
        });
        let id = SessionId::new();
        let session = table.upsert(id.clone());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(session.upload_queue.is_closed());
        assert_eq!(table.active_count(), 0);
        assert_eq!(table.reaped_count(), 1);
    }

    #[tokio::test]
    async fn mark_fully_connected_cancels_the_reaper() {
        let table = SessionTable::new(SessionTableConfig {
            reap_after: Duration::from_millis(20),
        });
        let id = SessionId::new();
        let session = table.upsert(id.clone());
        table.mark_fully_connected(&id);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!session.upload_queue.is_closed());
        assert_eq!(table.active_count(), 1);
        assert_eq!(table.reaped_count(), 0);
    }

    #[tokio::test]
    async fn remove_closes_queue_and_drops_from_table() {
        let table = SessionTable::new(SessionTableConfig::default());
        let id = SessionId::new();
        let session = table.upsert(id.clone());
        table.remove(&id);
        assert!(session.upload_queue.is_closed());
        assert_eq!(table.active_count(), 0);
    }
}
