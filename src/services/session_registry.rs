use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::services::session_runtime::SessionHandle;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("session capacity of {0} reached")]
pub(crate) struct CapacityExceeded(pub(crate) usize);

/// Live sessions by id. Ended sessions stay readable until the sweeper evicts
/// them, so they count against the capacity too.
pub(crate) struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    capacity: usize,
}

impl SessionRegistry {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), capacity }
    }

    pub(crate) async fn ensure_capacity(&self) -> Result<(), CapacityExceeded> {
        if self.sessions.read().await.len() >= self.capacity {
            return Err(CapacityExceeded(self.capacity));
        }
        Ok(())
    }

    pub(crate) async fn insert(&self, handle: SessionHandle) -> Result<(), CapacityExceeded> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.capacity {
            return Err(CapacityExceeded(self.capacity));
        }
        sessions.insert(handle.id(), handle);
        metrics::gauge!("exam_sessions_active").set(sessions.len() as f64);
        Ok(())
    }

    pub(crate) async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub(crate) async fn remove(&self, id: Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(&id);
        metrics::gauge!("exam_sessions_active").set(sessions.len() as f64);
        removed
    }

    pub(crate) async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions that ended at least `retention` ago. Returns how many went.
    pub(crate) async fn evict_ended(&self, retention: Duration) -> usize {
        let snapshot: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();

        let mut expired = Vec::new();
        for handle in snapshot {
            if handle.ended_for().await.is_some_and(|elapsed| elapsed >= retention) {
                expired.push(handle);
            }
        }

        let mut evicted = 0;
        for handle in expired {
            handle.tear_down().await;
            if self.remove(handle.id()).await.is_some() {
                evicted += 1;
                tracing::info!(session_id = %handle.id(), "evicted ended exam session");
            }
        }
        evicted
    }
}
