//! In-memory session store keyed by correspondent

use super::store::{CorrespondentId, Session};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type SessionSlot = Arc<AsyncMutex<Session>>;

/// Holds exactly one [`Session`] per correspondent
///
/// Each correspondent gets its own async lock, so work for one
/// correspondent never waits on another. Holding the guard returned by
/// [`SessionStore::lock`] makes a read-modify-write atomic for that
/// correspondent. Entries are created lazily and never evicted.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    slots: Arc<Mutex<HashMap<CorrespondentId, SessionSlot>>>,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &CorrespondentId) -> SessionSlot {
        let mut slots = self.slots.lock();
        slots
            .entry(id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(Session::new())))
            .clone()
    }

    /// Get a copy of a correspondent's session, creating it if absent
    pub async fn get(&self, id: &CorrespondentId) -> Session {
        self.slot(id).lock().await.clone()
    }

    /// Replace a correspondent's session (last write wins)
    pub async fn put(&self, id: &CorrespondentId, session: Session) {
        *self.slot(id).lock().await = session;
    }

    /// Lock a correspondent's session for exclusive access
    pub async fn lock(&self, id: &CorrespondentId) -> OwnedMutexGuard<Session> {
        self.slot(id).lock_owned().await
    }

    /// Whether a session has been created for `id`
    pub fn contains(&self, id: &CorrespondentId) -> bool {
        self.slots.lock().contains_key(id)
    }

    /// Number of known correspondents
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Copy of every session, sorted by correspondent
    pub async fn snapshot(&self) -> Vec<(CorrespondentId, Session)> {
        let slots: Vec<(CorrespondentId, SessionSlot)> = self
            .slots
            .lock()
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();

        let mut sessions = Vec::with_capacity(slots.len());
        for (id, slot) in slots {
            sessions.push((id, slot.lock().await.clone()));
        }
        sessions.sort_by(|a, b| a.0.cmp(&b.0));
        sessions
    }
}
