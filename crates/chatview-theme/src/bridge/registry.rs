use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chatview_common::{SessionId, ThemeError};
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::debug;

use crate::session::SessionDelegate;

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, Arc<dyn SessionDelegate>>,
    pending: HashMap<SessionId, oneshot::Sender<String>>,
}

/// Sessions a theme script may query, and their pending HTML generations.
///
/// A session is registered for the duration of one generation round trip.
#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, id: SessionId, session: Arc<dyn SessionDelegate>) {
        self.lock().sessions.insert(id, session);
    }

    /// Remove a session. A pending generation is cancelled by dropping its
    /// sender.
    pub fn unregister(&self, id: &SessionId) {
        let mut inner = self.lock();
        inner.sessions.remove(id);
        if inner.pending.remove(id).is_some() {
            debug!(session_id = %id, "pending session html generation cancelled");
        }
    }

    pub fn is_registered(&self, id: &SessionId) -> bool {
        self.lock().sessions.contains_key(id)
    }

    pub fn is_pending(&self, id: &SessionId) -> bool {
        self.lock().pending.contains_key(id)
    }

    /// Values of the named properties of a session.
    ///
    /// Unknown sessions give an empty map, unknown properties `null`.
    pub fn session_properties(&self, id: &SessionId, names: &[String]) -> Map<String, Value> {
        let Some(session) = self.lock().sessions.get(id).cloned() else {
            return Map::new();
        };
        names
            .iter()
            .map(|name| (name.clone(), session.property(name).unwrap_or(Value::Null)))
            .collect()
    }

    /// Register `session` and a continuation for its generated HTML.
    pub fn begin_generation(
        &self,
        id: SessionId,
        session: Arc<dyn SessionDelegate>,
    ) -> Result<oneshot::Receiver<String>, ThemeError> {
        let mut inner = self.lock();
        if inner.pending.contains_key(&id) {
            return Err(ThemeError::GenerationPending(id));
        }
        let (tx, rx) = oneshot::channel();
        inner.sessions.insert(id.clone(), session);
        inner.pending.insert(id, tx);
        Ok(rx)
    }

    /// Deliver generated HTML to the continuation of `id` and unregister the
    /// session. Returns `false` when nothing was waiting for it.
    pub fn complete_generation(&self, id: &SessionId, html: String) -> bool {
        let tx = {
            let mut inner = self.lock();
            let Some(tx) = inner.pending.remove(id) else {
                debug!(session_id = %id, "session html for unknown session dropped");
                return false;
            };
            inner.sessions.remove(id);
            tx
        };
        if tx.send(html).is_err() {
            debug!(session_id = %id, "session html receiver already gone");
        }
        true
    }

    /// Drop a pending generation and its session registration.
    pub fn cancel(&self, id: &SessionId) {
        self.unregister(id);
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().sessions.is_empty()
    }
}
