use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chatview_common::SessionId;
use tracing::{debug, info};

use super::{ContentHandler, ContentRequest, ContentResponse, SESSION_QUERY_PARAM};

/// Routes content requests to per-session handlers.
///
/// The accept loop belongs to the embedding application; it only calls
/// [`dispatch`](Self::dispatch).
pub struct ContentServer {
    base_url: String,
    handlers: Mutex<HashMap<SessionId, Arc<ContentHandler>>>,
}

impl ContentServer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            handlers: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<ContentHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register a handler under a fresh session id.
    pub fn register(&self, handler: ContentHandler) -> SessionId {
        let id = SessionId::new();
        self.lock().insert(id.clone(), Arc::new(handler));
        debug!(session_id = %id, "content handler registered");
        id
    }

    pub fn unregister(&self, id: &SessionId) -> bool {
        let removed = self.lock().remove(id).is_some();
        if removed {
            debug!(session_id = %id, "content handler unregistered");
        }
        removed
    }

    pub fn is_registered(&self, id: &SessionId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// URL a chat view loads to reach its handler.
    pub fn session_url(&self, id: &SessionId) -> String {
        format!(
            "{}?{SESSION_QUERY_PARAM}={}",
            self.base_url,
            urlencoding::encode(id.as_str())
        )
    }

    /// Serve one request. Declined and unroutable requests are 404.
    pub async fn dispatch(&self, request: &ContentRequest) -> ContentResponse {
        let head = request.method.eq_ignore_ascii_case("HEAD");
        if !head && !request.method.eq_ignore_ascii_case("GET") {
            return ContentResponse::status(405, "Method Not Allowed");
        }

        let Some(id) = request.session_id() else {
            debug!(uri = %request.uri, "request without session id");
            return ContentResponse::not_found();
        };
        // Clone out so the lock is not held while the handler awaits.
        let handler = self.lock().get(&id).cloned();
        let Some(handler) = handler else {
            debug!(session_id = %id, "request for unknown session");
            return ContentResponse::not_found();
        };

        let mut response = handler
            .handle(request)
            .await
            .unwrap_or_else(ContentResponse::not_found);
        info!(
            session_id = %id,
            method = %request.method,
            path = %request.path(),
            status = response.status,
            "content request served"
        );
        if head {
            response.body.clear();
        }
        response
    }
}
