//! Chat views bound to a theme.
//!
//! A [`ThemeSession`] exists while a chat view uses a theme. Creating one
//! registers a [`ContentHandler`] with the content server; dropping it
//! revokes that registration and any pending HTML generation.

use std::sync::Arc;

use chatview_common::{SessionId, ThemeError, ThemeEvent};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::bridge::{BridgeError, BridgeObject, ThemeUtil, UtilityBridge, SESSION_OBJECT, UTIL_OBJECT};
use crate::content::{ContentHandler, ContentRequest, ContentServer};
use crate::ipc::BridgeArgs;
use crate::sandbox::SandboxPage;
use crate::theme::Theme;

/// Content a session serves itself (avatars, attachments, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContent {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// The chat view side of a session: properties and methods exposed to
/// script as `srvSession`, and its own content.
pub trait SessionDelegate: Send + Sync {
    fn property(&self, name: &str) -> Option<Value>;

    /// Properties published to script when the session object is defined.
    fn property_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn methods(&self) -> Vec<String> {
        Vec::new()
    }

    fn invoke(&self, method: &str, _args: BridgeArgs<'_>) -> Result<Value, BridgeError> {
        Err(BridgeError::UnknownMethod {
            object: SESSION_OBJECT.to_string(),
            method: method.to_string(),
        })
    }

    /// Content for a non-root request, or `None` to let the theme serve it.
    /// The root path always goes to the theme and is never offered here.
    fn contents(&self, _request: &ContentRequest) -> Option<SessionContent> {
        None
    }
}

/// A [`SessionDelegate`] registered as a bridge object.
pub struct SessionObject {
    delegate: Arc<dyn SessionDelegate>,
}

impl SessionObject {
    pub fn new(delegate: Arc<dyn SessionDelegate>) -> Self {
        Self { delegate }
    }
}

impl BridgeObject for SessionObject {
    fn methods(&self) -> Vec<String> {
        self.delegate.methods()
    }

    fn properties(&self) -> Map<String, Value> {
        self.delegate
            .property_names()
            .into_iter()
            .map(|name| {
                let value = self.delegate.property(&name).unwrap_or(Value::Null);
                (name, value)
            })
            .collect()
    }

    fn invoke(&self, method: &str, args: BridgeArgs<'_>) -> Result<Value, BridgeError> {
        self.delegate.invoke(method, args)
    }
}

pub struct ThemeSession {
    id: SessionId,
    theme: Arc<Theme>,
    delegate: Arc<dyn SessionDelegate>,
    server: Arc<ContentServer>,
}

impl ThemeSession {
    /// Bind a chat view to a loaded theme and register it with `server`.
    pub fn attach(
        theme: Arc<Theme>,
        delegate: Arc<dyn SessionDelegate>,
        server: Arc<ContentServer>,
    ) -> Result<Arc<Self>, ThemeError> {
        if !theme.is_ready() {
            return Err(ThemeError::NotReady(theme.id().to_string()));
        }
        let session = Arc::new_cyclic(|weak| {
            let id = server.register(ContentHandler::new(weak.clone()));
            Self {
                id,
                theme,
                delegate,
                server,
            }
        });
        info!(theme_id = %session.theme.id(), session_id = %session.id, "session attached");
        session
            .theme
            .publish(ThemeEvent::SessionRegistered(session.id.clone()));
        Ok(session)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn theme(&self) -> &Arc<Theme> {
        &self.theme
    }

    pub fn delegate(&self) -> &Arc<dyn SessionDelegate> {
        &self.delegate
    }

    /// URL the chat view loads.
    pub fn url(&self) -> String {
        self.server.session_url(&self.id)
    }

    /// Prepare the chat view's page and navigate it to the session URL.
    ///
    /// The page gets the theme's utility object and scripts plus this
    /// session's `srvSession` object.
    pub fn setup_page(
        &self,
        page: &dyn SandboxPage,
        utility: Arc<UtilityBridge>,
    ) -> Result<(), ThemeError> {
        if self.theme.is_transparent_background() {
            page.set_transparent_background()?;
        }
        page.register_object(
            UTIL_OBJECT,
            Arc::new(ThemeUtil::new(utility, Arc::downgrade(&self.theme))),
        )?;
        page.register_object(
            SESSION_OBJECT,
            Arc::new(SessionObject::new(self.delegate.clone())),
        )?;
        for script in self.theme.scripts() {
            page.add_user_script(script)?;
        }
        page.load_url(&self.url())
    }
}

impl Drop for ThemeSession {
    fn drop(&mut self) {
        self.server.unregister(&self.id);
        self.theme.sessions().unregister(&self.id);
        self.theme
            .publish(ThemeEvent::SessionUnregistered(self.id.clone()));
        debug!(session_id = %self.id, "session released");
    }
}

impl std::fmt::Debug for ThemeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeSession")
            .field("id", &self.id)
            .field("theme", self.theme.id())
            .finish_non_exhaustive()
    }
}
