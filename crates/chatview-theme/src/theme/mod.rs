//! A loaded chat view theme.
//!
//! A [`Theme`] is shared (`Arc`) by the loader bridge, the utility bridge
//! and every session rendering it. Script-driven state lives behind a
//! mutex that is never held while calling into the sandbox page or a
//! completion callback.

mod files;
mod id;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use chatview_common::{EventBus, SessionId, ThemeError, ThemeEvent};
use serde_json::json;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::bridge::SessionRegistry;
use crate::cache::ResourceCache;
use crate::ipc::js_call;
use crate::provider::{ProviderKind, ThemeBundle};
use crate::sandbox::{SandboxPage, UserScript};
use crate::session::SessionDelegate;

pub use files::{mime_from_extension, read_file, resolve_file};
pub use id::ThemeId;

/// Completion callback of a theme load. Called exactly once.
pub type LoadCallback = Box<dyn FnOnce(Result<(), ThemeError>) + Send>;

/// Default avatar bytes set by the theme, optionally scoped to a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultAvatar {
    pub data: Vec<u8>,
    pub host: Option<String>,
}

/// Per-theme settings taken from the runtime configuration.
#[derive(Debug, Clone)]
pub(crate) struct ThemeSettings {
    pub server_url: String,
    pub generation_timeout: Duration,
    pub js_namespace: String,
    pub case_insensitive_fs: bool,
}

#[derive(Default)]
struct ThemeState {
    ready: bool,
    name: String,
    html: String,
    http_rel_path: String,
    prepare_session_html: bool,
    transparent_background: bool,
    case_insensitive_fs: bool,
    default_avatar: Option<DefaultAvatar>,
    avatar_size: Option<(u32, u32)>,
    scripts: Vec<UserScript>,
    js_namespace: String,
    load_error: Option<String>,
    on_done: Option<LoadCallback>,
    load_timeout: Option<AbortHandle>,
}

pub struct Theme {
    id: ThemeId,
    bundle: ThemeBundle,
    kind: ProviderKind,
    server_url: String,
    generation_timeout: Duration,
    cache: ResourceCache,
    sessions: SessionRegistry,
    events: Option<Arc<EventBus>>,
    page: OnceLock<Arc<dyn SandboxPage>>,
    state: Mutex<ThemeState>,
}

impl Theme {
    pub(crate) fn new(
        id: ThemeId,
        bundle: ThemeBundle,
        kind: ProviderKind,
        settings: ThemeSettings,
        events: Option<Arc<EventBus>>,
    ) -> Arc<Self> {
        let name = id.name().to_string();
        Arc::new(Self {
            id,
            bundle,
            kind,
            server_url: settings.server_url,
            generation_timeout: settings.generation_timeout,
            cache: ResourceCache::new(),
            sessions: SessionRegistry::new(),
            events,
            page: OnceLock::new(),
            state: Mutex::new(ThemeState {
                name,
                js_namespace: settings.js_namespace,
                case_insensitive_fs: settings.case_insensitive_fs,
                ..ThemeState::default()
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, ThemeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- identity --------------------------------------------------------

    pub fn id(&self) -> &ThemeId {
        &self.id
    }

    /// Display name; the bundle directory name until the script sets one.
    pub fn name(&self) -> String {
        self.state().name.clone()
    }

    /// Theme bundle directory.
    pub fn file_path(&self) -> &Path {
        &self.bundle.base_path
    }

    pub fn bundle(&self) -> &ThemeBundle {
        &self.bundle
    }

    /// Whether the theme renders group chats.
    pub fn is_muc(&self) -> bool {
        self.kind.is_group_capable()
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn generation_timeout(&self) -> Duration {
        self.generation_timeout
    }

    // -- script-visible state ---------------------------------------------

    pub fn is_ready(&self) -> bool {
        self.state().ready
    }

    pub fn html(&self) -> String {
        self.state().html.clone()
    }

    pub fn http_rel_path(&self) -> String {
        self.state().http_rel_path.clone()
    }

    pub fn prepare_session_html(&self) -> bool {
        self.state().prepare_session_html
    }

    pub fn is_transparent_background(&self) -> bool {
        self.state().transparent_background
    }

    pub fn case_insensitive_fs(&self) -> bool {
        self.state().case_insensitive_fs
    }

    pub fn default_avatar(&self) -> Option<DefaultAvatar> {
        self.state().default_avatar.clone()
    }

    pub fn avatar_size(&self) -> Option<(u32, u32)> {
        self.state().avatar_size
    }

    /// Scripts injected into the theme page, in injection order. Session
    /// pages get the same scripts.
    pub fn scripts(&self) -> Vec<UserScript> {
        self.state().scripts.clone()
    }

    pub fn js_namespace(&self) -> String {
        self.state().js_namespace.clone()
    }

    /// Reason of the last failed load, if any.
    pub fn load_error(&self) -> Option<String> {
        self.state().load_error.clone()
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn page(&self) -> Option<Arc<dyn SandboxPage>> {
        self.page.get().cloned()
    }

    pub(crate) fn set_name(&self, name: String) {
        self.state().name = name;
    }

    pub(crate) fn set_html(&self, html: String) {
        self.state().html = html;
    }

    pub(crate) fn set_http_rel_path(&self, path: String) {
        self.state().http_rel_path = path;
    }

    pub(crate) fn set_prepare_session_html(&self, enabled: bool) {
        self.state().prepare_session_html = enabled;
    }

    pub(crate) fn set_transparent_background(&self, enabled: bool) {
        self.state().transparent_background = enabled;
    }

    pub(crate) fn set_case_insensitive_fs(&self, enabled: bool) {
        self.state().case_insensitive_fs = enabled;
    }

    pub(crate) fn set_default_avatar(&self, avatar: DefaultAvatar) {
        self.state().default_avatar = Some(avatar);
    }

    pub(crate) fn set_avatar_size(&self, width: u32, height: u32) {
        self.state().avatar_size = Some((width, height));
    }

    pub(crate) fn set_js_namespace(&self, namespace: String) {
        self.state().js_namespace = namespace;
    }

    pub(crate) fn push_script(&self, script: UserScript) {
        self.state().scripts.push(script);
    }

    // -- files -----------------------------------------------------------

    /// Contents of a file inside the bundle, `None` when it does not exist.
    pub fn load_data(&self, rel: &str) -> Option<Vec<u8>> {
        read_file(&self.bundle.base_path, rel, self.case_insensitive_fs())
    }

    /// Contents of a file next to the adapter script.
    pub fn load_adapter_file(&self, name: &str) -> Option<Vec<u8>> {
        let dir = self.bundle.adapter_dir.as_ref()?;
        read_file(dir, name, false)
    }

    pub fn screenshot(&self) -> Option<Vec<u8>> {
        self.load_data("screenshot.png")
    }

    // -- loading ---------------------------------------------------------

    pub(crate) fn attach_page(&self, page: Arc<dyn SandboxPage>) -> Result<(), ThemeError> {
        self.page
            .set(page)
            .map_err(|_| ThemeError::Sandbox(format!("theme '{}' already has a page", self.id)))
    }

    pub(crate) fn set_load_callback(&self, on_done: LoadCallback) {
        let mut state = self.state();
        state.ready = false;
        state.load_error = None;
        state.on_done = Some(on_done);
    }

    pub(crate) fn set_load_timeout(&self, handle: AbortHandle) {
        let mut state = self.state();
        if state.on_done.is_some() {
            state.load_timeout = Some(handle);
        } else {
            // Already resolved.
            handle.abort();
        }
    }

    /// Drop the pending load without calling its callback.
    pub(crate) fn cancel_load(&self) {
        let timeout = {
            let mut state = self.state();
            state.on_done = None;
            state.load_timeout.take()
        };
        if let Some(timeout) = timeout {
            timeout.abort();
        }
    }

    /// Resolve the pending load. Returns `false` if it was already resolved.
    pub(crate) fn complete_load(&self, result: Result<(), ThemeError>) -> bool {
        let (on_done, timeout) = {
            let mut state = self.state();
            let Some(on_done) = state.on_done.take() else {
                return false;
            };
            match &result {
                Ok(()) => {
                    state.ready = true;
                    state.load_error = None;
                }
                Err(e) => {
                    state.ready = false;
                    state.load_error = Some(match e {
                        ThemeError::ScriptFailure(reason) => reason.clone(),
                        other => other.to_string(),
                    });
                }
            }
            (on_done, state.load_timeout.take())
        };

        if let Some(timeout) = timeout {
            timeout.abort();
        }

        match &result {
            Ok(()) => {
                info!(theme_id = %self.id, "theme loaded");
                self.publish(ThemeEvent::ThemeLoaded {
                    theme_id: self.id.to_string(),
                });
            }
            Err(e) => {
                warn!(theme_id = %self.id, error = %e, "theme failed to load");
                self.publish(ThemeEvent::ThemeLoadFailed {
                    theme_id: self.id.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        deliver(on_done, result);
        true
    }

    pub(crate) fn publish(&self, event: ThemeEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    // -- scripting -------------------------------------------------------

    /// Run `<namespace>.<path>(args)` in the theme page.
    pub fn call_script(&self, path: &str, args: &[serde_json::Value]) -> Result<(), ThemeError> {
        let page = self
            .page()
            .ok_or_else(|| ThemeError::Sandbox(format!("theme '{}' has no page", self.id)))?;
        page.run_script(&js_call(&self.js_namespace(), path, args))
    }

    /// Register a pending generation for one session and ask the theme
    /// script for its document.
    ///
    /// Fails with `GenerationPending` if the session already waits for one.
    /// The session stays registered until the answer arrives, the wait
    /// times out or the session is unregistered.
    pub fn request_session_html(
        &self,
        session_id: &SessionId,
        delegate: Arc<dyn SessionDelegate>,
    ) -> Result<oneshot::Receiver<String>, ThemeError> {
        let rx = self.sessions.begin_generation(session_id.clone(), delegate)?;

        debug!(theme_id = %self.id, session_id = %session_id, "requesting session html");
        if let Err(e) = self.call_script(
            "adapter.generateSessionHtml",
            &[json!(session_id.as_str())],
        ) {
            self.sessions.cancel(session_id);
            return Err(e);
        }
        Ok(rx)
    }

    /// Wait for the `setSessionHtml` answer to a
    /// [`request_session_html`](Self::request_session_html).
    ///
    /// Fails with `GenerationTimeout` after the configured timeout and
    /// `GenerationCancelled` when the session is unregistered meanwhile.
    pub async fn await_session_html(
        &self,
        session_id: &SessionId,
        rx: oneshot::Receiver<String>,
    ) -> Result<String, ThemeError> {
        match tokio::time::timeout(self.generation_timeout, rx).await {
            Ok(Ok(html)) => Ok(html),
            Ok(Err(_)) => Err(ThemeError::GenerationCancelled(session_id.clone())),
            Err(_) => {
                self.sessions.cancel(session_id);
                warn!(
                    theme_id = %self.id,
                    session_id = %session_id,
                    timeout = ?self.generation_timeout,
                    "session html generation timed out"
                );
                Err(ThemeError::GenerationTimeout(session_id.clone()))
            }
        }
    }
}

impl Drop for Theme {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timeout) = state.load_timeout.take() {
            timeout.abort();
        }
        if let Some(on_done) = state.on_done.take() {
            warn!(theme_id = %self.id, "theme released while loading");
            deliver(
                on_done,
                Err(ThemeError::Sandbox(format!(
                    "theme '{}' was released before loading finished",
                    self.id
                ))),
            );
        }
    }
}

/// Run a load callback off the caller's stack: on the current runtime when
/// there is one, else on a fresh thread.
fn deliver(on_done: LoadCallback, result: Result<(), ThemeError>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { on_done(result) });
        }
        Err(_) => {
            std::thread::spawn(move || on_done(result));
        }
    }
}

impl std::fmt::Debug for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Theme")
            .field("id", &self.id)
            .field("base_path", &self.bundle.base_path)
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}
