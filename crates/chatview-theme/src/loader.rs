//! Theme loading and the script handshake.

use std::path::Path;
use std::sync::Arc;

use chatview_common::{EventBus, ThemeError};
use chatview_config::RuntimeConfig;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::bridge::{BridgeObject, LoaderBridge, ThemeUtil, UtilityBridge, LOADER_OBJECT, UTIL_OBJECT};
use crate::ipc::{bootstrap_document, js_define_object, BRIDGE_SHIM_SCRIPT};
use crate::provider::{ThemeBundle, ThemeProvider};
use crate::sandbox::{SandboxFactory, UserScript};
use crate::theme::{LoadCallback, Theme, ThemeId, ThemeSettings};

/// Name of the injected bridge runtime script.
pub const SHIM_SCRIPT_NAME: &str = "chatview-bridge";

/// Loads themes from a provider into sandbox pages.
pub struct ThemeLoader {
    provider: Arc<dyn ThemeProvider>,
    utility: Arc<UtilityBridge>,
    sandboxes: Arc<dyn SandboxFactory>,
    runtime: RuntimeConfig,
    server_url: String,
    events: Option<Arc<EventBus>>,
}

impl ThemeLoader {
    pub fn new(
        provider: Arc<dyn ThemeProvider>,
        utility: Arc<UtilityBridge>,
        sandboxes: Arc<dyn SandboxFactory>,
        runtime: RuntimeConfig,
        server_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            utility,
            sandboxes,
            runtime,
            server_url: server_url.into(),
            events: None,
        }
    }

    /// Publish theme and session lifecycle events on `events`.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn utility(&self) -> &Arc<UtilityBridge> {
        &self.utility
    }

    pub fn provider(&self) -> &Arc<dyn ThemeProvider> {
        &self.provider
    }

    /// Ids of every bundle of `theme_type`.
    pub fn list_themes(&self, theme_type: &str) -> Vec<String> {
        self.provider.list_themes(theme_type)
    }

    /// Start loading theme `id`.
    ///
    /// Fails synchronously, without calling `on_done`, when the id is
    /// malformed, the bundle is missing, one of its scripts cannot be read
    /// or the sandbox refuses setup. Otherwise `on_done` is called exactly
    /// once and never from within this call: when the script reports
    /// success or failure, or when the load timeout expires.
    pub fn load<F>(&self, id: &str, on_done: F) -> Result<Arc<Theme>, ThemeError>
    where
        F: FnOnce(Result<(), ThemeError>) + Send + 'static,
    {
        let id = ThemeId::parse(id)?;
        let bundle = ThemeBundle::resolve(self.provider.as_ref(), &id)?;
        debug!(theme_id = %id, path = %bundle.base_path.display(), "theme bundle resolved");
        let scripts = read_scripts(&id, &bundle)?;

        let theme = Theme::new(
            id,
            bundle,
            self.provider.kind(),
            ThemeSettings {
                server_url: self.server_url.clone(),
                generation_timeout: self.runtime.generation_timeout(),
                js_namespace: self.runtime.js_namespace.clone(),
                case_insensitive_fs: self.runtime.case_insensitive_fs,
            },
            self.events.clone(),
        );

        let page = self.sandboxes.create_page(&theme.id().to_string())?;
        theme.attach_page(page.clone())?;

        let loader: Arc<dyn BridgeObject> = Arc::new(LoaderBridge::new(Arc::downgrade(&theme)));
        let util: Arc<dyn BridgeObject> = Arc::new(ThemeUtil::new(
            self.utility.clone(),
            Arc::downgrade(&theme),
        ));
        page.register_object(LOADER_OBJECT, loader.clone())?;
        page.register_object(UTIL_OBJECT, util.clone())?;

        for script in scripts {
            debug!(theme_id = %theme.id(), script = %script.name, "injecting script");
            page.add_user_script(script.clone())?;
            theme.push_script(script);
        }

        theme.set_load_callback(Box::new(on_done) as LoadCallback);
        self.arm_timeout(&theme);

        let definitions = [(LOADER_OBJECT, &loader), (UTIL_OBJECT, &util)]
            .iter()
            .map(|(name, object)| js_define_object(name, &object.methods(), &object.properties()))
            .collect::<Vec<_>>()
            .join("\n");
        if let Err(e) = page.set_html(&bootstrap_document(&definitions), &self.server_url) {
            theme.cancel_load();
            return Err(e);
        }

        info!(theme_id = %theme.id(), "theme loading started");
        Ok(theme)
    }

    /// [`load`](Self::load), resolved when the script handshake finishes.
    pub async fn load_async(&self, id: &str) -> Result<Arc<Theme>, ThemeError> {
        let (tx, rx) = oneshot::channel();
        let theme = self.load(id, move |result| {
            let _ = tx.send(result);
        })?;
        match rx.await {
            Ok(Ok(())) => Ok(theme),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ThemeError::Sandbox(format!(
                "load of '{}' was abandoned",
                theme.id()
            ))),
        }
    }

    fn arm_timeout(&self, theme: &Arc<Theme>) {
        let timeout = self.runtime.load_timeout();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(theme_id = %theme.id(), "no async runtime, load timeout disabled");
            return;
        };
        // Keeps the theme alive until the load resolves and aborts this task.
        let pending = theme.clone();
        let task = handle.spawn(async move {
            tokio::time::sleep(timeout).await;
            pending.complete_load(Err(ThemeError::LoadTimeout(timeout)));
        });
        theme.set_load_timeout(task.abort_handle());
    }
}

/// Bridge shim, then the shared utility script, then the adapter. Missing
/// scripts are skipped; unreadable ones fail the load.
fn read_scripts(id: &ThemeId, bundle: &ThemeBundle) -> Result<Vec<UserScript>, ThemeError> {
    let mut scripts = vec![UserScript::new(SHIM_SCRIPT_NAME, BRIDGE_SHIM_SCRIPT)];
    for path in [&bundle.util_script, &bundle.adapter_script] {
        match path {
            Some(path) => scripts.push(read_script(path)?),
            None => warn!(theme_id = %id, "theme script not found, skipping"),
        }
    }
    Ok(scripts)
}

fn read_script(path: &Path) -> Result<UserScript, ThemeError> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| ThemeError::Io(format!("{}: {e}", path.display())))?;
    Ok(UserScript::new(path.display().to_string(), source))
}
