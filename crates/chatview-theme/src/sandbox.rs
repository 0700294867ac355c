//! Interface to the embedded page-rendering engine.
//!
//! The runtime never renders anything itself. It drives one sandbox page per
//! theme through [`SandboxPage`], created by a [`SandboxFactory`] that the
//! embedding application supplies. Script-to-native calls come back through
//! the [`BridgeObject`]s registered on the page.

use std::sync::Arc;

use chatview_common::ThemeError;

use crate::bridge::BridgeObject;

/// A script the page runs at document creation, before any document
/// script, on every load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserScript {
    pub name: String,
    pub source: String,
}

impl UserScript {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// One isolated script environment.
pub trait SandboxPage: Send + Sync {
    /// Expose `object` to script under `name`. Called before any script runs.
    fn register_object(&self, name: &str, object: Arc<dyn BridgeObject>) -> Result<(), ThemeError>;

    fn add_user_script(&self, script: UserScript) -> Result<(), ThemeError>;

    /// Replace the page document.
    fn set_html(&self, html: &str, base_url: &str) -> Result<(), ThemeError>;

    /// Navigate the page to `url`.
    fn load_url(&self, url: &str) -> Result<(), ThemeError>;

    fn set_transparent_background(&self) -> Result<(), ThemeError> {
        Ok(())
    }

    /// Run a script snippet in the page. Results come back, if at all,
    /// through bridge calls.
    fn run_script(&self, script: &str) -> Result<(), ThemeError>;
}

/// Creates sandbox pages for themes.
pub trait SandboxFactory: Send + Sync {
    fn create_page(&self, theme_id: &str) -> Result<Arc<dyn SandboxPage>, ThemeError>;
}
