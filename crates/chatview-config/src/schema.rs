//! Configuration schema types.
//!
//! All structs use `serde(default)` so partial configs work correctly.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the chat view theme runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatViewConfig {
    pub runtime: RuntimeConfig,
    pub server: ServerConfig,
    pub themes: ThemesConfig,
    /// Client options exposed to themes through `psiOption`. Dotted option
    /// names address nested tables.
    pub options: toml::Table,
    /// Named colors exposed to themes through `colorOption`.
    pub colors: BTreeMap<String, String>,
}

/// Theme handshake and per-session generation behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How long a theme script may take to report loading finished/failed.
    pub load_timeout_ms: u64,
    /// How long a request waits for script-generated session HTML.
    pub generation_timeout_ms: u64,
    /// Global script object holding the theme's public API.
    pub js_namespace: String,
    /// Resolve theme files ignoring case unless the theme says otherwise.
    pub case_insensitive_fs: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: 10_000,
            generation_timeout_ms: 15_000,
            js_namespace: "psi".into(),
            case_insensitive_fs: false,
        }
    }
}

impl RuntimeConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }
}

/// Address of the embedded content server the chat views load from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7878/".into(),
        }
    }
}

/// Where theme bundles are searched for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemesConfig {
    /// Resource roots, each containing a `chatview/` directory. Empty means
    /// the platform data directory followed by `./themes`.
    pub search_paths: Vec<PathBuf>,
}

impl ThemesConfig {
    /// Configured search paths, or the platform defaults when none are set.
    pub fn resolved_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Some(data_dir) = dirs::data_dir() {
            paths.push(data_dir.join("chatview").join("themes"));
        }
        paths.push(PathBuf::from("themes"));
        paths
    }
}
