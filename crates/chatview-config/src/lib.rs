//! Chat view runtime configuration.
//!
//! TOML-based configuration for the theme runtime: handshake and generation
//! timeouts, the script namespace, the content server address, theme search
//! paths, and the option/color tables that themes read through the utility
//! bridge. Every section uses serde defaults so partial configs work.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use chatview_config::{load_config, ConfigOptionStore};
//!
//! let config = load_config().expect("failed to load config");
//! let options = ConfigOptionStore::from_config(&config);
//! println!("namespace: {}", config.runtime.js_namespace);
//! # let _ = options;
//! ```

pub mod options;
pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use options::{ConfigOptionStore, OptionStore};
pub use schema::{ChatViewConfig, RuntimeConfig, ServerConfig, ThemesConfig};
pub use toml_loader::{default_config_path, load_from_path};

use chatview_common::ConfigError;

/// Load config from the platform default path and validate it.
///
/// Creates a commented default file when none exists yet.
pub fn load_config() -> Result<ChatViewConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &ChatViewConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
