//! Option and color lookup for theme scripts.
//!
//! Themes read client options (`psiOption`) and named colors
//! (`colorOption`) through the utility bridge. The bridge only sees the
//! [`OptionStore`] trait; [`ConfigOptionStore`] serves both tables from the
//! loaded [`ChatViewConfig`].

use std::collections::BTreeMap;

use crate::schema::ChatViewConfig;

/// Read-only view of client options and colors.
pub trait OptionStore: Send + Sync {
    /// Value of a dotted option name, or `None` when unset.
    fn option(&self, name: &str) -> Option<serde_json::Value>;

    /// Color registered under `name`, as a CSS color string.
    fn color(&self, name: &str) -> Option<String>;
}

/// [`OptionStore`] backed by the `[options]` and `[colors]` config tables.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptionStore {
    options: toml::Table,
    colors: BTreeMap<String, String>,
}

impl ConfigOptionStore {
    pub fn from_config(config: &ChatViewConfig) -> Self {
        Self {
            options: config.options.clone(),
            colors: config.colors.clone(),
        }
    }

    /// Set an option value, creating intermediate tables for dotted names.
    pub fn with_option(mut self, name: &str, value: impl Into<toml::Value>) -> Self {
        let segments: Vec<&str> = name.split('.').collect();
        insert_dotted(&mut self.options, &segments, value.into());
        self
    }

    pub fn with_color(mut self, name: impl Into<String>, color: impl Into<String>) -> Self {
        self.colors.insert(name.into(), color.into());
        self
    }

    fn lookup(&self, name: &str) -> Option<&toml::Value> {
        // A quoted key containing dots takes precedence over nested tables.
        if let Some(value) = self.options.get(name) {
            return Some(value);
        }
        let mut segments = name.split('.');
        let mut current = self.options.get(segments.next()?)?;
        for segment in segments {
            current = current.as_table()?.get(segment)?;
        }
        Some(current)
    }
}

fn insert_dotted(table: &mut toml::Table, segments: &[&str], value: toml::Value) {
    match segments {
        [] => {}
        [last] => {
            table.insert(last.to_string(), value);
        }
        [first, rest @ ..] => {
            let entry = table
                .entry(first.to_string())
                .or_insert(toml::Value::Table(toml::Table::new()));
            if !entry.is_table() {
                *entry = toml::Value::Table(toml::Table::new());
            }
            if let toml::Value::Table(child) = entry {
                insert_dotted(child, rest, value);
            }
        }
    }
}

impl OptionStore for ConfigOptionStore {
    fn option(&self, name: &str) -> Option<serde_json::Value> {
        let value = self.lookup(name)?;
        match serde_json::to_value(value) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!(option = name, error = %e, "option value not representable as JSON");
                None
            }
        }
    }

    fn color(&self, name: &str) -> Option<String> {
        self.colors.get(name).cloned()
    }
}
