//! Theme bundle discovery.
//!
//! A provider owns one or more resource roots. Each root may contain a
//! `chatview/` tree laid out as:
//!
//! ```text
//! chatview/util.js                   shared utility script
//! chatview/<type>/adapter.js         adapter for all themes of <type>
//! chatview/<type>/<name>/...         the theme bundle itself
//! ```

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use chatview_common::ThemeError;
use tracing::debug;

use crate::theme::ThemeId;

/// Directory holding all chat view bundles inside a provider root.
pub const CHATVIEW_DIR: &str = "chatview";

/// Whether a provider serves one-to-one chats or group chats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OneToOne,
    GroupChat,
}

impl ProviderKind {
    pub fn is_group_capable(self) -> bool {
        matches!(self, ProviderKind::GroupChat)
    }
}

/// Resolves theme resources to paths on disk.
pub trait ThemeProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Absolute path of `rel` under the first root that has it.
    fn theme_path(&self, rel: &str) -> Option<PathBuf>;

    /// Ids (`<type>/<name>`) of every bundle of the given type.
    fn list_themes(&self, theme_type: &str) -> Vec<String>;
}

/// [`ThemeProvider`] over a list of directories, searched in order.
#[derive(Debug, Clone)]
pub struct DirThemeProvider {
    roots: Vec<PathBuf>,
    kind: ProviderKind,
}

impl DirThemeProvider {
    pub fn new(roots: Vec<PathBuf>, kind: ProviderKind) -> Self {
        Self { roots, kind }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl ThemeProvider for DirThemeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn theme_path(&self, rel: &str) -> Option<PathBuf> {
        if !is_plain_relative(rel) {
            debug!(path = rel, "rejected non-relative theme path");
            return None;
        }
        self.roots
            .iter()
            .map(|root| root.join(rel))
            .find(|candidate| candidate.exists())
    }

    fn list_themes(&self, theme_type: &str) -> Vec<String> {
        if !is_plain_relative(theme_type) {
            return Vec::new();
        }
        let mut names = BTreeSet::new();
        for root in &self.roots {
            let dir = root.join(CHATVIEW_DIR).join(theme_type);
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                if entry.path().is_dir() {
                    if let Some(name) = entry.file_name().to_str() {
                        names.insert(format!("{theme_type}/{name}"));
                    }
                }
            }
        }
        names.into_iter().collect()
    }
}

/// Only normal components: no root, no `..`, no `.`.
fn is_plain_relative(rel: &str) -> bool {
    !rel.is_empty()
        && Path::new(rel)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// On-disk locations of one theme and its scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeBundle {
    /// `chatview/<type>/<name>`
    pub base_path: PathBuf,
    /// `chatview/<type>`
    pub adapter_dir: Option<PathBuf>,
    pub util_script: Option<PathBuf>,
    pub adapter_script: Option<PathBuf>,
}

impl ThemeBundle {
    /// Locate the bundle for `id`. Fails when the base directory is missing;
    /// the scripts are optional here and checked by the loader.
    pub fn resolve(provider: &dyn ThemeProvider, id: &ThemeId) -> Result<Self, ThemeError> {
        let rel = format!("{CHATVIEW_DIR}/{id}");
        let base_path = provider
            .theme_path(&rel)
            .filter(|p| p.is_dir())
            .ok_or(ThemeError::PathNotFound(rel))?;

        Ok(Self {
            base_path,
            adapter_dir: provider.theme_path(&format!("{CHATVIEW_DIR}/{}", id.theme_type())),
            util_script: provider.theme_path(&format!("{CHATVIEW_DIR}/util.js")),
            adapter_script: provider
                .theme_path(&format!("{CHATVIEW_DIR}/{}/adapter.js", id.theme_type())),
        })
    }
}
