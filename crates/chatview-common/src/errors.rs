use std::path::PathBuf;
use std::time::Duration;

use crate::id::SessionId;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures of the theme runtime: loading, session attachment and
/// per-session HTML generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThemeError {
    #[error("invalid theme id '{0}': expected <type>/<name>")]
    InvalidId(String),

    #[error("theme path not found: {0}")]
    PathNotFound(String),

    #[error("theme script reported failure: {0}")]
    ScriptFailure(String),

    #[error("theme load timed out after {0:?}")]
    LoadTimeout(Duration),

    #[error("theme '{0}' is not ready")]
    NotReady(String),

    #[error("session html generation already pending for {0}")]
    GenerationPending(SessionId),

    #[error("session html generation timed out for {0}")]
    GenerationTimeout(SessionId),

    #[error("session html generation cancelled for {0}")]
    GenerationCancelled(SessionId),

    #[error("sandbox error: {0}")]
    Sandbox(String),

    #[error("theme i/o error: {0}")]
    Io(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ChatViewError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Theme(#[from] ThemeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
