//! Configuration validation.
//!
//! Checks numeric ranges, the script namespace, the server URL and color
//! formats, collecting every problem into a single `ConfigError`.

use chatview_common::{Color, ConfigError};

use crate::schema::ChatViewConfig;

/// Upper bound for both handshake and generation timeouts.
const MAX_TIMEOUT_MS: u64 = 300_000;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &ChatViewConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_runtime(&mut errors, config);
    validate_server(&mut errors, config);
    validate_colors(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_runtime(errors: &mut Vec<String>, config: &ChatViewConfig) {
    let rt = &config.runtime;
    if rt.load_timeout_ms == 0 || rt.load_timeout_ms > MAX_TIMEOUT_MS {
        errors.push(format!(
            "runtime.load_timeout_ms must be 1-{MAX_TIMEOUT_MS}, got {}",
            rt.load_timeout_ms
        ));
    }
    if rt.generation_timeout_ms == 0 || rt.generation_timeout_ms > MAX_TIMEOUT_MS {
        errors.push(format!(
            "runtime.generation_timeout_ms must be 1-{MAX_TIMEOUT_MS}, got {}",
            rt.generation_timeout_ms
        ));
    }
    if !is_js_identifier(&rt.js_namespace) {
        errors.push(format!(
            "runtime.js_namespace must be a script identifier, got '{}'",
            rt.js_namespace
        ));
    }
}

fn validate_server(errors: &mut Vec<String>, config: &ChatViewConfig) {
    let url = &config.server.base_url;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("server.base_url must be an http(s) URL, got '{url}'"));
    }
    if url.contains('?') || url.contains('#') {
        errors.push(format!(
            "server.base_url must not carry a query or fragment, got '{url}'"
        ));
    }
}

fn validate_colors(errors: &mut Vec<String>, config: &ChatViewConfig) {
    for (name, value) in &config.colors {
        if Color::from_hex(value).is_none() {
            errors.push(format!("colors.{name}: invalid hex color '{value}'"));
        }
    }
}

/// `[A-Za-z_$][A-Za-z0-9_$]*`
pub fn is_js_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
