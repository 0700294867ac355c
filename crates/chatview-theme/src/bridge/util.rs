use std::sync::{Arc, Weak};

use chatview_common::{Color, PresenceStatus};
use chatview_config::validation::is_js_identifier;
use chatview_config::OptionStore;
use serde_json::{Map, Value};
use tracing::debug;

use super::format::{format_qt_datetime, parse_script_datetime, strftime};
use super::{BridgeError, BridgeObject, UTIL_OBJECT};
use crate::ipc::BridgeArgs;
use crate::theme::Theme;

const METHODS: &[&str] = &[
    "loadFromCacheMulti",
    "cache",
    "psiOption",
    "colorOption",
    "formatDate",
    "strftime",
    "console",
    "status2text",
    "hex2rgba",
];

const JS_NAMESPACE_PROPERTY: &str = "jsNamespace";

/// Process-wide helpers exposed to theme scripts as `srvUtil`.
///
/// Created once by the embedding application and shared by every theme.
pub struct UtilityBridge {
    options: Arc<dyn OptionStore>,
}

impl UtilityBridge {
    pub fn new(options: Arc<dyn OptionStore>) -> Self {
        Self { options }
    }

    /// Option value encoded as a JSON literal; `null` when unset.
    pub fn psi_option(&self, name: &str) -> String {
        let value = self.options.option(name).unwrap_or(Value::Null);
        serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string())
    }

    /// Color encoded as a JSON string literal; `null` when unset.
    pub fn color_option(&self, name: &str) -> String {
        match self.options.color(name) {
            Some(color) => serde_json::to_string(&color).unwrap_or_else(|_| "null".to_string()),
            None => "null".to_string(),
        }
    }

    /// Qt-style date formatting in local time. Unreadable dates give "".
    pub fn format_date(&self, date: &Value, format: &str) -> String {
        match parse_script_datetime(date) {
            Some(dt) => format_qt_datetime(&dt, format),
            None => {
                debug!(date = %date, "formatDate: unreadable date");
                String::new()
            }
        }
    }

    pub fn strftime(&self, date: &Value, format: &str) -> String {
        match parse_script_datetime(date) {
            Some(dt) => strftime(&dt, format),
            None => {
                debug!(date = %date, "strftime: unreadable date");
                String::new()
            }
        }
    }

    pub fn console(&self, text: &str) {
        debug!(target: "chatview::console", "{text}");
    }

    pub fn status_to_text(&self, code: i64) -> &'static str {
        PresenceStatus::from_code(code).label()
    }

    /// `rgba(r,g,b,a)` with `a` on the 0-255 scale. Invalid hex reads as
    /// black.
    pub fn hex_to_rgba(&self, hex: &str, opacity: f32) -> String {
        Color::from_hex(hex)
            .unwrap_or(Color::from_rgba(0, 0, 0, 255))
            .with_opacity(opacity)
            .to_rgba_string()
    }
}

/// The utility bridge as registered on one theme's page: the shared helpers
/// plus that theme's cache and namespace.
pub struct ThemeUtil {
    shared: Arc<UtilityBridge>,
    theme: Weak<Theme>,
}

impl ThemeUtil {
    pub fn new(shared: Arc<UtilityBridge>, theme: Weak<Theme>) -> Self {
        Self { shared, theme }
    }

    fn theme(&self) -> Result<Arc<Theme>, BridgeError> {
        self.theme.upgrade().ok_or(BridgeError::ThemeGone)
    }
}

impl BridgeObject for ThemeUtil {
    fn methods(&self) -> Vec<String> {
        METHODS.iter().map(|m| m.to_string()).collect()
    }

    fn properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        if let Some(theme) = self.theme.upgrade() {
            props.insert(
                JS_NAMESPACE_PROPERTY.into(),
                Value::String(theme.js_namespace()),
            );
        }
        props
    }

    fn set_property(&self, name: &str, value: &Value) -> Result<(), BridgeError> {
        if name != JS_NAMESPACE_PROPERTY {
            return Err(BridgeError::ReadOnlyProperty(name.to_string()));
        }
        let invalid = |reason: &str| BridgeError::InvalidProperty {
            property: name.to_string(),
            reason: reason.to_string(),
        };
        let ns = value.as_str().ok_or_else(|| invalid("expected a string"))?;
        if !is_js_identifier(ns) {
            return Err(invalid("not a script identifier"));
        }
        let theme = self.theme()?;
        if theme.is_ready() {
            return Err(invalid("fixed once the theme has loaded"));
        }
        debug!(theme_id = %theme.id(), namespace = ns, "script namespace changed");
        theme.set_js_namespace(ns.to_string());
        Ok(())
    }

    fn invoke(&self, method: &str, args: BridgeArgs<'_>) -> Result<Value, BridgeError> {
        let shared = &self.shared;
        match method {
            "loadFromCacheMulti" => {
                let theme = self.theme()?;
                let keys: Vec<&str> = args.array(0)?.iter().filter_map(Value::as_str).collect();
                let found = theme.cache().get_many(keys.iter().copied());
                let out = keys
                    .into_iter()
                    .map(|key| {
                        let value = found
                            .get(key)
                            .map(|v| v.to_script_value())
                            .unwrap_or(Value::Null);
                        (key.to_string(), value)
                    })
                    .collect();
                Ok(Value::Object(out))
            }
            "cache" => {
                let theme = self.theme()?;
                Ok(theme
                    .cache()
                    .get(args.str(0)?)
                    .map(|v| v.to_script_value())
                    .unwrap_or(Value::Null))
            }
            "psiOption" => Ok(Value::String(shared.psi_option(args.str(0)?))),
            "colorOption" => Ok(Value::String(shared.color_option(args.str(0)?))),
            "formatDate" => Ok(Value::String(
                shared.format_date(args.value(0)?, args.str(1)?),
            )),
            "strftime" => Ok(Value::String(shared.strftime(args.value(0)?, args.str(1)?))),
            "console" => {
                let text = match args.value(0)? {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                shared.console(&text);
                Ok(Value::Null)
            }
            "status2text" => Ok(Value::String(
                shared.status_to_text(args.i64(0)?).to_string(),
            )),
            "hex2rgba" => Ok(Value::String(
                shared.hex_to_rgba(args.str(0)?, args.f64(1)? as f32),
            )),
            _ => Err(BridgeError::UnknownMethod {
                object: UTIL_OBJECT.to_string(),
                method: method.to_string(),
            }),
        }
    }
}
