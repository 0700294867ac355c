//! Wire protocol between native bridge objects and theme scripts.
//!
//! Messages flow in both directions:
//! - **Script -> native**: the shim posts
//!   `{"object": "srvLoader", "method": "setHtml", "args": [...], "id": 7}`
//!   through `window.ipc.postMessage`. The sandbox hands the raw string to
//!   [`BridgeHost::handle_message`](crate::bridge::BridgeHost::handle_message).
//! - **Native -> script**: native code runs script snippets in the page,
//!   either to call into the theme namespace ([`js_call`]) or to resolve
//!   the promise of a call that carried an `id` ([`js_resolve_reply`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bridge::BridgeError;

/// A bridge call posted by script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeMessage {
    /// Registered name of the target object (`srvLoader`, `srvUtil`, ...).
    pub object: String,
    /// Method name as script sees it (camelCase).
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
    /// Present when script awaits a reply.
    #[serde(default)]
    pub id: Option<u64>,
}

impl BridgeMessage {
    /// Parse a bridge message from the raw JSON string posted by script.
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn new(object: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            object: object.into(),
            method: method.into(),
            args,
            id: None,
        }
    }

    pub fn with_reply_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }
}

/// Positional arguments of a bridge call with typed accessors.
///
/// Accessors fail with [`BridgeError::BadArgument`] so a malformed call is
/// reported instead of silently coerced.
#[derive(Debug, Clone, Copy)]
pub struct BridgeArgs<'a> {
    method: &'a str,
    values: &'a [Value],
}

impl<'a> BridgeArgs<'a> {
    pub fn new(method: &'a str, values: &'a [Value]) -> Self {
        Self { method, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Result<&'a Value, BridgeError> {
        self.values
            .get(index)
            .ok_or_else(|| self.bad(index, "a value"))
    }

    pub fn str(&self, index: usize) -> Result<&'a str, BridgeError> {
        self.value(index)?
            .as_str()
            .ok_or_else(|| self.bad(index, "a string"))
    }

    /// Optional string; `null` and a missing argument both read as `None`.
    pub fn opt_str(&self, index: usize) -> Result<Option<&'a str>, BridgeError> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(self.bad(index, "a string or null")),
        }
    }

    /// Boolean with a default for a missing argument.
    pub fn bool_or(&self, index: usize, default: bool) -> Result<bool, BridgeError> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.bad(index, "a boolean")),
        }
    }

    pub fn f64(&self, index: usize) -> Result<f64, BridgeError> {
        self.value(index)?
            .as_f64()
            .ok_or_else(|| self.bad(index, "a number"))
    }

    pub fn i64(&self, index: usize) -> Result<i64, BridgeError> {
        let value = self.value(index)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| self.bad(index, "an integer"))
    }

    pub fn u32(&self, index: usize) -> Result<u32, BridgeError> {
        u32::try_from(self.i64(index)?).map_err(|_| self.bad(index, "a non-negative integer"))
    }

    pub fn object(&self, index: usize) -> Result<&'a serde_json::Map<String, Value>, BridgeError> {
        self.value(index)?
            .as_object()
            .ok_or_else(|| self.bad(index, "an object"))
    }

    pub fn array(&self, index: usize) -> Result<&'a [Value], BridgeError> {
        self.value(index)?
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| self.bad(index, "an array"))
    }

    fn bad(&self, index: usize, expected: &'static str) -> BridgeError {
        BridgeError::BadArgument {
            method: self.method.to_string(),
            index,
            expected,
        }
    }
}

/// Name of the script-side bridge runtime object.
pub const SHIM_GLOBAL: &str = "__chatview";

/// Script that sets up the bridge runtime in every sandbox page.
///
/// Injected at document creation, before the utility and adapter scripts.
/// `define` builds a proxy whose methods post bridge messages and return a
/// promise; properties are served from a snapshot taken at definition time,
/// and assignments are forwarded to native code.
pub const BRIDGE_SHIM_SCRIPT: &str = r#"
(function() {
    if (window.__chatview) { return; }
    var rt = {
        _nextId: 1,
        _pending: {},
        _objects: {},
        _post: function(object, method, args, wantsReply) {
            var msg = { object: object, method: method, args: args };
            var promise = null;
            if (wantsReply) {
                var id = this._nextId++;
                msg.id = id;
                var pending = this._pending;
                promise = new Promise(function(resolve) { pending[id] = resolve; });
            }
            window.ipc.postMessage(JSON.stringify(msg));
            return promise;
        },
        _resolve: function(id, value) {
            var resolve = this._pending[id];
            if (resolve) {
                delete this._pending[id];
                resolve(value);
            }
        },
        define: function(name, methods, props) {
            var rt = this;
            var obj = {};
            methods.forEach(function(method) {
                obj[method] = function() {
                    var args = Array.prototype.slice.call(arguments);
                    var callback = null;
                    if (args.length && typeof args[args.length - 1] === "function") {
                        callback = args.pop();
                    }
                    var p = rt._post(name, method, args, true);
                    if (callback) { p.then(callback); }
                    return p;
                };
            });
            var values = props || {};
            Object.keys(values).forEach(function(prop) {
                Object.defineProperty(obj, prop, {
                    enumerable: true,
                    get: function() { return values[prop]; },
                    set: function(v) {
                        values[prop] = v;
                        rt._post(name, "__setProperty", [prop, v], false);
                    }
                });
            });
            this._objects[name] = obj;
            return obj;
        },
        connect: function(callback) {
            callback(this._objects);
        }
    };
    window.__chatview = rt;
})();
"#;

/// Generate a script that calls `<namespace>.<path>(args...)` in the page.
pub fn js_call(namespace: &str, path: &str, args: &[Value]) -> String {
    let args = args
        .iter()
        .map(|a| serde_json::to_string(a).unwrap_or_else(|_| "null".to_string()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{namespace}.{path}({args});")
}

/// Generate a script that resolves the pending promise of call `id`.
pub fn js_resolve_reply(id: u64, value: &Value) -> String {
    let value = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
    format!("window.{SHIM_GLOBAL}._resolve({id}, {value});")
}

/// Generate the `define` call that exposes one bridge object to script.
pub fn js_define_object(
    name: &str,
    methods: &[String],
    properties: &serde_json::Map<String, Value>,
) -> String {
    let name = serde_json::to_string(name).unwrap_or_else(|_| "\"unknown\"".to_string());
    let methods = serde_json::to_string(methods).unwrap_or_else(|_| "[]".to_string());
    let properties = serde_json::to_string(properties).unwrap_or_else(|_| "{}".to_string());
    format!("window.{SHIM_GLOBAL}.define({name}, {methods}, {properties});")
}

/// Minimal document loaded into a theme's sandbox page.
///
/// `definitions` is the output of
/// [`BridgeHost::definition_script`](crate::bridge::BridgeHost::definition_script).
/// Once the DOM is ready it binds `srvLoader` and `srvUtil` globally and
/// starts the adapter's `loadTheme` entry point.
pub fn bootstrap_document(definitions: &str) -> String {
    format!(
        "<html><head>\
<script type=\"text/javascript\">\n{definitions}\n\
document.addEventListener(\"DOMContentLoaded\", function () {{\n\
    window.{SHIM_GLOBAL}.connect(function (objects) {{\n\
        window.srvLoader = objects.srvLoader;\n\
        window.srvUtil = objects.srvUtil;\n\
        initPsiTheme().adapter.loadTheme();\n\
    }});\n\
}});\n\
</script></head></html>"
    )
}
