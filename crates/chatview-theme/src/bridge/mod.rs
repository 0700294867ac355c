//! Native objects callable from theme scripts.
//!
//! A sandbox page exposes [`BridgeObject`]s under fixed names. Script calls
//! arrive as [`BridgeMessage`]s and are routed by a [`BridgeHost`], which
//! sandbox implementations embed.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

use crate::ipc::{js_define_object, js_resolve_reply, BridgeArgs, BridgeMessage};

mod format;
mod loader;
mod registry;
mod util;

pub use format::{format_qt_datetime, strftime};
pub use loader::LoaderBridge;
pub use registry::SessionRegistry;
pub use util::{ThemeUtil, UtilityBridge};

/// Name under which the per-theme loader bridge is registered.
pub const LOADER_OBJECT: &str = "srvLoader";
/// Name under which the utility bridge is registered.
pub const UTIL_OBJECT: &str = "srvUtil";
/// Name under which a chat view's session bridge is registered.
pub const SESSION_OBJECT: &str = "srvSession";

/// Method name the shim uses for property assignments.
const SET_PROPERTY_METHOD: &str = "__setProperty";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("no bridge object named '{0}'")]
    UnknownObject(String),

    #[error("bridge object '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("unknown method '{method}' on '{object}'")]
    UnknownMethod { object: String, method: String },

    #[error("argument {index} of '{method}' must be {expected}")]
    BadArgument {
        method: String,
        index: usize,
        expected: &'static str,
    },

    #[error("property '{0}' is read-only")]
    ReadOnlyProperty(String),

    #[error("invalid value for property '{property}': {reason}")]
    InvalidProperty { property: String, reason: String },

    #[error("theme was released")]
    ThemeGone,
}

/// A native object whose methods script can call.
pub trait BridgeObject: Send + Sync {
    /// Method names exposed to script.
    fn methods(&self) -> Vec<String>;

    /// Property snapshot exposed to script when the object is defined.
    fn properties(&self) -> serde_json::Map<String, Value> {
        serde_json::Map::new()
    }

    /// Handle a property assignment from script.
    fn set_property(&self, name: &str, _value: &Value) -> Result<(), BridgeError> {
        Err(BridgeError::ReadOnlyProperty(name.to_string()))
    }

    /// Invoke a method. The returned value is delivered back to script when
    /// the call awaits a reply.
    fn invoke(&self, method: &str, args: BridgeArgs<'_>) -> Result<Value, BridgeError>;
}

/// Named bridge objects of one sandbox page.
///
/// Each name can be registered exactly once.
#[derive(Default)]
pub struct BridgeHost {
    objects: Mutex<BTreeMap<String, Arc<dyn BridgeObject>>>,
}

impl BridgeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, object: Arc<dyn BridgeObject>) -> Result<(), BridgeError> {
        let mut objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        if objects.contains_key(name) {
            return Err(BridgeError::AlreadyRegistered(name.to_string()));
        }
        objects.insert(name.to_string(), object);
        debug!(object = name, "bridge object registered");
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BridgeObject>> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Call `object.method(args)` directly.
    pub fn invoke(&self, object: &str, method: &str, args: &[Value]) -> Result<Value, BridgeError> {
        let target = self
            .get(object)
            .ok_or_else(|| BridgeError::UnknownObject(object.to_string()))?;
        let args = BridgeArgs::new(method, args);
        if method == SET_PROPERTY_METHOD {
            let name = args.str(0)?;
            target.set_property(name, args.value(1)?)?;
            return Ok(Value::Null);
        }
        target.invoke(method, args)
    }

    /// Handle a raw message posted by script.
    ///
    /// Returns the script the sandbox must run to deliver the reply, if the
    /// call awaits one. Failed calls are logged and answered with `null`.
    pub fn handle_message(&self, raw: &str) -> Option<String> {
        let Some(msg) = BridgeMessage::from_json(raw) else {
            warn!(body_len = raw.len(), "bridge message rejected: failed to parse");
            return None;
        };

        let value = match self.invoke(&msg.object, &msg.method, &msg.args) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    object = %msg.object,
                    method = %msg.method,
                    error = %e,
                    "bridge call failed"
                );
                Value::Null
            }
        };

        msg.id.map(|id| js_resolve_reply(id, &value))
    }

    /// Script defining every registered object on the script side.
    pub fn definition_script(&self) -> String {
        let objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        objects
            .iter()
            .map(|(name, object)| js_define_object(name, &object.methods(), &object.properties()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
