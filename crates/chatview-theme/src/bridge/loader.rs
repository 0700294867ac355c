use std::sync::{Arc, Weak};

use chatview_common::{SessionId, ThemeError, ThemeEvent};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{BridgeError, BridgeObject, LOADER_OBJECT};
use crate::ipc::BridgeArgs;
use crate::theme::{DefaultAvatar, Theme};

const METHODS: &[&str] = &[
    "setMetaData",
    "finishThemeLoading",
    "errorThemeLoading",
    "setHtml",
    "setHttpResourcePath",
    "toCache",
    "saveFilesToCache",
    "sessionProperties",
    "setDefaultAvatar",
    "setAvatarSize",
    "setCaseInsensitiveFS",
    "setPrepareSessionHtml",
    "setSessionHtml",
    "getFileContents",
    "getFileContentsFromAdapterDir",
    "setTransparent",
];

/// Per-theme `srvLoader` object. The theme script drives loading through
/// it and answers session HTML requests.
pub struct LoaderBridge {
    theme: Weak<Theme>,
}

impl LoaderBridge {
    pub fn new(theme: Weak<Theme>) -> Self {
        Self { theme }
    }

    fn theme(&self) -> Result<Arc<Theme>, BridgeError> {
        self.theme.upgrade().ok_or(BridgeError::ThemeGone)
    }
}

impl BridgeObject for LoaderBridge {
    fn methods(&self) -> Vec<String> {
        METHODS.iter().map(|m| m.to_string()).collect()
    }

    fn properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        if let Some(theme) = self.theme.upgrade() {
            props.insert("themeId".into(), Value::String(theme.id().to_string()));
            props.insert("isMuc".into(), Value::Bool(theme.is_muc()));
            props.insert("serverUrl".into(), Value::String(theme.server_url().to_string()));
        }
        props
    }

    fn invoke(&self, method: &str, args: BridgeArgs<'_>) -> Result<Value, BridgeError> {
        let theme = self.theme()?;
        match method {
            "setMetaData" => {
                if let Some(name) = args.object(0)?.get("name").and_then(Value::as_str) {
                    theme.set_name(name.to_string());
                }
            }
            "finishThemeLoading" => {
                if !theme.complete_load(Ok(())) {
                    warn!(theme_id = %theme.id(), "finishThemeLoading ignored: load already resolved");
                }
            }
            "errorThemeLoading" => {
                let reason = args.opt_str(0)?.unwrap_or_default().to_string();
                if !theme.complete_load(Err(ThemeError::ScriptFailure(reason))) {
                    warn!(theme_id = %theme.id(), "errorThemeLoading ignored: load already resolved");
                }
            }
            "setHtml" => theme.set_html(args.str(0)?.to_string()),
            "setHttpResourcePath" => theme.set_http_rel_path(args.str(0)?.to_string()),
            "toCache" => theme.cache().put(args.str(0)?, args.value(1)?.clone()),
            "saveFilesToCache" => {
                for (key, file) in args.object(0)? {
                    let Some(file) = file.as_str() else {
                        continue;
                    };
                    match theme.load_data(file) {
                        Some(data) => theme.cache().put(key.clone(), data),
                        None => debug!(theme_id = %theme.id(), file, "file not cached: unreadable"),
                    }
                }
            }
            "sessionProperties" => {
                let id = SessionId::from(args.str(0)?);
                let names: Vec<String> = args
                    .array(1)?
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                return Ok(Value::Object(theme.sessions().session_properties(&id, &names)));
            }
            "setDefaultAvatar" => {
                let file = args.str(0)?;
                match theme.load_data(file).filter(|data| !data.is_empty()) {
                    Some(data) => theme.set_default_avatar(DefaultAvatar {
                        data,
                        host: args.opt_str(1)?.map(str::to_string),
                    }),
                    None => debug!(theme_id = %theme.id(), file, "default avatar not found"),
                }
            }
            "setAvatarSize" => theme.set_avatar_size(args.u32(0)?, args.u32(1)?),
            "setCaseInsensitiveFS" => theme.set_case_insensitive_fs(args.bool_or(0, true)?),
            "setPrepareSessionHtml" => theme.set_prepare_session_html(args.bool_or(0, true)?),
            "setSessionHtml" => {
                let id = SessionId::from(args.str(0)?);
                if theme.sessions().complete_generation(&id, args.str(1)?.to_string()) {
                    theme.publish(ThemeEvent::SessionHtmlReady(id));
                }
            }
            "getFileContents" => {
                let data = theme.load_data(args.str(0)?).unwrap_or_default();
                return Ok(Value::String(String::from_utf8_lossy(&data).into_owned()));
            }
            "getFileContentsFromAdapterDir" => {
                let name = args.str(0)?;
                let data = theme.load_adapter_file(name).unwrap_or_else(|| {
                    debug!(theme_id = %theme.id(), file = name, "adapter file not found");
                    Vec::new()
                });
                return Ok(Value::String(String::from_utf8_lossy(&data).into_owned()));
            }
            "setTransparent" => theme.set_transparent_background(true),
            _ => {
                return Err(BridgeError::UnknownMethod {
                    object: LOADER_OBJECT.to_string(),
                    method: method.to_string(),
                })
            }
        }
        Ok(Value::Null)
    }
}
