//! Scripted sandbox that plays the theme adapter's side of the protocol.
//!
//! Every "script" action goes through the real wire format: a JSON bridge
//! message handed to a `BridgeHost`, whose reply script is parsed back.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chatview_common::{SessionId, ThemeError};
use chatview_config::{ConfigOptionStore, RuntimeConfig};
use chatview_theme::bridge::BridgeHost;
use chatview_theme::ipc::BridgeMessage;
use chatview_theme::{
    BridgeObject, DirThemeProvider, ProviderKind, SandboxFactory, SandboxPage, ThemeLoader,
    UserScript, UtilityBridge,
};
use serde_json::{json, Value};

pub const SERVER_URL: &str = "http://127.0.0.1:7878/";

/// How the fake adapter reacts.
#[derive(Debug, Clone, PartialEq)]
pub enum Adapter {
    /// Sets a fixed document and finishes loading.
    Static(String),
    /// Asks for per-session documents and answers every generation request.
    PerSession,
    /// Like `PerSession` but never answers generation requests.
    PerSessionSilent,
    /// Like `PerSession`, after moving the script namespace.
    Namespaced(String),
    /// Sets a fixed document and finishes loading from inside `set_html`.
    Immediate(String),
    /// Reports a loading error.
    Fail(String),
    /// Never reports anything.
    Silent,
}

pub struct FakePage {
    adapter: Adapter,
    host: Arc<BridgeHost>,
    scripts: Mutex<Vec<UserScript>>,
    documents: Mutex<Vec<String>>,
    executed: Mutex<Vec<String>>,
    urls: Mutex<Vec<String>>,
    transparent: Mutex<bool>,
}

impl FakePage {
    pub fn new(adapter: Adapter) -> Self {
        Self {
            adapter,
            host: Arc::new(BridgeHost::new()),
            scripts: Mutex::new(Vec::new()),
            documents: Mutex::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
            urls: Mutex::new(Vec::new()),
            transparent: Mutex::new(false),
        }
    }

    pub fn host(&self) -> &Arc<BridgeHost> {
        &self.host
    }

    pub fn script_names(&self) -> Vec<String> {
        self.scripts.lock().unwrap().iter().map(|s| s.name.clone()).collect()
    }

    pub fn documents(&self) -> Vec<String> {
        self.documents.lock().unwrap().clone()
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn is_transparent(&self) -> bool {
        *self.transparent.lock().unwrap()
    }

    /// Call a bridge method the way script does and return its reply.
    pub fn call(&self, object: &str, method: &str, args: Vec<Value>) -> Value {
        post(&self.host, object, method, args)
    }
}

/// Send one bridge message through `host` and decode the reply script.
pub fn post(host: &BridgeHost, object: &str, method: &str, args: Vec<Value>) -> Value {
    let raw = serde_json::to_string(&BridgeMessage::new(object, method, args).with_reply_id(1))
        .unwrap();
    let reply = host.handle_message(&raw).expect("call with id gets a reply");
    let value = reply
        .strip_prefix("window.__chatview._resolve(1, ")
        .and_then(|rest| rest.strip_suffix(");"))
        .expect("reply script shape");
    serde_json::from_str(value).unwrap()
}

fn generation_target(script: &str) -> Option<SessionId> {
    let start = script.find("adapter.generateSessionHtml(")? + "adapter.generateSessionHtml(".len();
    let end = script.rfind(");")?;
    let id: String = serde_json::from_str(&script[start..end]).ok()?;
    Some(SessionId::from(id))
}

impl SandboxPage for FakePage {
    fn register_object(&self, name: &str, object: Arc<dyn BridgeObject>) -> Result<(), ThemeError> {
        self.host
            .register(name, object)
            .map_err(|e| ThemeError::Sandbox(e.to_string()))
    }

    fn add_user_script(&self, script: UserScript) -> Result<(), ThemeError> {
        self.scripts.lock().unwrap().push(script);
        Ok(())
    }

    fn set_html(&self, html: &str, _base_url: &str) -> Result<(), ThemeError> {
        self.documents.lock().unwrap().push(html.to_string());
        if !html.contains("initPsiTheme().adapter.loadTheme()") {
            return Ok(());
        }
        if let Adapter::Immediate(doc) = &self.adapter {
            post(&self.host, "srvLoader", "setHtml", vec![json!(doc)]);
            post(&self.host, "srvLoader", "finishThemeLoading", vec![]);
            return Ok(());
        }
        let host = self.host.clone();
        let adapter = self.adapter.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            match adapter {
                Adapter::Static(doc) => {
                    post(&host, "srvLoader", "setMetaData", vec![json!({"name": "Fake"})]);
                    post(&host, "srvLoader", "setPrepareSessionHtml", vec![json!(false)]);
                    post(&host, "srvLoader", "setHtml", vec![json!(doc)]);
                    post(&host, "srvLoader", "finishThemeLoading", vec![]);
                }
                Adapter::PerSession | Adapter::PerSessionSilent => {
                    post(&host, "srvLoader", "setPrepareSessionHtml", vec![]);
                    post(&host, "srvLoader", "finishThemeLoading", vec![]);
                }
                Adapter::Namespaced(ns) => {
                    post(&host, "srvUtil", "__setProperty", vec![json!("jsNamespace"), json!(ns)]);
                    post(&host, "srvLoader", "setPrepareSessionHtml", vec![]);
                    post(&host, "srvLoader", "finishThemeLoading", vec![]);
                }
                Adapter::Fail(reason) => {
                    post(&host, "srvLoader", "errorThemeLoading", vec![json!(reason)]);
                }
                Adapter::Silent | Adapter::Immediate(_) => {}
            }
        });
        Ok(())
    }

    fn load_url(&self, url: &str) -> Result<(), ThemeError> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(())
    }

    fn set_transparent_background(&self) -> Result<(), ThemeError> {
        *self.transparent.lock().unwrap() = true;
        Ok(())
    }

    fn run_script(&self, script: &str) -> Result<(), ThemeError> {
        self.executed.lock().unwrap().push(script.to_string());
        if !matches!(self.adapter, Adapter::PerSession | Adapter::Namespaced(_)) {
            return Ok(());
        }
        let Some(id) = generation_target(script) else {
            return Ok(());
        };
        let host = self.host.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            let props = post(
                &host,
                "srvLoader",
                "sessionProperties",
                vec![json!(id.as_str()), json!(["chatName"])],
            );
            let html = format!("<html>{}:{}</html>", id, props["chatName"].as_str().unwrap_or("?"));
            post(&host, "srvLoader", "setSessionHtml", vec![json!(id.as_str()), json!(html)]);
        });
        Ok(())
    }
}

/// Creates [`FakePage`]s and remembers them.
pub struct FakeSandbox {
    adapter: Adapter,
    pages: Mutex<Vec<Arc<FakePage>>>,
}

impl FakeSandbox {
    pub fn new(adapter: Adapter) -> Arc<Self> {
        Arc::new(Self {
            adapter,
            pages: Mutex::new(Vec::new()),
        })
    }

    pub fn pages(&self) -> Vec<Arc<FakePage>> {
        self.pages.lock().unwrap().clone()
    }

    pub fn page(&self) -> Arc<FakePage> {
        self.pages().pop().expect("a page was created")
    }
}

impl SandboxFactory for FakeSandbox {
    fn create_page(&self, _theme_id: &str) -> Result<Arc<dyn SandboxPage>, ThemeError> {
        let page = Arc::new(FakePage::new(self.adapter.clone()));
        self.pages.lock().unwrap().push(page.clone());
        Ok(page)
    }
}

/// Resource root with `chatview/util.js`, the `clean` adapter and the
/// `clean/default` bundle.
pub fn theme_root() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    let cv = root.path().join("chatview");
    write(&cv.join("util.js"), b"// util");
    write(&cv.join("clean/adapter.js"), b"// clean adapter");
    write(&cv.join("clean/default/images/smile.png"), b"\x89PNG smile");
    write(&cv.join("clean/default/avatar.png"), b"theme avatar");
    write(&cv.join("clean/default/screenshot.png"), b"\x89PNG shot");
    root
}

pub fn write(path: &Path, data: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

pub fn runtime_config(load_ms: u64, generation_ms: u64) -> RuntimeConfig {
    RuntimeConfig {
        load_timeout_ms: load_ms,
        generation_timeout_ms: generation_ms,
        ..RuntimeConfig::default()
    }
}

pub fn utility() -> Arc<UtilityBridge> {
    let store = ConfigOptionStore::default().with_option("options.ui.chat.avatars.show", true);
    Arc::new(UtilityBridge::new(Arc::new(store)))
}

pub fn loader(root: &Path, sandbox: Arc<FakeSandbox>, runtime: RuntimeConfig) -> ThemeLoader {
    let provider = DirThemeProvider::new(vec![root.to_path_buf()], ProviderKind::OneToOne);
    ThemeLoader::new(Arc::new(provider), utility(), sandbox, runtime, SERVER_URL)
}

/// Poll `cond` until it holds or two seconds pass.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
