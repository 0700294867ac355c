//! Chat view theme runtime.
//!
//! Loads user-supplied chat view themes into an isolated script sandbox
//! and serves chat views from them:
//! - [`ThemeLoader`] resolves a `<type>/<name>` bundle, injects the bridge
//!   shim, `util.js` and the type's `adapter.js` into a sandbox page and
//!   waits for the script to report loading finished or failed
//! - [`bridge`] holds the native objects script talks to (`srvLoader`,
//!   `srvUtil`, `srvSession`) and the wire routing for their calls
//! - [`ThemeSession`] binds a chat view to a loaded [`Theme`] and registers
//!   it with the [`ContentServer`], which answers the view's requests with
//!   the theme document, session content or bundle files
//!
//! The rendering engine and the HTTP accept loop are supplied by the
//! embedding application through [`SandboxFactory`] and
//! [`ContentServer::dispatch`].

pub mod bridge;
pub mod cache;
pub mod content;
pub mod ipc;
pub mod loader;
pub mod provider;
pub mod sandbox;
pub mod session;
pub mod theme;

pub use bridge::{BridgeError, BridgeHost, BridgeObject, SessionRegistry, ThemeUtil, UtilityBridge};
pub use cache::{CacheValue, ResourceCache};
pub use content::{ContentHandler, ContentRequest, ContentResponse, ContentServer};
pub use loader::ThemeLoader;
pub use provider::{DirThemeProvider, ProviderKind, ThemeBundle, ThemeProvider};
pub use sandbox::{SandboxFactory, SandboxPage, UserScript};
pub use session::{SessionContent, SessionDelegate, SessionObject, ThemeSession};
pub use theme::{DefaultAvatar, Theme, ThemeId};
