//! HTTP-style content serving for chat views.
//!
//! Each chat view loads `<base_url>?psiId=<session id>`. The embedding
//! application's HTTP server turns requests into [`ContentRequest`]s and
//! hands them to [`ContentServer::dispatch`], which routes them to the
//! session's [`ContentHandler`].

mod handler;
mod server;

pub use handler::ContentHandler;
pub use server::ContentServer;

use chatview_common::{SessionId, ThemeError};

/// Content type of theme documents.
pub const HTML_CONTENT_TYPE: &str = "text/html;charset=utf-8";

/// Query parameter carrying the session id.
pub const SESSION_QUERY_PARAM: &str = "psiId";

/// An inbound request as seen by the content layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub method: String,
    /// Path plus optional query, e.g. `/img/a.png?psiId=...`.
    pub uri: String,
    pub headers: Vec<(String, String)>,
}

impl ContentRequest {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            headers: Vec::new(),
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new("GET", uri)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Percent-decoded path, without the query.
    pub fn path(&self) -> String {
        let (path, _) = split_uri(&self.uri);
        decode(path)
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        let (_, query) = split_uri(&self.uri);
        find_param(query?, name)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Session the request belongs to: its own `psiId` parameter, or the one
    /// of the page that referred it (sub-resources of a chat view).
    pub fn session_id(&self) -> Option<SessionId> {
        self.query_param(SESSION_QUERY_PARAM)
            .or_else(|| {
                let referer = self.header("Referer")?;
                let (_, query) = split_uri(referer);
                find_param(query?, SESSION_QUERY_PARAM)
            })
            .filter(|id| !id.is_empty())
            .map(SessionId::from)
    }
}

fn split_uri(uri: &str) -> (&str, Option<&str>) {
    let uri = uri.split('#').next().unwrap_or(uri);
    match uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (uri, None),
    }
}

fn find_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (decode(key) == name).then(|| decode(&value.replace('+', " ")))
    })
}

fn decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// A response produced by the content layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl ContentResponse {
    pub fn ok(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    pub fn html(body: impl Into<Vec<u8>>) -> Self {
        Self::ok(HTML_CONTENT_TYPE, body)
    }

    pub fn status(status: u16, text: &str) -> Self {
        Self {
            status,
            content_type: "text/plain;charset=utf-8".into(),
            body: text.as_bytes().to_vec(),
        }
    }

    pub fn not_found() -> Self {
        Self::status(404, "Not Found")
    }

    /// Map a failed session HTML generation to a status response.
    pub fn from_theme_error(err: &ThemeError) -> Self {
        match err {
            ThemeError::GenerationPending(_) => Self::status(409, "Conflict"),
            ThemeError::GenerationTimeout(_) => Self::status(504, "Gateway Timeout"),
            ThemeError::GenerationCancelled(_) | ThemeError::NotReady(_) => {
                Self::status(503, "Service Unavailable")
            }
            _ => Self::status(500, "Internal Server Error"),
        }
    }

    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
