use std::sync::Weak;

use tracing::{debug, warn};

use super::{ContentRequest, ContentResponse};
use crate::session::ThemeSession;
use crate::theme::mime_from_extension;

/// Serves the requests of one chat view.
///
/// Holds the session weakly; once the view is gone every request is
/// declined.
pub struct ContentHandler {
    session: Weak<ThemeSession>,
}

impl ContentHandler {
    pub fn new(session: Weak<ThemeSession>) -> Self {
        Self { session }
    }

    /// Answer `request`, or `None` to decline it.
    ///
    /// The root path gets the theme document, generated per session when
    /// the theme asks for it. Other paths go to the session's own content
    /// first, then to the theme's static files.
    pub async fn handle(&self, request: &ContentRequest) -> Option<ContentResponse> {
        let Some(session) = self.session.upgrade() else {
            debug!(uri = %request.uri, "request for released session declined");
            return None;
        };
        let path = request.path();

        if path.is_empty() || path == "/" {
            let theme = session.theme().clone();
            if !theme.prepare_session_html() {
                return Some(ContentResponse::html(theme.html()));
            }
            let id = session.id().clone();
            let pending = theme.request_session_html(&id, session.delegate().clone());
            // Registered while the session is held; closing the view from
            // here on cancels the wait.
            drop(session);

            let result = match pending {
                Ok(rx) => theme.await_session_html(&id, rx).await,
                Err(e) => Err(e),
            };
            return Some(match result {
                Ok(html) => ContentResponse::html(html),
                Err(e) => {
                    warn!(session_id = %id, error = %e, "session html not delivered");
                    ContentResponse::from_theme_error(&e)
                }
            });
        }

        if let Some(content) = session.delegate().contents(request) {
            return Some(ContentResponse::ok(content.content_type, content.data));
        }

        let theme = session.theme();
        let rel = format!("{}{}", theme.http_rel_path(), path);
        let data = theme.load_data(&rel)?;
        Some(ContentResponse::ok(mime_from_extension(&path), data))
    }
}
