//! Request handler interface.
//!
//! A handler declares its route once, at construction: either an exact URI
//! or a URI prefix (sub-content handler). The server never inspects a
//! handler beyond its [`HandlerRoute`].

use crate::http::request::Request;
use crate::http::writer::ResponseWriter;

/// How a handler's URI is matched against incoming requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Matches the canonical URI exactly
    Exact,
    /// Matches every URI starting with the handler's URI
    Prefix,
}

/// The canonical URI a handler serves and how it is matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRoute {
    uri: String,
    kind: HandlerKind,
}

impl HandlerRoute {
    pub fn exact(uri: &str) -> Self {
        Self {
            uri: canonicalize_uri(uri),
            kind: HandlerKind::Exact,
        }
    }

    pub fn prefix(uri: &str) -> Self {
        Self {
            uri: canonicalize_uri(uri),
            kind: HandlerKind::Prefix,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }
}

/// Something the server can dispatch requests to.
///
/// Handlers run on the server's poll thread and must return quickly. Work
/// that has to wait (the next video frame, say) arms a timer with
/// [`ResponseWriter::set_timer`] and continues in [`handle_timer`].
///
/// [`handle_timer`]: RequestHandler::handle_timer
pub trait RequestHandler: Send + Sync {
    fn route(&self) -> &HandlerRoute;

    fn handle(&self, request: &Request, response: &mut ResponseWriter<'_>);

    /// Called when a timer armed by this handler fires on a connection.
    fn handle_timer(&self, _response: &mut ResponseWriter<'_>) {}
}

/// Normalizes a URI so that it starts with `/` and, unless it is the root,
/// does not end with `/`.
///
/// ```
/// # use camweb::handler::canonicalize_uri;
/// assert_eq!(canonicalize_uri("camera/"), "/camera");
/// assert_eq!(canonicalize_uri("///"), "/");
/// assert_eq!(canonicalize_uri(""), "/");
/// ```
pub fn canonicalize_uri(uri: &str) -> String {
    let trimmed = uri.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
