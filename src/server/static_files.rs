//! Serving files from the document root.
//!
//! Used for requests no handler claims. Directory listing is disabled: a
//! directory is served through its `index.html` or refused.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::http::request::{Method, Request};
use crate::http::response::{ResponseBuilder, StatusCode};
use crate::http::writer::ResponseWriter;

const INDEX_FILE: &str = "index.html";

pub fn serve(root: &Path, request: &Request, response: &mut ResponseWriter<'_>) {
    if !matches!(request.method, Method::GET | Method::HEAD) {
        response.send_error(405, None);
        return;
    }

    let Some(mut path) = resolve_path(root, &request.uri) else {
        tracing::warn!(uri = %request.uri, "Rejected path outside document root");
        response.send_error(403, None);
        return;
    };

    if path.is_dir() {
        path.push(INDEX_FILE);
        if !path.is_file() {
            response.send_error(403, Some("Directory listing is disabled"));
            return;
        }
    }

    match std::fs::read(&path) {
        Ok(contents) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            let length = contents.len();
            let body = if request.method == Method::HEAD {
                Vec::new()
            } else {
                contents
            };

            let reply = ResponseBuilder::new(StatusCode::Ok)
                .header("Content-Type", mime.essence_str())
                .header("Content-Length", length.to_string())
                .body(body)
                .build();
            response.send_response(&reply);
        }
        Err(e) if e.kind() == ErrorKind::NotFound => response.send_error(404, None),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read static file");
            response.send_error(500, None);
        }
    }
}

/// Maps a request path onto the document root.
///
/// Returns `None` when the decoded path tries to leave the root.
pub fn resolve_path(root: &Path, uri: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(uri).decode_utf8().ok()?;
    let mut path = root.to_path_buf();

    for component in Path::new(decoded.as_ref()).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => path.push(part),
            Component::ParentDir | Component::Prefix(_) => return None,
        }
    }

    Some(path)
}
