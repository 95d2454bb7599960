//! Tests for document-root fallback

mod common;

use std::sync::Arc;

use camweb::auth::UserGroup;
use camweb::server::WebServer;
use common::{TextHandler, body_of, get, request, start_local, status_of};

fn web_root() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
    std::fs::write(dir.path().join("styles.css"), "body{}").unwrap();
    std::fs::create_dir(dir.path().join("assets")).unwrap();
    std::fs::write(dir.path().join("assets").join("camera.js"), "var x;").unwrap();
    std::fs::create_dir(dir.path().join("empty")).unwrap();
    dir
}

#[test]
fn test_unmatched_uri_falls_back_to_document_root() {
    let root = web_root();
    let server = WebServer::new();
    server.set_document_root(root.path());
    server.add_handler(Arc::new(TextHandler::exact("/info", "info")), UserGroup::Anyone);
    let addr = start_local(&server);

    let reply = get(addr, "/styles.css");
    assert_eq!(status_of(&reply), 200);
    assert!(reply.contains("Content-Type: text/css\r\n"));
    assert_eq!(body_of(&reply), "body{}");

    let reply = get(addr, "/assets/camera.js");
    assert_eq!(status_of(&reply), 200);
    assert_eq!(body_of(&reply), "var x;");

    assert_eq!(body_of(&get(addr, "/info")), "info");
}

#[test]
fn test_directory_serves_index_without_listing() {
    let root = web_root();
    let server = WebServer::new();
    server.set_document_root(root.path());
    let addr = start_local(&server);

    assert_eq!(body_of(&get(addr, "/")), "<h1>home</h1>");
    assert_eq!(status_of(&get(addr, "/empty")), 403);
}

#[test]
fn test_missing_file_is_404() {
    let root = web_root();
    let server = WebServer::new();
    server.set_document_root(root.path());
    let addr = start_local(&server);

    assert_eq!(status_of(&get(addr, "/nope.txt")), 404);
}

#[test]
fn test_parent_traversal_is_refused() {
    let root = web_root();
    let server = WebServer::new();
    server.set_document_root(root.path().join("assets"));
    let addr = start_local(&server);

    assert_eq!(status_of(&get(addr, "/../styles.css")), 403);
    assert_eq!(status_of(&get(addr, "/%2e%2e/styles.css")), 403);
}

#[test]
fn test_head_sends_length_without_body() {
    let root = web_root();
    let server = WebServer::new();
    server.set_document_root(root.path());
    let addr = start_local(&server);

    let reply = request(addr, "HEAD", "/styles.css", &[]);
    assert_eq!(status_of(&reply), 200);
    assert!(reply.contains("Content-Length: 6\r\n"));
    assert_eq!(body_of(&reply), "");
}

#[test]
fn test_clear_handlers_falls_back_to_static() {
    let root = web_root();
    let server = WebServer::new();
    server.set_document_root(root.path());
    server.add_handler(Arc::new(TextHandler::exact("/styles.css", "handled")), UserGroup::Anyone);
    server.clear_handlers();
    let addr = start_local(&server);

    assert_eq!(body_of(&get(addr, "/styles.css")), "body{}");
}

#[test]
fn test_post_to_static_is_405() {
    let root = web_root();
    let server = WebServer::new();
    server.set_document_root(root.path());
    let addr = start_local(&server);

    let reply = request(addr, "POST", "/styles.css", &[("Content-Length", "0")]);
    assert_eq!(status_of(&reply), 405);
}
