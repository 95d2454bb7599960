#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use camweb::auth::calculate_ha1;
use camweb::handler::{HandlerRoute, RequestHandler};
use camweb::http::request::Request;
use camweb::http::response::Response;
use camweb::http::writer::ResponseWriter;
use camweb::server::WebServer;

/// Answers with a fixed body and counts its calls.
pub struct TextHandler {
    route: HandlerRoute,
    body: &'static str,
    hits: AtomicUsize,
}

impl TextHandler {
    pub fn exact(uri: &str, body: &'static str) -> Self {
        Self {
            route: HandlerRoute::exact(uri),
            body,
            hits: AtomicUsize::new(0),
        }
    }

    pub fn prefix(uri: &str, body: &'static str) -> Self {
        Self {
            route: HandlerRoute::prefix(uri),
            body,
            hits: AtomicUsize::new(0),
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl RequestHandler for TextHandler {
    fn route(&self) -> &HandlerRoute {
        &self.route
    }

    fn handle(&self, _request: &Request, response: &mut ResponseWriter<'_>) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        response.send_response(&Response::ok(self.body));
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn md5_hex(text: &str) -> String {
    format!("{:x}", md5::compute(text.as_bytes()))
}

/// Builds the Authorization header value a browser would send.
pub fn digest_authorization(
    user: &str,
    password: &str,
    realm: &str,
    nonce: &str,
    method: &str,
    uri: &str,
) -> String {
    let ha1 = calculate_ha1(user, realm, password);
    let ha2 = md5_hex(&format!("{}:{}", method, uri));
    let (nc, cnonce, qop) = ("00000001", "0a4f113b", "auth");
    let response = md5_hex(&format!("{}:{}:{}:{}:{}:{}", ha1, nonce, nc, cnonce, qop, ha2));

    format!(
        "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", qop={}, nc={}, cnonce=\"{}\", response=\"{}\"",
        user, realm, nonce, uri, qop, nc, cnonce, response
    )
}

/// Starts a server on an ephemeral port and returns the address to dial.
pub fn start_local(server: &WebServer) -> SocketAddr {
    server.set_port(0);
    server.start().unwrap();
    let port = server.local_addr().unwrap().port();
    SocketAddr::from(([127, 0, 0, 1], port))
}

pub fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
}

/// Sends one `Connection: close` request and reads the whole reply.
pub fn request(addr: SocketAddr, method: &str, target: &str, headers: &[(&str, &str)]) -> String {
    let mut stream = connect(addr);

    let mut raw = format!("{} {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n", method, target);
    for (name, value) in headers {
        raw.push_str(&format!("{}: {}\r\n", name, value));
    }
    raw.push_str("\r\n");
    stream.write_all(raw.as_bytes()).unwrap();

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).unwrap();
    String::from_utf8_lossy(&reply).into_owned()
}

pub fn get(addr: SocketAddr, target: &str) -> String {
    request(addr, "GET", target, &[])
}

pub fn status_of(reply: &str) -> u16 {
    reply
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0)
}

pub fn body_of(reply: &str) -> &str {
    reply.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("")
}
