//! Tests for chunked streaming driven by handler timers

mod common;

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use camweb::auth::UserGroup;
use camweb::handler::{HandlerRoute, RequestHandler};
use camweb::http::request::Request;
use camweb::http::response::StatusCode;
use camweb::http::writer::ResponseWriter;
use camweb::server::WebServer;
use common::{body_of, get, start_local};

/// Emits `frames` chunks, one per timer tick, then ends the body.
struct FramePump {
    route: HandlerRoute,
    frames: usize,
    interval_ms: u64,
    sent: AtomicUsize,
    ticks: AtomicUsize,
}

impl FramePump {
    fn new(uri: &str, frames: usize, interval_ms: u64) -> Self {
        Self {
            route: HandlerRoute::exact(uri),
            frames,
            interval_ms,
            sent: AtomicUsize::new(0),
            ticks: AtomicUsize::new(0),
        }
    }
}

impl RequestHandler for FramePump {
    fn route(&self) -> &HandlerRoute {
        &self.route
    }

    fn handle(&self, _request: &Request, response: &mut ResponseWriter<'_>) {
        response.start_chunked(StatusCode::Ok, &[("Content-Type", "text/plain")]);
        // Superseded right away by the shorter timer
        response.set_timer(60_000);
        response.set_timer(self.interval_ms);
    }

    fn handle_timer(&self, response: &mut ResponseWriter<'_>) {
        self.ticks.fetch_add(1, Ordering::SeqCst);

        let frame = self.sent.fetch_add(1, Ordering::SeqCst);
        response.send_chunk_fmt(format_args!("frame {};", frame));

        if frame + 1 < self.frames {
            response.set_timer(self.interval_ms);
        } else {
            response.finish_chunked();
            response.close_connection();
        }
    }
}

/// Decodes a chunked body, returning the payload and whether the
/// terminating chunk was seen.
fn decode_chunked(mut body: &str) -> (String, bool) {
    let mut payload = String::new();

    while let Some((size_line, rest)) = body.split_once("\r\n") {
        let size = usize::from_str_radix(size_line.trim(), 16).unwrap();
        if size == 0 {
            return (payload, rest == "\r\n");
        }
        payload.push_str(&rest[..size]);
        assert_eq!(&rest[size..size + 2], "\r\n");
        body = &rest[size + 2..];
    }

    (payload, false)
}

/// Records how many bytes were still unflushed at each point it writes.
struct BacklogRecorder {
    route: HandlerRoute,
    ticks: usize,
    seen: Mutex<Vec<usize>>,
}

impl RequestHandler for BacklogRecorder {
    fn route(&self) -> &HandlerRoute {
        &self.route
    }

    fn handle(&self, _request: &Request, response: &mut ResponseWriter<'_>) {
        response.start_chunked(StatusCode::Ok, &[("Content-Type", "text/plain")]);
        response.send_chunk(b"first;");
        self.seen.lock().unwrap().push(response.to_send_data_length());
        response.set_timer(30);
    }

    fn handle_timer(&self, response: &mut ResponseWriter<'_>) {
        let mut seen = self.seen.lock().unwrap();
        seen.push(response.to_send_data_length());

        response.send_chunk(b"tick;");
        if seen.len() <= self.ticks {
            response.set_timer(30);
        } else {
            response.finish_chunked();
            response.close_connection();
        }
    }
}

#[test]
fn test_backlog_drains_between_ticks() {
    let server = WebServer::new();
    let backlog = Arc::new(BacklogRecorder {
        route: HandlerRoute::exact("/backlog"),
        ticks: 3,
        seen: Mutex::new(Vec::new()),
    });
    server.add_handler(backlog.clone(), UserGroup::Anyone);
    let addr = start_local(&server);

    let reply = get(addr, "/backlog");
    let (payload, terminated) = decode_chunked(body_of(&reply));
    assert_eq!(payload, "first;tick;tick;tick;");
    assert!(terminated);

    let seen = backlog.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 4);
    // Head and first chunk were still queued while the handler ran
    assert!(seen[0] > "first;".len());
    // Every later tick found the earlier output already written out
    assert!(seen[1..].iter().all(|&pending| pending == 0));
}

#[test]
fn test_timer_driven_chunked_stream() {
    let server = WebServer::new();
    let pump = Arc::new(FramePump::new("/stream", 3, 20));
    server.add_handler(pump.clone(), UserGroup::Anyone);
    let addr = start_local(&server);

    let started = Instant::now();
    let reply = get(addr, "/stream");

    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(reply.contains("Transfer-Encoding: chunked\r\n"));

    let (payload, terminated) = decode_chunked(body_of(&reply));
    assert_eq!(payload, "frame 0;frame 1;frame 2;");
    assert!(terminated);
    assert_eq!(pump.ticks.load(Ordering::SeqCst), 3);

    // The 60s timer never fired
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[test]
fn test_streams_on_separate_connections_interleave() {
    let server = WebServer::new();
    let slow = Arc::new(FramePump::new("/slow", 2, 200));
    let fast = Arc::new(FramePump::new("/fast", 1, 1));
    server
        .add_handler(slow.clone(), UserGroup::Anyone)
        .add_handler(fast.clone(), UserGroup::Anyone);
    let addr = start_local(&server);

    let slow_client = std::thread::spawn(move || get(addr, "/slow"));
    // The slow stream is waiting on its timer, the poll thread is free
    std::thread::sleep(Duration::from_millis(50));
    let fast_reply = get(addr, "/fast");
    assert_eq!(decode_chunked(body_of(&fast_reply)).0, "frame 0;");

    let slow_reply = slow_client.join().unwrap();
    assert_eq!(decode_chunked(body_of(&slow_reply)).0, "frame 0;frame 1;");
}

#[test]
fn test_stop_ends_open_streams() {
    let server = WebServer::new();
    // Would take ~100s to finish on its own
    server.add_handler(Arc::new(FramePump::new("/forever", 1000, 100)), UserGroup::Anyone);
    let addr = start_local(&server);

    let mut stream = common::connect(addr);
    std::io::Write::write_all(&mut stream, b"GET /forever HTTP/1.1\r\n\r\n").unwrap();

    let mut head = [0u8; 64];
    let n = stream.read(&mut head).unwrap();
    assert!(n > 0);

    server.stop();

    let mut rest = Vec::new();
    // Connection is dropped with the poll thread
    let _ = stream.read_to_end(&mut rest);
    assert!(!server.is_running());
}
