//! Response writer handed to request handlers.
//!
//! Writes are queued on the connection's [`Outbound`] buffer and flushed by
//! the connection task once the handler returns, so nothing here blocks.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::BytesMut;
use tokio::time::Instant;

use crate::handler::RequestHandler;
use crate::http::response::{Response, StatusCode};

const HTTP_VERSION: &str = "HTTP/1.1";

fn serialize_response(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in &resp.headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    // Body
    buf.extend_from_slice(&resp.body);

    buf
}

/// A wake-up armed by [`ResponseWriter::set_timer`].
pub(crate) struct PendingTimer {
    pub(crate) deadline: Instant,
    pub(crate) handler: Option<Weak<dyn RequestHandler>>,
}

/// Output side of one connection: bytes waiting to be flushed, the close
/// flag and the pending timer, if any.
#[derive(Default)]
pub struct Outbound {
    buffer: BytesMut,
    close_requested: bool,
    timer: Option<PendingTimer>,
}

impl Outbound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes queued and not yet written to the socket.
    pub fn queued(&self) -> &[u8] {
        &self.buffer
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    pub(crate) fn timer_deadline(&self) -> Option<Instant> {
        self.timer.as_ref().map(|timer| timer.deadline)
    }

    pub(crate) fn take_timer(&mut self) -> Option<PendingTimer> {
        self.timer.take()
    }

    pub(crate) fn request_close(&mut self) {
        self.close_requested = true;
    }
}

/// Writes a response onto a connection.
///
/// Handlers either emit a complete response ([`send_response`], or
/// [`send_fmt`] followed by [`send`]), or start a chunked body with
/// [`start_chunked`] and keep feeding it with [`send_chunk`], typically from
/// timer callbacks.
///
/// [`send_response`]: ResponseWriter::send_response
/// [`send_fmt`]: ResponseWriter::send_fmt
/// [`send`]: ResponseWriter::send
/// [`start_chunked`]: ResponseWriter::start_chunked
/// [`send_chunk`]: ResponseWriter::send_chunk
pub struct ResponseWriter<'a> {
    out: &'a mut Outbound,
    handler: Option<Weak<dyn RequestHandler>>,
}

impl<'a> ResponseWriter<'a> {
    /// A writer not owned by any handler. Timers armed through it fire
    /// without calling anyone.
    pub fn new(out: &'a mut Outbound) -> Self {
        Self { out, handler: None }
    }

    /// A writer owned by `handler`; timers armed through it call back into
    /// that handler.
    pub fn for_handler(out: &'a mut Outbound, handler: &Arc<dyn RequestHandler>) -> Self {
        Self {
            out,
            handler: Some(Arc::downgrade(handler)),
        }
    }

    /// Queues raw bytes.
    pub fn send(&mut self, data: &[u8]) {
        self.out.buffer.extend_from_slice(data);
    }

    /// Queues formatted text, e.g. `send_fmt(format_args!("HTTP/1.1 200 OK\r\n"))`.
    pub fn send_fmt(&mut self, args: fmt::Arguments<'_>) {
        match args.as_str() {
            Some(text) => self.send(text.as_bytes()),
            None => self.send(args.to_string().as_bytes()),
        }
    }

    /// Queues a complete typed response.
    pub fn send_response(&mut self, response: &Response) {
        let bytes = serialize_response(response);
        self.send(&bytes);
    }

    /// Queues a response head announcing a chunked body.
    pub fn start_chunked(&mut self, status: StatusCode, headers: &[(&str, &str)]) {
        self.send_fmt(format_args!(
            "{} {} {}\r\n",
            HTTP_VERSION,
            status.as_u16(),
            status.reason_phrase()
        ));
        for (name, value) in headers {
            self.send_fmt(format_args!("{}: {}\r\n", name, value));
        }
        self.send(b"Transfer-Encoding: chunked\r\n\r\n");
    }

    /// Queues one chunk of a chunked body. Empty chunks are skipped; use
    /// [`finish_chunked`](ResponseWriter::finish_chunked) to end the body.
    pub fn send_chunk(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.send_fmt(format_args!("{:X}\r\n", data.len()));
        self.send(data);
        self.send(b"\r\n");
    }

    /// Queues formatted text as one chunk.
    pub fn send_chunk_fmt(&mut self, args: fmt::Arguments<'_>) {
        let text = args.to_string();
        self.send_chunk(text.as_bytes());
    }

    /// Queues the terminating zero-length chunk.
    pub fn finish_chunked(&mut self) {
        self.send(b"0\r\n\r\n");
    }

    /// Queues a minimal plain-text error response and closes the connection
    /// once it has been sent. `reason` defaults to the standard phrase.
    pub fn send_error(&mut self, code: u16, reason: Option<&str>) {
        let phrase = StatusCode::from_u16(code)
            .map(|status| status.reason_phrase())
            .unwrap_or("Error");
        let body = reason.unwrap_or(phrase);

        self.send_fmt(format_args!(
            "{} {} {}\r\n\
             Content-Type: text/plain\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{}",
            HTTP_VERSION,
            code,
            phrase,
            body.len(),
            body
        ));
        self.out.request_close();
    }

    /// Closes the connection after everything queued so far is flushed.
    pub fn close_connection(&mut self) {
        self.out.request_close();
    }

    /// Arms a one-shot timer on this connection, replacing any pending one.
    pub fn set_timer(&mut self, millis: u64) {
        self.out.timer = Some(PendingTimer {
            deadline: Instant::now() + Duration::from_millis(millis),
            handler: self.handler.clone(),
        });
    }

    /// Bytes queued on the connection and not yet flushed.
    pub fn to_send_data_length(&self) -> usize {
        self.out.buffer.len()
    }
}
