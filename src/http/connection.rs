use bytes::Buf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep_until};

use crate::http::parser::{ParseError, parse_http_request};
use crate::http::request::Request;
use crate::http::writer::{Outbound, ResponseWriter};

/// Largest request (head plus body) a connection will buffer.
pub const MAX_REQUEST_SIZE: usize = 1024 * 1024;

const READ_CHUNK: usize = 4096;

/// Turns parsed requests into queued response bytes.
pub trait Dispatch {
    fn dispatch(&self, request: &Request, out: &mut Outbound);
}

/// One client connection.
///
/// A connection multiplexes three things on a single task: reading and
/// parsing requests, flushing queued output, and waiting for the timer a
/// handler may have armed. Handlers run synchronously between those waits,
/// so all of a connection's state is touched by one task only.
pub struct Connection {
    stream: TcpStream,
    buffer: Vec<u8>,
    out: Outbound,
    peer_closed: bool,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(READ_CHUNK),
            out: Outbound::new(),
            peer_closed: false,
        }
    }

    pub async fn run<D: Dispatch>(&mut self, dispatcher: &D) -> anyhow::Result<()> {
        let mut temp = [0u8; READ_CHUNK];

        loop {
            self.process_buffered(dispatcher);

            let flushed = self.out.queued().is_empty();
            if flushed && (self.out.close_requested() || self.peer_closed) {
                break;
            }

            let reading = !self.peer_closed && !self.out.close_requested();
            let writing = !flushed;
            let deadline = self.out.timer_deadline();
            let (mut rd, mut wr) = self.stream.split();

            tokio::select! {
                read = rd.read(&mut temp), if reading => {
                    let n = read?;
                    if n == 0 {
                        // Client closed connection
                        self.peer_closed = true;
                    } else {
                        self.buffer.extend_from_slice(&temp[..n]);
                    }
                }

                written = wr.write(self.out.queued()), if writing => {
                    let n = written?;
                    if n == 0 {
                        return Err(anyhow::anyhow!("connection closed while writing"));
                    }
                    self.out.buffer_mut().advance(n);
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    fire_timer(&mut self.out);
                }

                else => break,
            }
        }

        // Best effort, the peer may already be gone
        let _ = self.stream.shutdown().await;
        Ok(())
    }

    /// Serves every complete request already buffered, in order.
    fn process_buffered<D: Dispatch>(&mut self, dispatcher: &D) {
        while !self.out.close_requested() {
            match parse_http_request(&self.buffer) {
                Ok((request, consumed)) => {
                    self.buffer.drain(..consumed);

                    tracing::debug!(
                        method = request.method.as_str(),
                        uri = %request.uri,
                        "Request received"
                    );

                    dispatcher.dispatch(&request, &mut self.out);

                    if !request.keep_alive() && !self.out.has_timer() {
                        self.out.request_close();
                    }
                }

                Err(ParseError::Incomplete) => {
                    if self.buffer.len() > MAX_REQUEST_SIZE {
                        tracing::warn!(buffered = self.buffer.len(), "Request too large");
                        ResponseWriter::new(&mut self.out).send_error(413, None);
                    }
                    break;
                }

                Err(ParseError::InvalidMethod) => {
                    ResponseWriter::new(&mut self.out).send_error(405, None);
                    break;
                }

                Err(e) => {
                    tracing::warn!(error = ?e, "Malformed request");
                    ResponseWriter::new(&mut self.out).send_error(400, None);
                    break;
                }
            }
        }
    }
}

/// Hands a fired timer back to the handler that armed it, if it is still
/// registered somewhere.
fn fire_timer(out: &mut Outbound) {
    let Some(timer) = out.take_timer() else {
        return;
    };

    if let Some(handler) = timer.handler.and_then(|weak| weak.upgrade()) {
        let mut writer = ResponseWriter::for_handler(out, &handler);
        handler.handle_timer(&mut writer);
    }
}
