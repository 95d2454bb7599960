//! HTTP protocol implementation.
//!
//! This module implements the HTTP/1.1 side of the server: request parsing,
//! response framing and the per-connection I/O loop.
//!
//! # Architecture
//!
//! - **`connection`**: The per-connection task multiplexing reads, writes and handler timers
//! - **`parser`**: Parses incoming HTTP requests from byte buffers
//! - **`request`**: HTTP request representation and form variable lookup
//! - **`response`**: Typed HTTP response with builder pattern
//! - **`writer`**: The response writer handed to handlers (raw, formatted, chunked writes, timers)
//!
//! # Connection Loop
//!
//! ```text
//!        ┌──────────────────────────────┐
//!        │  Dispatch buffered requests  │ ← handlers queue output
//!        └──────────────┬───────────────┘
//!                       ▼
//!        ┌──────────────────────────────┐
//!        │  Wait for the first of:      │
//!        │   - socket readable          │ → buffer request bytes
//!        │   - socket writable          │ → flush queued output
//!        │   - handler timer deadline   │ → handle_timer()
//!        └──────────────┬───────────────┘
//!                       │
//!                       ├─ close requested and flushed → Closed
//!                       └─ otherwise → loop
//! ```

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
