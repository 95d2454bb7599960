//! Server lifecycle and the poll thread.
//!
//! [`WebServer`] owns two locks: the configuration mutex (document root,
//! auth domain, port, handlers, users) and the lifecycle mutex serializing
//! [`start`](WebServer::start) and [`stop`](WebServer::stop). Starting takes
//! a snapshot of the configuration and hands it to a dedicated poll thread,
//! which owns every connection until the server is stopped.

mod event_loop;
pub mod lifecycle;
pub mod static_files;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use lifecycle::{DEFAULT_AUTH_DOMAIN, DEFAULT_PORT, ServerState, WebServer};

/// Locks a mutex, carrying on with the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
