//! The poll thread's work: accepting connections and dispatching requests.
//!
//! Everything here runs on one current-thread runtime owned by the poll
//! thread, so handlers are never called concurrently with each other.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::auth::{self, digest};
use crate::handler::canonicalize_uri;
use crate::http::connection::{Connection, Dispatch};
use crate::http::request::Request;
use crate::http::writer::{Outbound, ResponseWriter};
use crate::registry::HandlerRegistry;
use crate::server::lifecycle::Settings;
use crate::server::{lock, static_files};

/// Configuration frozen at start for the lifetime of one run.
#[derive(Debug, Clone)]
pub(crate) struct ActiveSnapshot {
    pub(crate) registry: HandlerRegistry,
    pub(crate) auth_domain: String,
    pub(crate) document_root: Option<PathBuf>,
}

impl ActiveSnapshot {
    pub(crate) fn capture(settings: &Settings) -> Self {
        let document_root = if settings.document_root.as_os_str().is_empty() {
            None
        } else {
            Some(settings.document_root.clone())
        };

        Self {
            registry: settings.handlers.clone(),
            auth_domain: settings.auth_domain.clone(),
            document_root,
        }
    }
}

/// Routes requests using the snapshot. Users are looked up live, under the
/// configuration lock, so user changes apply without a restart.
pub(crate) struct Dispatcher {
    snapshot: ActiveSnapshot,
    settings: Arc<Mutex<Settings>>,
}

impl Dispatcher {
    pub(crate) fn new(snapshot: ActiveSnapshot, settings: Arc<Mutex<Settings>>) -> Self {
        Self { snapshot, settings }
    }
}

impl Dispatch for Dispatcher {
    fn dispatch(&self, request: &Request, out: &mut Outbound) {
        let uri = canonicalize_uri(&request.uri);
        let group = auth::authenticate(&lock(&self.settings).users, request);

        match self.snapshot.registry.resolve(&uri) {
            Some(binding) if group < binding.allowed_group => {
                debug!(
                    uri = %uri,
                    group = %group,
                    required = %binding.allowed_group,
                    "Authorization required"
                );
                let challenge = digest::challenge(&self.snapshot.auth_domain, digest::unix_now());
                ResponseWriter::new(out).send(challenge.as_bytes());
            }
            Some(binding) => {
                debug!(uri = %uri, group = %group, "Dispatching to handler");
                let mut writer = ResponseWriter::for_handler(out, &binding.handler);
                binding.handler.handle(request, &mut writer);
            }
            None => {
                let mut writer = ResponseWriter::new(out);
                match &self.snapshot.document_root {
                    Some(root) => static_files::serve(root, request, &mut writer),
                    None => {
                        debug!(uri = %uri, "No handler");
                        writer.send_error(404, None);
                    }
                }
            }
        }
    }
}

/// Accepts connections until `shutdown` fires (or its sender is dropped).
pub(crate) async fn run(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,

            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    debug!(%peer, "Accepted connection");
                    let dispatcher = Arc::clone(&dispatcher);

                    tokio::spawn(async move {
                        let mut conn = Connection::new(socket);
                        if let Err(e) = conn.run(dispatcher.as_ref()).await {
                            debug!(%peer, error = %e, "Connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
        }
    }
}
