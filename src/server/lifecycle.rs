//! The host-facing server object.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::auth::{self, CredentialStore, UserGroup};
use crate::config::Config;
use crate::handler::RequestHandler;
use crate::registry::HandlerRegistry;
use crate::server::event_loop::{self, ActiveSnapshot, Dispatcher};
use crate::server::lock;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_AUTH_DOMAIN: &str = "cam2web";

/// Where a server is in its start/stop cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Mutable configuration, guarded by the configuration mutex.
#[derive(Debug)]
pub(crate) struct Settings {
    pub(crate) document_root: PathBuf,
    pub(crate) auth_domain: String,
    pub(crate) port: u16,
    pub(crate) handlers: HandlerRegistry,
    pub(crate) users: CredentialStore,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            document_root: PathBuf::new(),
            auth_domain: DEFAULT_AUTH_DOMAIN.to_string(),
            port: DEFAULT_PORT,
            handlers: HandlerRegistry::new(),
            users: CredentialStore::new(),
        }
    }
}

struct RunningServer {
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// An embeddable HTTP server.
///
/// Configuration calls may come from any thread at any time. Handler and
/// document root changes made while the server runs take effect on the next
/// [`start`](WebServer::start); user changes apply immediately.
///
/// ```no_run
/// use std::sync::Arc;
/// use camweb::auth::UserGroup;
/// use camweb::handlers::EmbeddedContentHandler;
/// use camweb::server::WebServer;
///
/// let server = WebServer::new();
/// let ha1 = WebServer::calculate_digest_auth_ha1("admin", "cam2web", "password");
///
/// server
///     .set_port(8080)
///     .add_user("admin", ha1, UserGroup::Admin)
///     .add_handler(
///         Arc::new(EmbeddedContentHandler::new("/", "text/html", b"<h1>camera</h1>")),
///         UserGroup::Anyone,
///     );
///
/// server.start()?;
/// // ...
/// server.stop();
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct WebServer {
    settings: Arc<Mutex<Settings>>,
    lifecycle: Mutex<Option<RunningServer>>,
    state: Mutex<ServerState>,
}

impl Default for WebServer {
    fn default() -> Self {
        Self::new()
    }
}

impl WebServer {
    pub fn new() -> Self {
        Self {
            settings: Arc::new(Mutex::new(Settings::default())),
            lifecycle: Mutex::new(None),
            state: Mutex::new(ServerState::Stopped),
        }
    }

    /// Builds a stopped server from host configuration.
    pub fn from_config(config: &Config) -> Self {
        let server = Self::new();
        server
            .set_port(config.server.port)
            .set_auth_domain(&config.server.auth_domain)
            .set_document_root(&config.server.document_root);

        for user in &config.users {
            let ha1 = user.ha1(&config.server.auth_domain);
            server.add_user(&user.name, ha1, user.group);
        }

        server
    }

    /// HA1 = MD5(user:domain:password), the form in which users are stored.
    pub fn calculate_digest_auth_ha1(user: &str, domain: &str, password: &str) -> String {
        auth::calculate_ha1(user, domain, password)
    }

    pub fn document_root(&self) -> PathBuf {
        lock(&self.settings).document_root.clone()
    }

    /// Sets the directory served for URIs no handler claims. An empty path
    /// disables static serving.
    pub fn set_document_root(&self, root: impl Into<PathBuf>) -> &Self {
        lock(&self.settings).document_root = root.into();
        self
    }

    pub fn auth_domain(&self) -> String {
        lock(&self.settings).auth_domain.clone()
    }

    pub fn set_auth_domain(&self, domain: impl Into<String>) -> &Self {
        lock(&self.settings).auth_domain = domain.into();
        self
    }

    pub fn port(&self) -> u16 {
        lock(&self.settings).port
    }

    /// Sets the listening port. Port 0 picks a free port at start, see
    /// [`local_addr`](WebServer::local_addr).
    pub fn set_port(&self, port: u16) -> &Self {
        lock(&self.settings).port = port;
        self
    }

    pub fn add_handler(&self, handler: Arc<dyn RequestHandler>, allowed_group: UserGroup) -> &Self {
        lock(&self.settings).handlers.register(handler, allowed_group);
        self
    }

    pub fn remove_handler(&self, handler: &Arc<dyn RequestHandler>) {
        lock(&self.settings).handlers.unregister(handler);
    }

    pub fn clear_handlers(&self) {
        lock(&self.settings).handlers.clear();
    }

    /// Adds or replaces a user. `ha1` comes from
    /// [`calculate_digest_auth_ha1`](WebServer::calculate_digest_auth_ha1).
    pub fn add_user(&self, name: impl Into<String>, ha1: impl Into<String>, group: UserGroup) -> &Self {
        lock(&self.settings).users.add_or_replace(name, ha1, group);
        self
    }

    pub fn remove_user(&self, name: &str) {
        lock(&self.settings).users.remove(name);
    }

    pub fn state(&self) -> ServerState {
        *lock(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    /// Address the server listens on while it runs.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock(&self.lifecycle).as_ref().map(|running| running.local_addr)
    }

    /// Starts serving. Does nothing if the server already runs.
    ///
    /// On failure everything acquired so far is released and the server
    /// stays stopped.
    pub fn start(&self) -> anyhow::Result<()> {
        let mut running = lock(&self.lifecycle);
        if running.is_some() {
            return Ok(());
        }

        self.set_state(ServerState::Starting);

        match self.launch() {
            Ok(server) => {
                info!(addr = %server.local_addr, "Web server started");
                *running = Some(server);
                self.set_state(ServerState::Running);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to start web server");
                self.set_state(ServerState::Stopped);
                Err(e)
            }
        }
    }

    /// Stops serving and waits for the poll thread to exit. Does nothing if
    /// the server is not running.
    ///
    /// Must not be called from a handler: the poll thread cannot join itself.
    pub fn stop(&self) {
        let mut running = lock(&self.lifecycle);
        let Some(server) = running.take() else {
            return;
        };

        self.set_state(ServerState::Stopping);

        // The receiver only disappears if the poll thread already exited.
        let _ = server.shutdown.send(());
        if server.thread.join().is_err() {
            error!("Web server poll thread panicked");
        }

        self.set_state(ServerState::Stopped);
        info!(addr = %server.local_addr, "Web server stopped");
    }

    fn launch(&self) -> anyhow::Result<RunningServer> {
        let (snapshot, port) = {
            let settings = lock(&self.settings);
            (ActiveSnapshot::capture(&settings), settings.port)
        };

        let std_listener = std::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .with_context(|| format!("failed to bind port {}", port))?;
        std_listener
            .set_nonblocking(true)
            .context("failed to make listener non-blocking")?;
        let local_addr = std_listener.local_addr()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build poll runtime")?;

        let listener = {
            let _guard = runtime.enter();
            TcpListener::from_std(std_listener).context("failed to register listener")?
        };

        let dispatcher = Arc::new(Dispatcher::new(snapshot, Arc::clone(&self.settings)));
        let (shutdown, shutdown_rx) = oneshot::channel();

        let thread = thread::Builder::new()
            .name("camweb-poll".to_string())
            .spawn(move || {
                runtime.block_on(event_loop::run(listener, dispatcher, shutdown_rx));
                // Dropping the runtime cancels the remaining connection tasks.
                drop(runtime);
            })
            .context("failed to spawn poll thread")?;

        Ok(RunningServer {
            shutdown,
            thread,
            local_addr,
        })
    }

    fn set_state(&self, state: ServerState) {
        *lock(&self.state) = state;
    }
}

impl Drop for WebServer {
    fn drop(&mut self) {
        self.stop();
    }
}
