use std::sync::Arc;
use std::time::Instant;

use camweb::auth::UserGroup;
use camweb::config::Config;
use camweb::handler::{HandlerRoute, RequestHandler};
use camweb::handlers::EmbeddedContentHandler;
use camweb::http::request::Request;
use camweb::http::response::{Response, StatusCode};
use camweb::http::writer::ResponseWriter;
use camweb::server::WebServer;

const INDEX_HTML: &[u8] = b"<!DOCTYPE html>
<html>
<head><title>camweb</title></head>
<body>
<h1>camweb</h1>
<p><a href=\"/status\">status</a> (user) | <a href=\"/uptime\">uptime stream</a></p>
</body>
</html>
";

const TICK_MS: u64 = 1000;

/// Plain-text server status, for logged-in users.
struct StatusHandler {
    route: HandlerRoute,
    started: Instant,
}

impl RequestHandler for StatusHandler {
    fn route(&self) -> &HandlerRoute {
        &self.route
    }

    fn handle(&self, _request: &Request, response: &mut ResponseWriter<'_>) {
        let body = format!("uptime: {}s\n", self.started.elapsed().as_secs());
        response.send_response(&Response::ok(body));
    }
}

/// Streams the uptime once a second as a chunked body.
struct UptimeStreamHandler {
    route: HandlerRoute,
    started: Instant,
}

impl RequestHandler for UptimeStreamHandler {
    fn route(&self) -> &HandlerRoute {
        &self.route
    }

    fn handle(&self, _request: &Request, response: &mut ResponseWriter<'_>) {
        response.start_chunked(
            StatusCode::Ok,
            &[("Content-Type", "text/plain"), ("Cache-Control", "no-store")],
        );
        self.handle_timer(response);
    }

    fn handle_timer(&self, response: &mut ResponseWriter<'_>) {
        // Slow reader: skip this tick rather than pile up output
        if response.to_send_data_length() == 0 {
            response.send_chunk_fmt(format_args!("{}\n", self.started.elapsed().as_secs()));
        }
        response.set_timer(TICK_MS);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let server = Arc::new(WebServer::from_config(&cfg));
    let started = Instant::now();

    server
        .add_handler(
            Arc::new(EmbeddedContentHandler::new("/", "text/html", INDEX_HTML)),
            UserGroup::Anyone,
        )
        .add_handler(
            Arc::new(EmbeddedContentHandler::new("/index.html", "text/html", INDEX_HTML)),
            UserGroup::Anyone,
        )
        .add_handler(
            Arc::new(StatusHandler {
                route: HandlerRoute::exact("/status"),
                started,
            }),
            UserGroup::User,
        )
        .add_handler(
            Arc::new(UptimeStreamHandler {
                route: HandlerRoute::exact("/uptime"),
                started,
            }),
            UserGroup::Anyone,
        );

    server.start()?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    let stopping = Arc::clone(&server);
    tokio::task::spawn_blocking(move || stopping.stop()).await?;

    Ok(())
}
