use crate::handler::{HandlerRoute, RequestHandler};
use crate::http::request::Request;
use crate::http::response::{ResponseBuilder, StatusCode};
use crate::http::writer::ResponseWriter;

/// Serves a static asset compiled into the host binary at one exact URI.
pub struct EmbeddedContentHandler {
    route: HandlerRoute,
    content_type: &'static str,
    body: &'static [u8],
}

impl EmbeddedContentHandler {
    pub fn new(uri: &str, content_type: &'static str, body: &'static [u8]) -> Self {
        Self {
            route: HandlerRoute::exact(uri),
            content_type,
            body,
        }
    }
}

impl RequestHandler for EmbeddedContentHandler {
    fn route(&self) -> &HandlerRoute {
        &self.route
    }

    fn handle(&self, _request: &Request, response: &mut ResponseWriter<'_>) {
        let reply = ResponseBuilder::new(StatusCode::Ok)
            .header("Content-Type", self.content_type)
            .body(self.body.to_vec())
            .build();
        response.send_response(&reply);
    }
}
