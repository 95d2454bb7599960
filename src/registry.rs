//! Handler registry and URI routing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::UserGroup;
use crate::handler::{HandlerKind, RequestHandler};

/// A registered handler and the least privileged group allowed to call it.
#[derive(Clone)]
pub struct HandlerBinding {
    pub handler: Arc<dyn RequestHandler>,
    pub allowed_group: UserGroup,
}

impl std::fmt::Debug for HandlerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("route", self.handler.route())
            .field("allowed_group", &self.allowed_group)
            .finish()
    }
}

/// Exact-URI bindings plus an ordered list of prefix bindings.
///
/// Cloning is cheap (handlers are shared), which is how the server takes its
/// per-run snapshot.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    exact: HashMap<String, HandlerBinding>,
    prefix: Vec<HandlerBinding>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler. A later exact handler for the same URI replaces the
    /// earlier one; prefix handlers are kept in registration order.
    pub fn register(&mut self, handler: Arc<dyn RequestHandler>, allowed_group: UserGroup) {
        let binding = HandlerBinding {
            handler,
            allowed_group,
        };

        match binding.handler.route().kind() {
            HandlerKind::Exact => {
                let uri = binding.handler.route().uri().to_string();
                self.exact.insert(uri, binding);
            }
            HandlerKind::Prefix => self.prefix.push(binding),
        }
    }

    /// Removes this handler instance, wherever it is registered.
    pub fn unregister(&mut self, handler: &Arc<dyn RequestHandler>) {
        let route = handler.route();
        match route.kind() {
            HandlerKind::Exact => {
                if self
                    .exact
                    .get(route.uri())
                    .is_some_and(|binding| same_handler(&binding.handler, handler))
                {
                    self.exact.remove(route.uri());
                }
            }
            HandlerKind::Prefix => {
                if let Some(pos) = self
                    .prefix
                    .iter()
                    .position(|binding| same_handler(&binding.handler, handler))
                {
                    self.prefix.remove(pos);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.exact.clear();
        self.prefix.clear();
    }

    /// Finds the handler for a canonical URI.
    ///
    /// Exact bindings win. Otherwise the first registered prefix that the URI
    /// starts with is used, even if a longer registered prefix also matches.
    pub fn resolve(&self, uri: &str) -> Option<&HandlerBinding> {
        self.exact.get(uri).or_else(|| {
            self.prefix
                .iter()
                .find(|binding| uri.as_bytes().starts_with(binding.handler.route().uri().as_bytes()))
        })
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.prefix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefix.is_empty()
    }
}

fn same_handler(a: &Arc<dyn RequestHandler>, b: &Arc<dyn RequestHandler>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
