//! camweb - embeddable HTTP server for camera streaming hosts
//!
//! Hosts register request handlers with the access group each one requires,
//! add users for HTTP Digest authentication, and start a [`WebServer`]. A
//! single poll thread serves every connection; handlers that stream (MJPEG
//! and the like) return quickly and continue from timer callbacks.
//!
//! [`WebServer`]: server::WebServer

pub mod auth;
pub mod config;
pub mod handler;
pub mod handlers;
pub mod http;
pub mod registry;
pub mod server;
