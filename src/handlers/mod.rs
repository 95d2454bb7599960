//! Ready-made request handlers.

pub mod embedded;

pub use embedded::EmbeddedContentHandler;
