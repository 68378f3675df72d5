//! Network transport.
//!
//! The server speaks JSON over HTTP with Server-Sent Events for match
//! notifications.

pub mod http;

pub use http::{AppState, HttpServer, build_router, parse_bind_addr};
