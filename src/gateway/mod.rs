//! Connection gateway: HTTP listener, WebSocket upgrade and health probe.

pub mod server;

pub use server::{router, serve, serve_with_listener, AppState};
