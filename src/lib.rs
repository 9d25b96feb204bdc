#![forbid(unsafe_code)]

//! `engine-bridge` library: bridges WebSocket clients to dedicated
//! line-protocol engine processes.

pub mod config;
pub mod engine;
pub mod errors;
pub mod gateway;
pub mod platform;
pub mod session;

pub use config::BridgeConfig;
pub use errors::{AppError, Result};
