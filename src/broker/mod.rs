//! # Broker Module
//!
//! A small queue service: named FIFO channels kept in memory and exposed
//! over TCP with the frame protocol in [`crate::core::protocol`].
//!
//! - `engine`: the accept loop ([`serve`])
//! - `client`: per-connection request handling
//!
//! ```bash
//! vsmq-broker --addr 127.0.0.1:7379
//! ```

pub mod client;
pub mod engine;

pub use self::engine::{serve, serve_with, start_broker};
