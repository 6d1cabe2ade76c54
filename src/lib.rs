//! vsmq – queue-backed request/response messaging for a vector store.
//!
//! This crate exports
//!  * `core`    – messages, queue transports, publisher, subscriber, queue manager
//!  * `service` – the dispatcher and the vector store service built on it
//!  * `client`  – response correlation and typed client helpers
//!  * `broker`  – the TCP queue service
//!  * `store`   – the vector store capability and its in-memory implementation
//!  * `config`  – TOML + environment configuration
//!
//! Binaries: `vsmq` (service), `vsmq-broker` (queue service), `vsmq-cli`.

// ───────────────────────────────────────────────────────────
// Public modules
// ───────────────────────────────────────────────────────────
pub mod broker;
pub mod client;
pub mod config;
pub mod core;
pub mod logging;
pub mod service;
pub mod store;
pub mod util;

// ───────────────────────────────────────────────────────────
// Re-exports
// ───────────────────────────────────────────────────────────
pub use broker::{serve as serve_broker, start_broker};
pub use client::{ResponseRouter, ResponseWaiter, VectorStoreClient};
pub use config::{load_config, Config, ConfigError};
pub use service::{Dispatcher, VectorStoreService};
pub use store::{MemoryVectorStore, VectorStore};
