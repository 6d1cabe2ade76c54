//! Server engine for the queue service.
//!
//! Exposes [`serve`], which accepts TCP connections and answers PUSH, POP and
//! LEN frames against an in-memory set of channels.

pub mod server;

pub use server::{serve, serve_with, start_broker};
