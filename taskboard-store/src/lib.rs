//! Taskboard store library.
//!
//! An in-memory document store reachable over WebSocket. Exposed as a
//! library so tests and tools can embed the server.

pub mod collection;
pub mod config;
pub mod server;
