//! `Taskboard`: live terminal task board backed by a remote document store.

pub mod app;
pub mod board;
pub mod config;
pub mod remote;
pub mod sync;
pub mod ui;
