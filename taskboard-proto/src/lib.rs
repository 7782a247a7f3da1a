//! Shared definitions for `Taskboard`: the schema-less document model, the
//! task record decoded from it, the store wire protocol, and the config file
//! layer both binaries share.

pub mod collection;
pub mod config;
pub mod document;
pub mod store;
pub mod task;
