//! Configuration for the Taskboard client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskboard/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

pub use taskboard_proto::config::ConfigError;
use taskboard_proto::config::{self, pick};
use taskboard_proto::task::{COLLECTION, MAX_TASK_NAME_LENGTH};

use crate::remote::ws::WsStoreOptions;
use crate::sync::SyncOptions;

/// Directory name under the platform config dir.
const APP_DIR: &str = "taskboard";

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    store: StoreFileConfig,
    board: BoardFileConfig,
}

/// `[store]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StoreFileConfig {
    url: Option<String>,
    collection: Option<String>,
    connect_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    channel_capacity: Option<usize>,
}

/// `[board]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BoardFileConfig {
    max_name_len: Option<usize>,
    poll_timeout_ms: Option<u64>,
    date_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Store --
    /// WebSocket URL of the store; `None` runs the offline demo.
    pub store_url: Option<String>,
    /// Collection holding the tasks.
    pub collection: String,
    /// Timeout for connecting to the store.
    pub connect_timeout: Duration,
    /// Timeout for each store request.
    pub request_timeout: Duration,
    /// Snapshot buffer per subscription.
    pub channel_capacity: usize,

    // -- Board --
    /// Maximum task name length in characters.
    pub max_name_len: usize,
    /// Poll timeout for the TUI event loop.
    pub poll_timeout: Duration,
    /// Due date display and input format (chrono).
    pub date_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            collection: COLLECTION.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            channel_capacity: 16,
            max_name_len: MAX_TASK_NAME_LENGTH,
            poll_timeout: Duration::from_millis(50),
            date_format: "%Y-%m-%d".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = config::load_file(cli.config.as_deref(), APP_DIR)?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default. Kept apart from `load()` so it can be
    /// tested without touching the filesystem.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            store_url: cli
                .store_url
                .clone()
                .or_else(|| file.store.url.clone())
                .filter(|u| !u.trim().is_empty()),
            collection: pick(
                cli.collection.clone(),
                file.store.collection.clone(),
                defaults.collection,
            ),
            connect_timeout: file
                .store
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            request_timeout: file
                .store
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            channel_capacity: file
                .store
                .channel_capacity
                .unwrap_or(defaults.channel_capacity),
            max_name_len: file.board.max_name_len.unwrap_or(defaults.max_name_len),
            poll_timeout: file
                .board
                .poll_timeout_ms
                .map_or(defaults.poll_timeout, Duration::from_millis),
            date_format: pick(
                cli.date_format.clone(),
                file.board.date_format.clone(),
                defaults.date_format,
            ),
        }
    }

    /// Connection settings for [`WsStore`](crate::remote::ws::WsStore).
    #[must_use]
    pub fn store_options(&self) -> WsStoreOptions {
        WsStoreOptions {
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            channel_capacity: self.channel_capacity,
        }
    }

    /// Settings for the [`SyncEngine`](crate::sync::SyncEngine).
    #[must_use]
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            collection: self.collection.clone(),
            max_name_len: self.max_name_len,
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Live terminal task board")]
pub struct CliArgs {
    /// WebSocket URL of the store (e.g. `ws://127.0.0.1:9300/ws`).
    #[arg(long, env = "TASKBOARD_STORE_URL")]
    pub store_url: Option<String>,

    /// Collection holding the tasks.
    #[arg(long)]
    pub collection: Option<String>,

    /// Path to config file (default: `~/.config/taskboard/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Due date format (chrono format string).
    #[arg(long)]
    pub date_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKBOARD_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/taskboard.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
