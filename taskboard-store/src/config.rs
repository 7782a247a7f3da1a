//! Store server settings.
//!
//! CLI flags (or their `TASKBOARD_STORE_*` env vars) win over the `[server]`
//! table of `~/.config/taskboard-store/config.toml`, which wins over the
//! compiled defaults. The bind address is parsed and the payload limit
//! checked here, so a bad value fails at startup instead of at bind time.

use std::net::SocketAddr;
use std::path::PathBuf;

use taskboard_proto::config::{self, ConfigError, pick};

use crate::server::DEFAULT_MAX_PAYLOAD_SIZE;

/// Directory name under the platform config dir.
const APP_DIR: &str = "taskboard-store";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9300";

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StoreFile {
    server: ServerTable,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ServerTable {
    bind_addr: Option<String>,
    max_payload_size: Option<usize>,
}

/// Command line of `taskboard-store`.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Taskboard document store")]
pub struct StoreCliArgs {
    /// Address to listen on, e.g. `127.0.0.1:9300`.
    #[arg(short, long, env = "TASKBOARD_STORE_ADDR")]
    pub bind: Option<String>,

    /// Config file (default: `~/.config/taskboard-store/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Largest accepted request frame, in bytes.
    #[arg(long, env = "TASKBOARD_STORE_MAX_PAYLOAD")]
    pub max_payload_size: Option<usize>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info", env = "TASKBOARD_STORE_LOG")]
    pub log_level: String,
}

/// Validated store server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub bind_addr: SocketAddr,
    /// Request frames above this many bytes are refused.
    pub max_payload_size: usize,
    pub log_level: String,
}

impl StoreConfig {
    /// Reads the config file and layers the command line over it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or a
    /// resolved value is unusable.
    pub fn load(cli: &StoreCliArgs) -> Result<Self, ConfigError> {
        let file: StoreFile = config::load_file(cli.config.as_deref(), APP_DIR)?;
        Self::resolve(cli, file.server)
    }

    fn resolve(cli: &StoreCliArgs, file: ServerTable) -> Result<Self, ConfigError> {
        let bind = pick(cli.bind.clone(), file.bind_addr, DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
            key: "bind_addr",
            reason: format!("{bind:?}: {e}"),
        })?;

        let max_payload_size = pick(
            cli.max_payload_size,
            file.max_payload_size,
            DEFAULT_MAX_PAYLOAD_SIZE,
        );
        if max_payload_size == 0 {
            return Err(ConfigError::Invalid {
                key: "max_payload_size",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            bind_addr,
            max_payload_size,
            log_level: cli.log_level.clone(),
        })
    }
}
