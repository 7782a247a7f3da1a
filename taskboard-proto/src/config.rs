//! Config file loading shared by the store server and the client.
//!
//! Both binaries layer their settings the same way (highest first): CLI
//! arguments, environment variables (clap `env`), a TOML file, compiled
//! defaults. This module owns the file layer. Each binary keeps its own file
//! structs and resolution, built from [`pick`].

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file {path}: {source}")]
    ParseToml {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A setting was present but unusable.
    #[error("invalid {key}: {reason}")]
    Invalid {
        /// Config key, as written in the file.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Default config file location for an application: `<config dir>/<app>/config.toml`.
#[must_use]
pub fn default_path(app: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(app).join("config.toml"))
}

/// Loads a config file of type `T`.
///
/// An explicit path must exist. Without one, the default path for `app` is
/// tried and a missing file yields `T::default()`.
///
/// # Errors
///
/// Returns [`ConfigError::ReadFile`] if the file cannot be read and
/// [`ConfigError::ParseToml`] if it is not valid for `T`.
pub fn load_file<T>(explicit: Option<&Path>, app: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    if let Some(path) = explicit {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        return parse(path, &contents);
    }

    let Some(path) = default_path(app) else {
        return Ok(T::default());
    };
    match std::fs::read_to_string(&path) {
        Ok(contents) => parse(&path, &contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(source) => Err(ConfigError::ReadFile { path, source }),
    }
}

/// Parses TOML `contents` read from `path`.
///
/// # Errors
///
/// Returns [`ConfigError::ParseToml`] naming `path` on failure.
pub fn parse<T: DeserializeOwned>(path: &Path, contents: &str) -> Result<T, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

/// First value present among CLI (or env) and file, else the default.
pub fn pick<T>(cli: Option<T>, file: Option<T>, default: T) -> T {
    cli.or(file).unwrap_or(default)
}
