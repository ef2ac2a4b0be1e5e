// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, StylepipeError};

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for unknown `after` references, cycles, bad globs and
///   watch rules that name unknown tasks.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Resolve the configuration to use for a session.
///
/// - An explicitly given path must exist.
/// - Without one, `Stylepipe.toml` in `search_dir` is used if present;
///   otherwise the built-in pipeline is returned.
///
/// Returns the config together with the path it was loaded from, if any.
pub fn load_or_builtin(
    explicit: Option<&Path>,
    search_dir: &Path,
) -> Result<(ConfigFile, Option<PathBuf>)> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(StylepipeError::ConfigError(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        let cfg = load_and_validate(path)?;
        info!(path = %path.display(), "loaded config");
        return Ok((cfg, Some(path.to_path_buf())));
    }

    let default_path = default_config_path(search_dir);
    if default_path.is_file() {
        let cfg = load_and_validate(&default_path)?;
        info!(path = %default_path.display(), "loaded config");
        Ok((cfg, Some(default_path)))
    } else {
        debug!("no config file found; using built-in pipeline");
        Ok((ConfigFile::builtin(), None))
    }
}

/// Config file looked up when `--config` is not given.
pub fn default_config_path(dir: &Path) -> PathBuf {
    dir.join(DEFAULT_CONFIG_FILE)
}

pub const DEFAULT_CONFIG_FILE: &str = "Stylepipe.toml";
