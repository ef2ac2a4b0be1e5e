// src/errors.rs

//! Errors raised while loading, validating and selecting tasks.
//!
//! Task actions report failures as `anyhow::Error` with context; these only
//! cross into [`StylepipeError`] through the `Other` variant.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StylepipeError {
    #[error("invalid config: {0}")]
    ConfigError(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("unknown task '{0}'")]
    TaskNotFound(String),

    #[error("task graph has a cycle through '{0}'")]
    DagCycle(String),

    #[error("cannot parse config: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StylepipeError>;
