// src/config/mod.rs

//! Configuration loading and validation for stylepipe.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Provide the built-in pipeline used when no config file exists.
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants like DAG correctness (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_builtin};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, TaskAction, TaskConfig, WatchRule};
