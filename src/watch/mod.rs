// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling the glob of each watch rule.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Turning changed paths into task-level triggers.
//!
//! It does **not** know about the DAG; the runtime decides what a trigger
//! means for the current run.

pub mod event_handler;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use patterns::{WatchProfile, build_watch_profiles, collect_matching_files, compile_glob, glob_base};
pub use watcher::{WatcherHandle, spawn_watcher};
