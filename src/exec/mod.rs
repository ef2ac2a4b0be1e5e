// src/exec/mod.rs

//! Task execution layer.
//!
//! Runs the actions of scheduled tasks on Tokio tasks and reports back to
//! the orchestration runtime via `RuntimeEvent`s.
//!
//! - [`executor_loop`] owns the background loop that keeps at most one
//!   instance per task name alive.
//! - [`task_runner`] runs a single task body and reports its outcome.
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`; tests swap in a fake.

pub mod backend;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use executor_loop::spawn_executor;
