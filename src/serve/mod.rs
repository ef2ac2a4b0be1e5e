// src/serve/mod.rs

//! Development server: static files from a base directory, a live-reload
//! WebSocket endpoint, and script injection into served HTML pages.
//!
//! - [`session`] owns the bound server and the reload broadcast channel.
//! - [`inject`] rewrites HTML responses to include the reload client.
//! - [`browser`] launches browsers at the server URL.

pub mod browser;
pub mod inject;
pub mod session;

pub use browser::{browser_command, launch_browsers};
pub use inject::{RELOAD_SCRIPT, inject_script};
pub use session::{RunningServer, ServerSession, start_server};

/// Text frame sent to browsers that should reload.
pub const RELOAD_MESSAGE: &str = "reload";
