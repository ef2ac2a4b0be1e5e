// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Task run when none is named on the command line.
pub const DEFAULT_TASK: &str = "build";

/// Command-line arguments for `stylepipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stylepipe",
    version,
    about = "Compile LESS, serve with live reload and build a dist folder.",
    long_about = None
)]
pub struct CliArgs {
    /// Tasks to run, together with their prerequisites.
    ///
    /// Default: `build`.
    #[arg(value_name = "TASK")]
    pub tasks: Vec<String>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Stylepipe.toml` in the project root; if that does not exist
    /// the built-in pipeline is used.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Project root all task paths are relative to.
    ///
    /// Default: the directory of the config file, else the current directory.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STYLEPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the task graph and the execution plan, then exit.
    #[arg(long)]
    pub list: bool,
}

impl CliArgs {
    /// The requested task names, falling back to [`DEFAULT_TASK`].
    pub fn requested_tasks(&self) -> Vec<String> {
        if self.tasks.is_empty() {
            vec![DEFAULT_TASK.to_string()]
        } else {
            self.tasks.clone()
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_build() {
        let args = CliArgs::try_parse_from(["stylepipe"]).unwrap();
        assert_eq!(args.requested_tasks(), vec!["build".to_string()]);
        assert!(args.config.is_none());
        assert!(!args.list);
    }

    #[test]
    fn positional_tasks_and_flags() {
        let args = CliArgs::try_parse_from([
            "stylepipe",
            "watch",
            "less",
            "--root",
            "site",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.requested_tasks(), vec!["watch", "less"]);
        assert_eq!(args.root, Some(PathBuf::from("site")));
        assert_eq!(args.log_level, Some(LogLevel::Debug));
    }
}
