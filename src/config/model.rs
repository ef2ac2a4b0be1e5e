// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, TriggerWhileRunningBehaviour};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// triggered_while_running_behaviour = "queue"
///
/// [task.less]
/// kind = "compile_less"
/// src = "app/less/style.less"
/// dest = "app/css"
///
/// [task.build]
/// kind = "notice"
/// message = "Build complete"
/// after = ["move-html", "minify-css"]
/// ```
///
/// Use `ConfigFile::try_from` to obtain a validated [`ConfigFile`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration.
///
/// Only constructible through validation (`TryFrom<RawConfigFile>`) or
/// [`ConfigFile::builtin`], so holders can rely on the task graph being
/// acyclic and every reference resolving.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub(crate) config: ConfigSection,
    pub(crate) task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, task: BTreeMap<String, TaskConfig>) -> Self {
        Self { config, task }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.task.get(name)
    }

    /// The pipeline used when no config file is present:
    ///
    /// - `less`: `app/less/style.less` -> `app/css`
    /// - `browser-sync`: serve `app`, open iexplore + chrome
    /// - `browser-sync-reload`
    /// - `watch` (after browser-sync, less)
    /// - `move-html`: `app/**/*.html` -> `dist`
    /// - `minify-css`: `app/css/style.css` -> `dist/css`
    /// - `build` (after move-html, minify-css)
    pub fn builtin() -> Self {
        let mut task = BTreeMap::new();

        task.insert(
            "less".to_string(),
            TaskConfig::new(TaskAction::CompileLess {
                src: "app/less/style.less".to_string(),
                dest: "app/css".to_string(),
            }),
        );
        task.insert(
            "browser-sync".to_string(),
            TaskConfig::new(TaskAction::Serve {
                base_dir: "app".to_string(),
                browsers: vec!["iexplore".to_string(), "chrome".to_string()],
                port: DEFAULT_SERVER_PORT,
                host: DEFAULT_SERVER_HOST.to_string(),
            }),
        );
        task.insert(
            "browser-sync-reload".to_string(),
            TaskConfig::new(TaskAction::Reload),
        );
        task.insert(
            "watch".to_string(),
            TaskConfig::new(TaskAction::Watch {
                rules: vec![
                    WatchRule::new("app/less/style.less", ["less"]),
                    WatchRule::new("app/css/*.css", ["browser-sync-reload"]),
                    WatchRule::new("app/**/*.html", ["browser-sync-reload"]),
                ],
            })
            .with_after(["browser-sync", "less"]),
        );
        task.insert(
            "move-html".to_string(),
            TaskConfig::new(TaskAction::Copy {
                src: "app/**/*.html".to_string(),
                dest: "dist".to_string(),
            }),
        );
        task.insert(
            "minify-css".to_string(),
            TaskConfig::new(TaskAction::MinifyCss {
                src: "app/css/style.css".to_string(),
                dest: "dist/css".to_string(),
            }),
        );
        task.insert(
            "build".to_string(),
            TaskConfig::new(TaskAction::Notice {
                message: "Build complete".to_string(),
            })
            .with_after(["move-html", "minify-css"]),
        );

        Self::new_unchecked(ConfigSection::default(), task)
    }
}

/// `[config]` section.
///
/// Controls behaviour when watch triggers arrive while a run is active.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// `"queue"` (default) or `"cancel"`.
    #[serde(default)]
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskConfig {
    /// Prerequisites: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// What the task does, selected by `kind = "..."`.
    #[serde(flatten)]
    pub action: TaskAction,
}

impl TaskConfig {
    pub fn new(action: TaskAction) -> Self {
        Self {
            after: Vec::new(),
            action,
        }
    }

    pub fn with_after<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.after.extend(deps.into_iter().map(Into::into));
        self
    }
}

/// The action performed by a task body.
///
/// Paths are relative to the project root.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskAction {
    /// Compile one LESS file into `dest/<stem>.css`.
    CompileLess { src: String, dest: String },

    /// Start the live-reload development server.
    Serve {
        base_dir: String,
        #[serde(default)]
        browsers: Vec<String>,
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default = "default_host")]
        host: String,
    },

    /// Ask connected browsers to reload.
    Reload,

    /// Re-run tasks when files matching a rule change.
    Watch {
        #[serde(default)]
        rules: Vec<WatchRule>,
    },

    /// Copy every file matching the `src` glob into `dest`, mirroring paths
    /// relative to the glob base.
    Copy { src: String, dest: String },

    /// Minify one CSS file into `dest/<file name>`.
    MinifyCss { src: String, dest: String },

    /// Print a message once all prerequisites are done.
    Notice { message: String },
}

fn default_port() -> u16 {
    DEFAULT_SERVER_PORT
}

fn default_host() -> String {
    DEFAULT_SERVER_HOST.to_string()
}

impl TaskAction {
    /// Long-lived actions keep running after they report progress.
    pub fn is_long_lived(&self) -> bool {
        matches!(self, TaskAction::Serve { .. } | TaskAction::Watch { .. })
    }

    /// The `kind` string used in config files.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskAction::CompileLess { .. } => "compile_less",
            TaskAction::Serve { .. } => "serve",
            TaskAction::Reload => "reload",
            TaskAction::Watch { .. } => "watch",
            TaskAction::Copy { .. } => "copy",
            TaskAction::MinifyCss { .. } => "minify_css",
            TaskAction::Notice { .. } => "notice",
        }
    }
}

/// One `{ glob = "...", run = [...] }` entry of a watch task.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WatchRule {
    /// Glob relative to the project root.
    pub glob: String,
    /// Tasks to trigger when a matching file changes.
    pub run: Vec<String>,
}

impl WatchRule {
    pub fn new<I, S>(glob: impl Into<String>, run: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            glob: glob.into(),
            run: run.into_iter().map(Into::into).collect(),
        }
    }
}
