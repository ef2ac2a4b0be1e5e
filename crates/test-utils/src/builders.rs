use std::collections::BTreeMap;

use stylepipe::config::{ConfigFile, ConfigSection, RawConfigFile, TaskAction, TaskConfig, WatchRule};
use stylepipe::errors::Result;
use stylepipe::types::TriggerWhileRunningBehaviour;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_behaviour(mut self, behaviour: TriggerWhileRunningBehaviour) -> Self {
        self.config.config.triggered_while_running_behaviour = behaviour;
        self
    }

    /// Validate without panicking, for tests that expect an error.
    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(action: TaskAction) -> Self {
        Self {
            task: TaskConfig::new(action),
        }
    }

    pub fn notice(message: &str) -> Self {
        Self::new(TaskAction::Notice {
            message: message.to_string(),
        })
    }

    pub fn compile_less(src: &str, dest: &str) -> Self {
        Self::new(TaskAction::CompileLess {
            src: src.to_string(),
            dest: dest.to_string(),
        })
    }

    pub fn copy(src: &str, dest: &str) -> Self {
        Self::new(TaskAction::Copy {
            src: src.to_string(),
            dest: dest.to_string(),
        })
    }

    pub fn minify_css(src: &str, dest: &str) -> Self {
        Self::new(TaskAction::MinifyCss {
            src: src.to_string(),
            dest: dest.to_string(),
        })
    }

    pub fn reload() -> Self {
        Self::new(TaskAction::Reload)
    }

    /// A development server on an ephemeral port without browsers.
    pub fn serve(base_dir: &str) -> Self {
        Self::new(TaskAction::Serve {
            base_dir: base_dir.to_string(),
            browsers: Vec::new(),
            port: 0,
            host: "127.0.0.1".to_string(),
        })
    }

    /// A watch task with a single `glob -> task` rule.
    pub fn watch(glob: &str, run: &str) -> Self {
        Self::new(TaskAction::Watch {
            rules: vec![WatchRule::new(glob, [run])],
        })
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
