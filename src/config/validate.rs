// src/config/validate.rs

use globset::Glob;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, TaskAction};
use crate::errors::{Result, StylepipeError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = StylepipeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_actions(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(StylepipeError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}


fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(StylepipeError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(StylepipeError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_actions(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        match &task.action {
            TaskAction::Watch { rules } => {
                for rule in rules {
                    check_glob(name, &rule.glob)?;
                    if rule.run.is_empty() {
                        return Err(StylepipeError::ConfigError(format!(
                            "task '{}': watch rule for '{}' has an empty `run` list",
                            name, rule.glob
                        )));
                    }
                    for target in &rule.run {
                        if !cfg.task.contains_key(target) {
                            return Err(StylepipeError::ConfigError(format!(
                                "task '{}': watch rule for '{}' runs unknown task '{}'",
                                name, rule.glob, target
                            )));
                        }
                        if target == name {
                            return Err(StylepipeError::ConfigError(format!(
                                "task '{}': watch rule for '{}' cannot re-run the watch task itself",
                                name, rule.glob
                            )));
                        }
                    }
                }
            }
            TaskAction::Copy { src, .. } => check_glob(name, src)?,
            TaskAction::CompileLess { src, .. } | TaskAction::MinifyCss { src, .. } => {
                if src.trim().is_empty() {
                    return Err(StylepipeError::ConfigError(format!(
                        "task '{}': `src` must not be empty",
                        name
                    )));
                }
            }
            TaskAction::Serve { .. } | TaskAction::Reload | TaskAction::Notice { .. } => {}
        }
    }
    Ok(())
}

fn check_glob(task: &str, pattern: &str) -> Result<()> {
    Glob::new(pattern).map_err(|e| {
        StylepipeError::ConfigError(format!(
            "task '{}': invalid glob pattern '{}': {}",
            task, pattern, e
        ))
    })?;
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task
    // For:
    //   [task.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(StylepipeError::DagCycle(cycle.node_id().to_string())),
    }
}
