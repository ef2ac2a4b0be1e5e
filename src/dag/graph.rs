// src/dag/graph.rs

use std::collections::{BTreeSet, HashMap};

use crate::config::model::ConfigFile;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Direct prerequisites: tasks that must finish before this one can run.
    deps: Vec<String>,
    /// Direct dependents: tasks that list this one in their `after`.
    dependents: Vec<String>,
}

/// Simple in-memory DAG representation keyed by task name.
///
/// Acyclicity is validated in `config::validate`; here we only keep
/// adjacency information for scheduling and diagnostics.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: HashMap<String, DagNode>,
}

impl DagGraph {
    /// Build a DAG from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut nodes: HashMap<String, DagNode> = HashMap::new();

        for (name, task) in cfg.tasks().iter() {
            nodes.insert(
                name.clone(),
                DagNode {
                    deps: task.after.clone(),
                    dependents: Vec::new(),
                },
            );
        }

        let task_names: Vec<String> = nodes.keys().cloned().collect();
        for task_name in task_names {
            let deps = nodes
                .get(&task_name)
                .map(|n| n.deps.clone())
                .unwrap_or_default();

            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(task_name.clone());
                }
            }
        }

        Self { nodes }
    }

    /// Return all task names.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Immediate prerequisites of a task (the tasks listed in its `after`).
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list this one in their `after`).
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// The given targets plus all their transitive prerequisites, in an order
    /// where every task comes after its prerequisites. Ties are broken by
    /// name so the result is stable.
    pub fn execution_plan<S: AsRef<str>>(&self, targets: &[S]) -> Vec<String> {
        let mut order = Vec::new();
        let mut visited = BTreeSet::new();
        for target in targets {
            self.visit_post_order(target.as_ref(), &mut visited, &mut order);
        }
        order
    }

    fn visit_post_order(&self, name: &str, visited: &mut BTreeSet<String>, order: &mut Vec<String>) {
        if !self.contains(name) || !visited.insert(name.to_string()) {
            return;
        }
        let mut deps: Vec<&String> = self.dependencies_of(name).iter().collect();
        deps.sort();
        for dep in deps {
            self.visit_post_order(dep, visited, order);
        }
        order.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_plan_lists_prerequisites_first() {
        let graph = DagGraph::from_config(&ConfigFile::builtin());
        let plan = graph.execution_plan(&["build"]);
        assert_eq!(plan, vec!["minify-css", "move-html", "build"]);
    }

    #[test]
    fn watch_plan_includes_server_and_compiler() {
        let graph = DagGraph::from_config(&ConfigFile::builtin());
        let plan = graph.execution_plan(&["watch"]);
        assert_eq!(plan, vec!["browser-sync", "less", "watch"]);
        assert_eq!(graph.dependents_of("less"), &["watch".to_string()]);
    }

    #[test]
    fn unknown_targets_are_skipped() {
        let graph = DagGraph::from_config(&ConfigFile::builtin());
        assert!(graph.execution_plan(&["missing"]).is_empty());
    }
}
