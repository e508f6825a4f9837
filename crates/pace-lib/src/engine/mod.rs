//! A sealed view of the task graph.
//!
//! The runner detects cycles at execution time; this graph exists for the
//! static views: `list --tree` wants cycle and missing-dependency markers
//! before anything runs.

use std::collections::{HashMap, HashSet};

use petgraph::{algo::tarjan_scc, graph::NodeIndex, Graph};

use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskNode {
    Root,
    Task(String),
}

#[derive(Debug)]
pub struct Engine {
    task_graph: Graph<TaskNode, ()>,
    task_lookup: HashMap<String, NodeIndex>,
    missing: Vec<(String, String)>,
}

impl Engine {
    pub fn from_config(config: &Config) -> Self {
        let mut task_graph = Graph::default();
        let root_index = task_graph.add_node(TaskNode::Root);
        let mut task_lookup = HashMap::new();

        for name in config.tasks.keys() {
            let index = task_graph.add_node(TaskNode::Task(name.clone()));
            task_lookup.insert(name.clone(), index);
            task_graph.add_edge(index, root_index, ());
        }

        let mut missing = Vec::new();
        for (name, task) in &config.tasks {
            let source = task_lookup[name];
            for dep in &task.dependencies {
                match task_lookup.get(dep) {
                    Some(&target) => {
                        task_graph.add_edge(source, target, ());
                    }
                    None => missing.push((name.clone(), dep.clone())),
                }
            }
        }

        Self {
            task_graph,
            task_lookup,
            missing,
        }
    }

    /// Dependency edges that point at tasks the config does not define.
    pub fn missing_dependencies(&self) -> &[(String, String)] {
        &self.missing
    }

    /// Names of every task that sits on a dependency cycle.
    pub fn cyclic_tasks(&self) -> HashSet<String> {
        let mut cyclic = HashSet::new();
        for component in tarjan_scc(&self.task_graph) {
            let is_cycle = component.len() > 1
                || component
                    .first()
                    .map(|&index| self.task_graph.contains_edge(index, index))
                    .unwrap_or(false);
            if !is_cycle {
                continue;
            }
            for index in component {
                if let Some(TaskNode::Task(name)) = self.task_graph.node_weight(index) {
                    cyclic.insert(name.clone());
                }
            }
        }
        cyclic
    }

    pub fn has_task(&self, name: &str) -> bool {
        self.task_lookup.contains_key(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config(json: &str) -> Config {
        Config::from_json(json).unwrap()
    }

    #[test]
    fn test_acyclic_graph_has_no_cyclic_tasks() {
        let config = config(
            r#"{
                "tasks": {
                    "a": { "command": "true" },
                    "b": { "command": "true", "dependencies": ["a"] }
                }
            }"#,
        );
        let engine = Engine::from_config(&config);
        assert!(engine.cyclic_tasks().is_empty());
        assert!(engine.missing_dependencies().is_empty());
        assert!(engine.has_task("a"));
    }

    #[test]
    fn test_cycle_members_are_reported() {
        let config = config(
            r#"{
                "tasks": {
                    "a": { "command": "true", "dependencies": ["b"] },
                    "b": { "command": "true", "dependencies": ["a"] },
                    "c": { "command": "true" }
                }
            }"#,
        );
        let engine = Engine::from_config(&config);
        let cyclic = engine.cyclic_tasks();
        assert_eq!(cyclic, HashSet::from(["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let config = config(
            r#"{ "tasks": { "a": { "command": "true", "dependencies": ["a"] } } }"#,
        );
        let engine = Engine::from_config(&config);
        assert_eq!(engine.cyclic_tasks(), HashSet::from(["a".to_string()]));
    }

    #[test]
    fn test_missing_dependency_is_reported() {
        let config = config(
            r#"{ "tasks": { "a": { "command": "true", "dependencies": ["ghost"] } } }"#,
        );
        let engine = Engine::from_config(&config);
        assert_eq!(
            engine.missing_dependencies(),
            &[("a".to_string(), "ghost".to_string())]
        );
    }
}
