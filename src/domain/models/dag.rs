//! Task DAG domain model.
//!
//! Adapted from the `Uuid`-keyed `TaskDag` (cycle detection +
//! Kahn-level wave computation) to the delegation engine's string task ids
//! (`"task_1"`, …) and to validate a `Plan` rather than a persisted task
//! store.

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;

/// DAG validation/construction errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DagError {
    #[error("cycle detected in task dependency graph")]
    CycleDetected,

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },
}

/// A node in the DAG: a task id plus its declared dependency and dependent
/// edges.
#[derive(Debug, Clone)]
pub struct DagNode {
    pub task_id: String,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
}

impl DagNode {
    fn is_ready(&self, completed: &HashSet<String>) -> bool {
        self.dependencies.iter().all(|dep| completed.contains(dep))
    }
}

/// A DAG over task ids and their declared `dependencies` lists.
#[derive(Debug, Clone, Default)]
pub struct TaskDag {
    pub nodes: HashMap<String, DagNode>,
}

impl TaskDag {
    /// Build a DAG from `(task_id, dependencies)` pairs. Does not itself
    /// reject unknown dependency ids — call [`TaskDag::validate`] first.
    pub fn new(edges: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        let mut nodes: HashMap<String, DagNode> = HashMap::new();

        for (task_id, dependencies) in edges {
            nodes.insert(
                task_id.clone(),
                DagNode {
                    task_id,
                    dependencies,
                    dependents: Vec::new(),
                },
            );
        }

        let ids: Vec<String> = nodes.keys().cloned().collect();
        for id in &ids {
            let deps = nodes[id].dependencies.clone();
            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(id.clone());
                }
            }
        }

        Self { nodes }
    }

    /// Reject a plan whose dependencies reference unknown task ids (I1) or
    /// which contains a cycle (I1).
    pub fn validate(&self) -> Result<(), DagError> {
        for node in self.nodes.values() {
            for dep in &node.dependencies {
                if !self.nodes.contains_key(dep) {
                    return Err(DagError::UnknownDependency {
                        task: node.task_id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        if self.has_cycle() {
            return Err(DagError::CycleDetected);
        }

        Ok(())
    }

    /// DFS cycle detection over the dependency edges (grey/black marks).
    pub fn has_cycle(&self) -> bool {
        #[derive(PartialEq)]
        enum Mark {
            Grey,
            Black,
        }

        let mut marks: HashMap<&str, Mark> = HashMap::new();

        fn visit<'a>(
            id: &'a str,
            nodes: &'a HashMap<String, DagNode>,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> bool {
            match marks.get(id) {
                Some(Mark::Grey) => return true,
                Some(Mark::Black) => return false,
                None => {}
            }
            marks.insert(id, Mark::Grey);
            if let Some(node) = nodes.get(id) {
                for dep in &node.dependencies {
                    if visit(dep, nodes, marks) {
                        return true;
                    }
                }
            }
            marks.insert(id, Mark::Black);
            false
        }

        for id in self.nodes.keys() {
            if visit(id, &self.nodes, &mut marks) {
                return true;
            }
        }
        false
    }

    /// Partition the DAG into execution waves via Kahn's algorithm: wave 0
    /// is every task with no dependencies; wave k+1 is every task whose
    /// dependencies are all in waves ≤ k.
    pub fn execution_waves(&self) -> Result<Vec<Vec<String>>, DagError> {
        self.validate()?;

        let mut waves = Vec::new();
        let mut remaining: HashSet<String> = self.nodes.keys().cloned().collect();
        let mut completed: HashSet<String> = HashSet::new();

        while !remaining.is_empty() {
            let wave: Vec<String> = remaining
                .iter()
                .filter(|id| {
                    self.nodes
                        .get(*id)
                        .map(|n| n.is_ready(&completed))
                        .unwrap_or(false)
                })
                .cloned()
                .collect();

            if wave.is_empty() {
                return Err(DagError::CycleDetected);
            }

            for id in &wave {
                remaining.remove(id);
                completed.insert(id.clone());
            }
            waves.push(wave);
        }

        Ok(waves)
    }

    /// Topological order, used by scenario-level ordering assertions (P2).
    pub fn topological_sort(&self) -> Result<Vec<String>, DagError> {
        Ok(self.execution_waves()?.into_iter().flatten().collect())
    }

    /// Every task id that transitively depends on `task_id` — used for
    /// cascading `skipped (dependency failed)` when a wave member fails.
    pub fn transitive_dependents(&self, task_id: &str) -> HashSet<String> {
        let mut result = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        if let Some(node) = self.nodes.get(task_id) {
            queue.extend(node.dependents.iter().cloned());
        }

        while let Some(id) = queue.pop_front() {
            if result.insert(id.clone()) {
                if let Some(node) = self.nodes.get(&id) {
                    queue.extend(node.dependents.iter().cloned());
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dag(edges: &[(&str, &[&str])]) -> TaskDag {
        TaskDag::new(
            edges
                .iter()
                .map(|(id, deps)| ((*id).to_string(), deps.iter().map(|d| (*d).to_string()).collect())),
        )
    }

    #[test]
    fn linear_chain_sorts_in_order() {
        let d = dag(&[("t1", &[]), ("t2", &["t1"]), ("t3", &["t2"])]);
        let sorted = d.topological_sort().unwrap();
        let pos = |id: &str| sorted.iter().position(|x| x == id).unwrap();
        assert!(pos("t1") < pos("t2"));
        assert!(pos("t2") < pos("t3"));
    }

    #[test]
    fn diamond_has_two_waves_then_join() {
        let d = dag(&[
            ("t1", &[]),
            ("t2", &[]),
            ("t3", &["t1"]),
            ("t4", &["t1", "t2"]),
        ]);
        let waves = d.execution_waves().unwrap();
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0].len(), 2);
        assert_eq!(waves[1].len(), 2);
    }

    #[test]
    fn cycle_is_rejected() {
        let d = dag(&[("t1", &["t2"]), ("t2", &["t1"])]);
        assert!(d.has_cycle());
        assert!(matches!(d.validate(), Err(DagError::CycleDetected)));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let d = dag(&[("t1", &["missing"])]);
        assert!(matches!(
            d.validate(),
            Err(DagError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn single_task_plan_is_one_wave() {
        let d = dag(&[("t1", &[])]);
        let waves = d.execution_waves().unwrap();
        assert_eq!(waves, vec![vec!["t1".to_string()]]);
    }
}
