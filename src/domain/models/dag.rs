//! Dependency DAG over spec names: cycle detection and Kahn's-algorithm
//! topological batching for the orchestration engine (C7).

use std::collections::{HashMap, HashSet, VecDeque};

use super::spec::Spec;

#[derive(Debug, Clone)]
pub struct DagNode {
    pub name: String,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
}

impl DagNode {
    fn from_spec(spec: &Spec) -> Self {
        let mut dependencies: Vec<String> = spec.dependencies.iter().cloned().collect();
        dependencies.sort();
        Self {
            name: spec.name.clone(),
            dependencies,
            dependents: Vec::new(),
        }
    }

    pub fn is_ready(&self, completed: &HashSet<String>) -> bool {
        self.dependencies.iter().all(|dep| completed.contains(dep))
    }
}

/// A DAG over a spec portfolio's dependency edges.
#[derive(Debug, Clone)]
pub struct SpecDag {
    pub nodes: HashMap<String, DagNode>,
    pub roots: Vec<String>,
    pub leaves: Vec<String>,
}

impl SpecDag {
    pub fn from_specs(specs: &[Spec]) -> Self {
        let mut nodes: HashMap<String, DagNode> = HashMap::new();
        let mut has_dependents: HashSet<String> = HashSet::new();

        for spec in specs {
            nodes.insert(spec.name.clone(), DagNode::from_spec(spec));
        }

        let names: Vec<String> = specs.iter().map(|s| s.name.clone()).collect();
        for spec in specs {
            for dep in &spec.dependencies {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(spec.name.clone());
                    has_dependents.insert(dep.clone());
                }
            }
        }
        for node in nodes.values_mut() {
            node.dependents.sort();
        }

        let roots: Vec<String> = names
            .iter()
            .filter(|name| {
                nodes
                    .get(*name)
                    .is_some_and(|n| n.dependencies.iter().all(|d| !nodes.contains_key(d)))
            })
            .cloned()
            .collect();

        let leaves: Vec<String> = names
            .iter()
            .filter(|name| !has_dependents.contains(*name))
            .cloned()
            .collect();

        Self { nodes, roots, leaves }
    }

    pub fn has_cycle(&self) -> bool {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        for name in self.nodes.keys() {
            if self.detect_cycle_dfs(name, &mut visited, &mut rec_stack) {
                return true;
            }
        }
        false
    }

    fn detect_cycle_dfs(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
    ) -> bool {
        if rec_stack.contains(name) {
            return true;
        }
        if visited.contains(name) {
            return false;
        }
        visited.insert(name.to_string());
        rec_stack.insert(name.to_string());

        if let Some(node) = self.nodes.get(name) {
            for dependent in &node.dependents {
                if self.detect_cycle_dfs(dependent, visited, rec_stack) {
                    return true;
                }
            }
        }

        rec_stack.remove(name);
        false
    }

    /// Batches via Kahn's algorithm; secondary ordering within a batch is
    /// lexicographic by spec name.
    pub fn execution_waves(&self) -> Result<Vec<Vec<String>>, DagError> {
        if self.has_cycle() {
            return Err(DagError::CycleDetected);
        }

        let mut waves = Vec::new();
        let mut remaining: HashSet<String> = self.nodes.keys().cloned().collect();
        let mut completed: HashSet<String> = HashSet::new();

        while !remaining.is_empty() {
            let mut wave: Vec<String> = remaining
                .iter()
                .filter(|name| {
                    self.nodes
                        .get(*name)
                        .is_some_and(|node| node.is_ready(&completed))
                })
                .cloned()
                .collect();

            if wave.is_empty() {
                return Err(DagError::CycleDetected);
            }
            wave.sort();

            for name in &wave {
                remaining.remove(name);
                completed.insert(name.clone());
            }
            waves.push(wave);
        }

        Ok(waves)
    }

    pub fn topological_sort(&self) -> Result<Vec<String>, DagError> {
        Ok(self.execution_waves()?.into_iter().flatten().collect())
    }

    pub fn get_all_dependents(&self, name: &str) -> HashSet<String> {
        let mut result = HashSet::new();
        let mut queue = VecDeque::new();
        if let Some(node) = self.nodes.get(name) {
            queue.extend(node.dependents.iter().cloned());
        }
        while let Some(current) = queue.pop_front() {
            if result.insert(current.clone()) {
                if let Some(node) = self.nodes.get(&current) {
                    queue.extend(node.dependents.iter().cloned());
                }
            }
        }
        result
    }

    pub fn stats(&self) -> DagStats {
        let waves = self.execution_waves().unwrap_or_default();
        DagStats {
            total_nodes: self.nodes.len(),
            root_count: self.roots.len(),
            leaf_count: self.leaves.len(),
            wave_count: waves.len(),
            max_parallelism: waves.iter().map(Vec::len).max().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DagStats {
    pub total_nodes: usize,
    pub root_count: usize,
    pub leaf_count: usize,
    pub wave_count: usize,
    pub max_parallelism: usize,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DagError {
    #[error("cycle detected in spec dependencies")]
    CycleDetected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::spec::SpecRole;
    use std::collections::HashSet as Set;

    fn spec(name: &str, deps: &[&str]) -> Spec {
        Spec::new(
            name,
            SpecRole::Sub,
            deps.iter().map(|d| d.to_string()).collect::<Set<_>>(),
        )
    }

    #[test]
    fn simple_chain_has_no_cycle() {
        let specs = vec![spec("01-01-a", &[]), spec("01-02-b", &["01-01-a"])];
        let dag = SpecDag::from_specs(&specs);
        assert!(!dag.has_cycle());
        assert_eq!(dag.roots, vec!["01-01-a".to_string()]);
    }

    #[test]
    fn execution_waves_respect_dependencies_and_lexicographic_order() {
        let specs = vec![
            spec("01-02-b", &[]),
            spec("01-01-a", &[]),
            spec("01-03-c", &["01-01-a", "01-02-b"]),
        ];
        let dag = SpecDag::from_specs(&specs);
        let waves = dag.execution_waves().unwrap();
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0], vec!["01-01-a".to_string(), "01-02-b".to_string()]);
        assert_eq!(waves[1], vec!["01-03-c".to_string()]);
    }

    #[test]
    fn cycle_is_detected() {
        let specs = vec![
            spec("01-01-a", &["01-02-b"]),
            spec("01-02-b", &["01-01-a"]),
        ];
        let dag = SpecDag::from_specs(&specs);
        assert!(dag.has_cycle());
        assert!(dag.execution_waves().is_err());
    }

    #[test]
    fn dependents_are_transitive() {
        let specs = vec![
            spec("01-01-a", &[]),
            spec("01-02-b", &["01-01-a"]),
            spec("01-03-c", &["01-02-b"]),
        ];
        let dag = SpecDag::from_specs(&specs);
        let deps = dag.get_all_dependents("01-01-a");
        assert!(deps.contains("01-02-b"));
        assert!(deps.contains("01-03-c"));
    }
}
