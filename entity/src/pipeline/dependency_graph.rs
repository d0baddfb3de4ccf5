//! Dependency validation over configured plugin names.
//!
//! The sort is used to validate configuration and to order resource
//! construction. Stage plugins still run in declaration order.

use crate::errors::{CircularDependencyError, InitializationError, MissingDependencyError};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Suffix marking a dependency as optional.
pub const OPTIONAL_MARKER: char = '?';

/// Why a dependency map cannot be sorted.
#[derive(Debug, Clone, Error)]
pub enum DependencyError {
    /// The map contains a cycle.
    #[error(transparent)]
    Cycle(#[from] CircularDependencyError),
    /// A required dependency names nothing in the map.
    #[error(transparent)]
    Missing(#[from] MissingDependencyError),
}

impl From<DependencyError> for InitializationError {
    fn from(err: DependencyError) -> Self {
        match err {
            DependencyError::Cycle(e) => e.into(),
            DependencyError::Missing(e) => e.into(),
        }
    }
}

/// Name → dependencies, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    order: Vec<String>,
    edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Builds a graph from `(name, dependencies)` pairs.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<String>)>,
        S: Into<String>,
    {
        let mut graph = Self::default();
        for (name, deps) in entries {
            graph.add(name, deps);
        }
        graph
    }

    /// Adds or replaces a node.
    pub fn add(&mut self, name: impl Into<String>, dependencies: Vec<String>) {
        let name = name.into();
        if !self.edges.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.edges.insert(name, dependencies);
    }

    /// Returns true if the node exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    /// Returns the dependencies of `name` that resolve to nodes, markers stripped.
    ///
    /// Unresolved optional dependencies are dropped. Unresolved required ones
    /// are kept so callers can report them.
    #[must_use]
    pub fn resolved_dependencies(&self, name: &str) -> Vec<String> {
        let Some(deps) = self.edges.get(name) else {
            return Vec::new();
        };
        deps.iter()
            .filter_map(|dep| match dep.strip_suffix(OPTIONAL_MARKER) {
                Some(optional) if self.contains(optional) => Some(optional.to_string()),
                Some(_) => None,
                None => Some(dep.clone()),
            })
            .collect()
    }

    /// Orders nodes so every node follows its dependencies.
    ///
    /// Ties keep declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::Missing`] for the first required dependency
    /// that is not a node, otherwise [`DependencyError::Cycle`] with the path
    /// of the first cycle found.
    pub fn topological_sort(&self) -> Result<Vec<String>, DependencyError> {
        for name in &self.order {
            for dep in self.resolved_dependencies(name) {
                if !self.contains(&dep) {
                    return Err(MissingDependencyError::new(name, dep, self.order.clone()).into());
                }
            }
        }

        let mut visited = HashSet::new();
        let mut on_path = HashSet::new();
        let mut path = Vec::new();
        let mut sorted = Vec::with_capacity(self.order.len());

        for name in &self.order {
            if !visited.contains(name) {
                self.visit(name, &mut visited, &mut on_path, &mut path, &mut sorted)?;
            }
        }
        Ok(sorted)
    }

    fn visit(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        on_path: &mut HashSet<String>,
        path: &mut Vec<String>,
        sorted: &mut Vec<String>,
    ) -> Result<(), CircularDependencyError> {
        visited.insert(node.to_string());
        on_path.insert(node.to_string());
        path.push(node.to_string());

        for dep in self.resolved_dependencies(node) {
            if on_path.contains(&dep) {
                let start = path.iter().position(|n| *n == dep).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(dep);
                return Err(CircularDependencyError::new(cycle));
            }
            if !visited.contains(&dep) {
                self.visit(&dep, visited, on_path, path, sorted)?;
            }
        }

        path.pop();
        on_path.remove(node);
        sorted.push(node.to_string());
        Ok(())
    }
}
