//! `depends_on` edges of one compose manifest.
//!
//! Built while the containers of a manifest are validated and queried once
//! all of them have been classified. Never persisted.

use std::collections::{BTreeMap, BTreeSet};

/// Directed edges `container -> dependency`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.edges.entry(from.into()).or_default().insert(to.into());
    }

    /// Whether `from` declares a direct dependency on `to`.
    pub fn depends_on(&self, from: &str, to: &str) -> bool {
        self.edges.get(from).is_some_and(|deps| deps.contains(to))
    }
}
