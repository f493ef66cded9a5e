//! Validated, immutable dependency graph

use std::collections::HashMap;

use super::DependencyGraphBuilder;
use crate::workflow::Action;

/// Actions with their parent edges, checked acyclic
///
/// Only parent edges are stored; children are computed on demand. The graph
/// is immutable once built and is shared read-only by every run of the
/// workflow it belongs to.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    actions: Vec<Action>,
    index: HashMap<String, usize>,
    parents: Vec<Vec<usize>>,
    groups: Vec<u32>,
    order: Vec<usize>,
}

impl DependencyGraph {
    pub(crate) fn new(
        actions: Vec<Action>,
        index: HashMap<String, usize>,
        parents: Vec<Vec<usize>>,
        groups: Vec<u32>,
        order: Vec<usize>,
    ) -> Self {
        Self {
            actions,
            index,
            parents,
            groups,
            order,
        }
    }

    pub fn builder() -> DependencyGraphBuilder {
        DependencyGraphBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Action> {
        self.index.get(id).map(|&i| &self.actions[i])
    }

    /// Actions in declaration order
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    /// Actions with every parent before its children, ties in declaration order
    pub fn topological_order(&self) -> impl Iterator<Item = &Action> {
        self.order.iter().map(move |&i| &self.actions[i])
    }

    /// Direct parents of an action
    pub fn parents(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|&i| {
                self.parents[i]
                    .iter()
                    .map(|&p| self.actions[p].id())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Direct children of an action, in declaration order
    pub fn children(&self, id: &str) -> Vec<&str> {
        let Some(&target) = self.index.get(id) else {
            return Vec::new();
        };
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, parents)| parents.contains(&target))
            .map(|(child, _)| self.actions[child].id())
            .collect()
    }

    pub fn group_of(&self, id: &str) -> Option<u32> {
        self.index.get(id).map(|&i| self.groups[i])
    }

    /// Distinct groups in ascending order
    pub fn groups(&self) -> Vec<u32> {
        let mut groups = self.groups.clone();
        groups.sort_unstable();
        groups.dedup();
        groups
    }

    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }

    pub(crate) fn action_at(&self, index: usize) -> &Action {
        &self.actions[index]
    }

    pub(crate) fn parent_indices(&self, index: usize) -> &[usize] {
        &self.parents[index]
    }

    pub(crate) fn group_at(&self, index: usize) -> u32 {
        self.groups[index]
    }
}
