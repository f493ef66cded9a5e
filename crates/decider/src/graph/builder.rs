//! Graph definition: actions, parent edges, groups and bulk selection

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use regex::Regex;
use tracing::debug;

use super::cycles::find_cycles;
use super::{DependencyGraph, GraphError, CHECKPOINT_MARKER};
use crate::reliability::RetryPolicy;
use crate::workflow::{Action, ActivityOptions, MAX_ACTION_ID_LEN};

/// Builder for a [`DependencyGraph`]
///
/// Actions are declared in order. Parents may be declared after the actions
/// that depend on them; every reference is checked by [`build`](Self::build).
///
/// # Example
///
/// ```
/// use replayflow_decider::{Action, ActivityType, DependencyGraphBuilder};
///
/// let mut builder = DependencyGraphBuilder::new();
/// builder
///     .add(Action::activity("a", ActivityType::new("A", "1")), &[])?
///     .add(Action::activity("b", ActivityType::new("B", "1")), &[])?
///     .add(Action::activity("c", ActivityType::new("C", "1")), &["a", "b"])?;
/// let graph = builder.build()?;
///
/// assert_eq!(graph.parents("c"), vec!["a", "b"]);
/// # Ok::<(), replayflow_decider::GraphError>(())
/// ```
#[derive(Debug, Default)]
pub struct DependencyGraphBuilder {
    actions: Vec<Action>,
    parents: Vec<Vec<String>>,
    groups: Vec<u32>,
    index: HashMap<String, usize>,
    current_group: u32,
    /// Implicit parents of every action added to the current group
    group_parents: Vec<String>,
}

impl DependencyGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action with its parents
    pub fn add(&mut self, action: Action, parents: &[&str]) -> Result<&mut Self, GraphError> {
        let id = action.id().to_string();
        validate_id(&id)?;
        if self.index.contains_key(&id) {
            return Err(GraphError::DuplicateAction(id));
        }
        if let Some(policy) = action.retry_policy() {
            policy
                .validate()
                .map_err(|source| GraphError::InvalidRetryPolicy {
                    action: id.clone(),
                    source,
                })?;
        }

        let mut all_parents: Vec<String> = Vec::with_capacity(parents.len());
        for parent in parents
            .iter()
            .copied()
            .chain(self.group_parents.iter().map(String::as_str))
        {
            if !all_parents.iter().any(|p| p == parent) {
                all_parents.push(parent.to_string());
            }
        }

        debug!(
            action_id = %id,
            kind = action.kind().name(),
            group = self.current_group,
            parents = ?all_parents,
            "Adding action"
        );

        self.index.insert(id, self.actions.len());
        self.actions.push(action);
        self.parents.push(all_parents);
        self.groups.push(self.current_group);
        Ok(self)
    }

    /// Place subsequently added actions in group `group`
    ///
    /// Groups never decrease in declaration order.
    pub fn group(&mut self, group: u32) -> Result<&mut Self, GraphError> {
        if group < self.current_group {
            return Err(GraphError::InvalidGroupOrder {
                current: self.current_group,
                requested: group,
            });
        }
        self.current_group = group;
        self.group_parents.clear();
        Ok(self)
    }

    /// Start group `group` whose actions all depend on every action of `parent_group`
    pub fn group_and_parent(
        &mut self,
        group: u32,
        parent_group: u32,
    ) -> Result<&mut Self, GraphError> {
        if parent_group >= group {
            return Err(GraphError::InvalidParentGroup {
                group,
                parent_group,
            });
        }
        self.group(group)?;
        self.group_parents = self
            .actions
            .iter()
            .zip(&self.groups)
            .filter(|&(_, &g)| g == parent_group)
            .map(|(action, _)| action.id().to_string())
            .collect();
        Ok(self)
    }

    /// Select actions already added, to apply a policy to all of them
    pub fn with_each(&mut self, selector: &Selector) -> Result<Selection<'_>, GraphError> {
        let targets = match selector {
            Selector::Ids(ids) => ids
                .iter()
                .map(|id| {
                    self.index
                        .get(id)
                        .copied()
                        .ok_or_else(|| GraphError::UnknownSelection(id.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Selector::Pattern(pattern) => self
                .actions
                .iter()
                .enumerate()
                .filter(|(_, action)| pattern.is_match(action.id()))
                .map(|(i, _)| i)
                .collect(),
        };
        Ok(Selection {
            builder: self,
            targets,
        })
    }

    /// Validate the definition and freeze it
    pub fn build(self) -> Result<DependencyGraph, GraphError> {
        let Self {
            actions,
            parents,
            groups,
            index,
            ..
        } = self;

        // Edge problems do not stop cycle detection over the edges that resolve
        let mut problems = Vec::new();
        let mut parent_indices: Vec<Vec<usize>> = Vec::with_capacity(actions.len());
        for (i, names) in parents.iter().enumerate() {
            let action = &actions[i];
            let mut resolved = Vec::with_capacity(names.len());
            for name in names {
                let Some(&parent) = index.get(name) else {
                    problems.push(GraphError::DanglingParent {
                        action: action.id().to_string(),
                        parent: name.clone(),
                    });
                    continue;
                };
                if groups[parent] > groups[i] {
                    problems.push(GraphError::ParentInLaterGroup {
                        action: action.id().to_string(),
                        group: groups[i],
                        parent: name.clone(),
                        parent_group: groups[parent],
                    });
                }
                resolved.push(parent);
            }

            if let Some(source) = action.kind().input().and_then(|input| input.dependency()) {
                if !names.iter().any(|name| name == source) {
                    problems.push(GraphError::InputNotFromParent {
                        action: action.id().to_string(),
                        source_id: source.to_string(),
                    });
                }
            }
            parent_indices.push(resolved);
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); actions.len()];
        for (child, parents) in parent_indices.iter().enumerate() {
            for &parent in parents {
                children[parent].push(child);
            }
        }

        let cycles = find_cycles(&children);
        if !cycles.is_empty() {
            problems.push(GraphError::Cycles(
                cycles
                    .into_iter()
                    .map(|cycle| {
                        cycle
                            .into_iter()
                            .map(|i| actions[i].id().to_string())
                            .collect()
                    })
                    .collect(),
            ));
        }

        if problems.len() > 1 {
            return Err(GraphError::Invalid(problems));
        }
        if let Some(problem) = problems.pop() {
            return Err(problem);
        }

        let order = topological_order(&parent_indices, &children);
        Ok(DependencyGraph::new(
            actions,
            index,
            parent_indices,
            groups,
            order,
        ))
    }
}

/// Kahn's algorithm; ready nodes leave in declaration order
fn topological_order(parents: &[Vec<usize>], children: &[Vec<usize>]) -> Vec<usize> {
    let mut in_degree: Vec<usize> = parents.iter().map(Vec::len).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(parents.len());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &child in &children[node] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.push(Reverse(child));
            }
        }
    }
    order
}

fn validate_id(id: &str) -> Result<(), GraphError> {
    let reason = if id.is_empty() {
        "must not be empty"
    } else if id.len() > MAX_ACTION_ID_LEN {
        "longer than 256 bytes"
    } else if id == CHECKPOINT_MARKER {
        "reserved for checkpoints"
    } else {
        return Ok(());
    };
    Err(GraphError::InvalidActionId {
        id: id.to_string(),
        reason,
    })
}

/// Which actions a [`Selection`] covers
#[derive(Debug, Clone)]
pub enum Selector {
    /// Exactly these action ids
    Ids(Vec<String>),
    /// Every action whose whole id matches the pattern
    Pattern(Regex),
}

impl Selector {
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Ids(ids.into_iter().map(Into::into).collect())
    }

    /// Compile a pattern; it must match the whole action id
    pub fn pattern(pattern: &str) -> Result<Self, GraphError> {
        Ok(Self::Pattern(Regex::new(&format!("^(?:{pattern})$"))?))
    }
}

/// A set of already-declared actions receiving the same settings
pub struct Selection<'a> {
    builder: &'a mut DependencyGraphBuilder,
    targets: Vec<usize>,
}

impl Selection<'_> {
    /// Ids of the selected actions, in declaration order of selection
    pub fn ids(&self) -> Vec<&str> {
        self.targets
            .iter()
            .map(|&i| self.builder.actions[i].id())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Attach a retry policy to every selected action
    pub fn with_retry(self, policy: RetryPolicy) -> Result<Self, GraphError> {
        if let Some(&first) = self.targets.first() {
            policy
                .validate()
                .map_err(|source| GraphError::InvalidRetryPolicy {
                    action: self.builder.actions[first].id().to_string(),
                    source,
                })?;
        }
        for &i in &self.targets {
            self.builder.actions[i].set_retry_policy(policy.clone());
        }
        Ok(self)
    }

    pub fn fail_workflow_on_error(self, fail: bool) -> Self {
        for &i in &self.targets {
            self.builder.actions[i].set_fail_workflow_on_error(fail);
        }
        self
    }

    /// Replace activity options on every selected activity
    pub fn with_activity_options(self, options: ActivityOptions) -> Self {
        for &i in &self.targets {
            self.builder.actions[i].set_activity_options(options.clone());
        }
        self
    }
}
