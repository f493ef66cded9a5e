//! Errors raised while defining a dependency graph

use crate::reliability::RetryPolicyError;

/// Errors raised by [`DependencyGraphBuilder`](super::DependencyGraphBuilder)
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("action `{0}` is already defined")]
    DuplicateAction(String),

    #[error("invalid action id {id:?}: {reason}")]
    InvalidActionId { id: String, reason: &'static str },

    #[error("action `{action}` depends on undefined action `{parent}`")]
    DanglingParent { action: String, parent: String },

    #[error("action `{action}` reads the output of `{source_id}`, which is not one of its parents")]
    InputNotFromParent { action: String, source_id: String },

    #[error("action `{action}` in group {group} depends on `{parent}` in later group {parent_group}")]
    ParentInLaterGroup {
        action: String,
        group: u32,
        parent: String,
        parent_group: u32,
    },

    #[error("group {requested} declared after group {current}; groups must not decrease")]
    InvalidGroupOrder { current: u32, requested: u32 },

    #[error("group {group} cannot take its parents from group {parent_group}")]
    InvalidParentGroup { group: u32, parent_group: u32 },

    /// Every distinct cycle in the graph, each as a path of action ids
    #[error("dependency graph has {} cycle(s): {}", .0.len(), format_cycles(.0))]
    Cycles(Vec<Vec<String>>),

    /// Several problems found together by `build`
    #[error("dependency graph has {} problem(s): {}", .0.len(), format_problems(.0))]
    Invalid(Vec<GraphError>),

    #[error("invalid retry policy for `{action}`: {source}")]
    InvalidRetryPolicy {
        action: String,
        #[source]
        source: RetryPolicyError,
    },

    #[error("invalid selection pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("selection names undefined action `{0}`")]
    UnknownSelection(String),
}

fn format_problems(problems: &[GraphError]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| {
            let mut path = cycle.clone();
            if let Some(first) = cycle.first() {
                path.push(first.clone());
            }
            path.join(" -> ")
        })
        .collect::<Vec<_>>()
        .join("; ")
}
