//! Workflow trait definition

use crate::engine::DecisionContext;
use crate::graph::DependencyGraph;

use super::decision::{Decision, WorkflowType};

/// A workflow definition: a dependency graph plus the logic that turns it into
/// decisions
///
/// The default [`decide`](Self::decide) walks the graph with
/// [`DecisionContext::decide_graph`]. Override it to add custom logic; any
/// error (or panic) it produces fails the run rather than the process.
///
/// Definitions are built once and shared across runs, so implementations
/// must be deterministic: no clocks, no randomness, nothing but the context.
pub trait Workflow: Send + Sync + 'static {
    /// Registered type of this workflow
    fn workflow_type(&self) -> WorkflowType;

    /// Actions of this workflow
    fn graph(&self) -> &DependencyGraph;

    /// Decisions for the current state of the run
    fn decide(&self, ctx: &DecisionContext<'_>) -> anyhow::Result<Vec<Decision>> {
        Ok(ctx.decide_graph()?)
    }
}

/// A workflow that is nothing but its dependency graph
#[derive(Debug, Clone)]
pub struct GraphWorkflow {
    workflow_type: WorkflowType,
    graph: DependencyGraph,
}

impl GraphWorkflow {
    pub fn new(workflow_type: WorkflowType, graph: DependencyGraph) -> Self {
        Self {
            workflow_type,
            graph,
        }
    }
}

impl Workflow for GraphWorkflow {
    fn workflow_type(&self) -> WorkflowType {
        self.workflow_type.clone()
    }

    fn graph(&self) -> &DependencyGraph {
        &self.graph
    }
}
