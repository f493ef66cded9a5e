//! Workflow registry
//!
//! Maps the workflow type named in a decision task to the workflow that
//! decides it. A registry is an explicit value handed to pollers; there is no
//! process-wide instance.

use std::collections::HashMap;
use std::sync::Arc;

use replayflow_decider::{Workflow, WorkflowType};

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Two workflows claim the same type
    #[error("workflow type already registered: {0}")]
    AlreadyRegistered(WorkflowType),

    /// No workflow for the requested type
    #[error("no workflow registered for type: {0}")]
    NotFound(WorkflowType),
}

/// Registry of workflows by `(name, version)`
#[derive(Default)]
pub struct WorkflowRegistry {
    workflows: HashMap<WorkflowType, Arc<dyn Workflow>>,
}

impl WorkflowRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow under its own type
    pub fn register<W: Workflow>(&mut self, workflow: W) -> Result<&mut Self, RegistryError> {
        self.register_arc(Arc::new(workflow))
    }

    /// Register a shared workflow under its own type
    pub fn register_arc(&mut self, workflow: Arc<dyn Workflow>) -> Result<&mut Self, RegistryError> {
        let workflow_type = workflow.workflow_type();
        if self.workflows.contains_key(&workflow_type) {
            return Err(RegistryError::AlreadyRegistered(workflow_type));
        }
        self.workflows.insert(workflow_type, workflow);
        Ok(self)
    }

    /// Look up the workflow for a type
    pub fn get(&self, workflow_type: &WorkflowType) -> Result<Arc<dyn Workflow>, RegistryError> {
        self.workflows
            .get(workflow_type)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(workflow_type.clone()))
    }

    /// Check if a type is registered
    pub fn contains(&self, workflow_type: &WorkflowType) -> bool {
        self.workflows.contains_key(workflow_type)
    }

    /// Registered types, sorted
    pub fn workflow_types(&self) -> Vec<&WorkflowType> {
        let mut types: Vec<&WorkflowType> = self.workflows.keys().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("workflow_types", &self.workflow_types())
            .finish()
    }
}
