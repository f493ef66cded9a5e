//! Decider with replay support
//!
//! The `Decider` is responsible for:
//! - Normalizing and accumulating history pages for one run
//! - Telling the poller when older pages are no longer needed
//! - Turning the replayed state into decisions, never letting an error escape

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, instrument};

use super::DecisionContext;
use crate::event::{normalize, NormalizeError, NormalizedEvent, RawHistoryEvent};
use crate::history::HistoryStore;
use crate::workflow::{ActionState, Decision, Workflow};

/// Configuration for the decider
#[derive(Debug, Clone)]
pub struct DeciderConfig {
    /// Maximum events held for one run
    pub max_events: usize,
}

impl Default for DeciderConfig {
    fn default() -> Self {
        Self { max_events: 25_000 }
    }
}

impl DeciderConfig {
    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }
}

/// Errors from decider operations
#[derive(Debug, thiserror::Error)]
pub enum DeciderError {
    /// Action id not part of the workflow's graph
    #[error("action `{0}` is not registered with this workflow")]
    UnregisteredAction(String),

    /// Output requested from an action that has not succeeded
    #[error("output of `{action}` is not available in state {state}")]
    OutputNotAvailable { action: String, state: ActionState },

    /// Input is the run input but the start event is not loaded
    #[error("`{action}` needs the workflow input, which is not in the loaded history")]
    MissingWorkflowInput { action: String },

    /// Input depends on a parent that has no output yet
    #[error("`{action}` needs the output of `{parent}`, which has not succeeded")]
    MissingParentOutput { action: String, parent: String },

    /// A history record could not be normalized
    #[error("invalid history event: {0}")]
    Normalize(#[from] NormalizeError),

    /// Too many events
    #[error("history has too many events ({0} > {1})")]
    TooManyEvents(usize, usize),
}

/// Decider for one workflow run at a time
///
/// Feed it the history of a decision task page by page with
/// [`ingest`](Self::ingest), stop paging once
/// [`is_more_history_required`](Self::is_more_history_required) turns false,
/// then call [`decide`](Self::decide). `decide` is a pure function of the
/// ingested history: calling it twice gives the same decisions.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use replayflow_decider::prelude::*;
///
/// let mut builder = DependencyGraph::builder();
/// builder.add(Action::timer("wait", std::time::Duration::from_secs(5)), &[])?;
/// let workflow = GraphWorkflow::new(WorkflowType::new("Wait", "1"), builder.build()?);
///
/// let decider = Decider::new(Arc::new(workflow));
/// let decisions = decider.decide();
/// assert_eq!(decisions[0].decision_type(), "StartTimer");
/// # Ok::<(), replayflow_decider::GraphError>(())
/// ```
pub struct Decider {
    workflow: Arc<dyn Workflow>,
    history: HistoryStore,
    config: DeciderConfig,
}

impl Decider {
    pub fn new(workflow: Arc<dyn Workflow>) -> Self {
        Self::with_config(workflow, DeciderConfig::default())
    }

    pub fn with_config(workflow: Arc<dyn Workflow>, config: DeciderConfig) -> Self {
        Self {
            workflow,
            history: HistoryStore::new(),
            config,
        }
    }

    pub fn workflow(&self) -> &Arc<dyn Workflow> {
        &self.workflow
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Normalize and append one page of history
    ///
    /// A page containing an invalid record is rejected as a whole. Returns
    /// the number of events that were new.
    #[instrument(
        skip(self, events),
        fields(workflow_type = %self.workflow.workflow_type(), received = events.len())
    )]
    pub fn ingest(&mut self, events: &[RawHistoryEvent]) -> Result<usize, DeciderError> {
        let normalized = events
            .iter()
            .map(normalize)
            .collect::<Result<Vec<NormalizedEvent>, _>>()?;

        let added = self.history.append(normalized);
        if self.history.len() > self.config.max_events {
            return Err(DeciderError::TooManyEvents(
                self.history.len(),
                self.config.max_events,
            ));
        }

        debug!(added, total = self.history.len(), "Ingested history page");
        Ok(added)
    }

    /// Context over the current history
    pub fn context(&self) -> DecisionContext<'_> {
        DecisionContext::new(self.workflow.graph(), &self.history)
    }

    /// Whether older history pages are still needed
    ///
    /// False once the run's start event has been loaded. A checkpoint also
    /// ends paging, unless an action still to start or retry reads the run
    /// input or the output of an action before the checkpoint that is not
    /// loaded yet.
    pub fn is_more_history_required(&self) -> bool {
        if self.history.has_workflow_started() {
            return false;
        }
        let ctx = self.context();
        ctx.checkpoint().is_none() || !ctx.inputs_loaded()
    }

    /// Decisions for the current history
    ///
    /// Critical errors since the last decision fail the workflow outright.
    /// Otherwise the workflow's decision logic runs; if it returns an error
    /// or panics, the workflow fails with the error as details.
    #[instrument(
        skip(self),
        fields(workflow_type = %self.workflow.workflow_type(), events = self.history.len())
    )]
    pub fn decide(&self) -> Vec<Decision> {
        let critical = self.history.critical_errors_since_last_decision();
        if !critical.is_empty() {
            error!(count = critical.len(), "Critical errors in history, failing workflow");
            return vec![critical_failure(&critical)];
        }

        let ctx = self.context();
        let workflow = &self.workflow;
        match catch_unwind(AssertUnwindSafe(|| workflow.decide(&ctx))) {
            Ok(Ok(decisions)) => {
                debug!(count = decisions.len(), "Decided");
                decisions
            }
            Ok(Err(err)) => {
                error!(error = %err, "Workflow decision logic failed");
                vec![Decision::fail(
                    format!("decision logic failed: {err}"),
                    format!("{err:#}"),
                )]
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "Workflow decision logic panicked");
                vec![Decision::fail("decision logic panicked", message)]
            }
        }
    }

    /// Forget the current run's history
    pub fn reset(&mut self) {
        self.history.reset();
    }

    /// Forget the current run and switch to another workflow
    pub fn reset_with(&mut self, workflow: Arc<dyn Workflow>) {
        self.workflow = workflow;
        self.history.reset();
    }
}

impl std::fmt::Debug for Decider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decider")
            .field("workflow_type", &self.workflow.workflow_type())
            .field("events", &self.history.len())
            .field("config", &self.config)
            .finish()
    }
}

/// One failure summarizing every critical event
fn critical_failure(events: &[&NormalizedEvent]) -> Decision {
    let details = events
        .iter()
        .map(|event| {
            let cause = event
                .data("cause")
                .filter(|cause| !cause.is_empty())
                .unwrap_or("unknown cause");
            match event.unit_id() {
                Some(unit) => format!(
                    "{} (event {}, `{}`): {}",
                    event.kind(),
                    event.sequence_id(),
                    unit,
                    cause
                ),
                None => format!("{} (event {}): {}", event.kind(), event.sequence_id(), cause),
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    Decision::fail(
        format!("{} critical error(s) reported by the service", events.len()),
        details,
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "decision logic panicked".to_string()
    }
}
