//! # Replayflow Decider
//!
//! A deterministic, replay-based decider for workflows run by a remote
//! coordination service.
//!
//! ## Features
//!
//! - **Event-sourced state**: Action state is recomputed from history on every decision task
//! - **Dependency graphs**: Actions with parent edges, cycle detection at build time
//! - **History-driven retries**: Exponential backoff scheduled through tagged timers
//! - **Checkpoints**: Numbered groups let long workflows stop reloading old history
//! - **Failure isolation**: Errors and panics in decision logic fail the run, never the process
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Decider                            │
//! │  (ingests history pages, decides, isolates failures)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      DecisionContext                        │
//! │  (walks the DependencyGraph, one state machine per action)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       HistoryStore                          │
//! │  (normalized events, markers, signals, critical errors)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use replayflow_decider::prelude::*;
//!
//! let mut builder = DependencyGraph::builder();
//! builder
//!     .add(Action::activity("fetch", ActivityType::new("Fetch", "1.0"))
//!         .with_input(InputSource::WorkflowInput)
//!         .with_retry(RetryPolicy::exponential()
//!             .with_initial_interval(Duration::from_secs(5))
//!             .with_maximum_attempts(5)), &[])?
//!     .add(Action::activity("store", ActivityType::new("Store", "1.0"))
//!         .with_input(InputSource::output_of("fetch"))
//!         .complete_workflow_on_success(true), &["fetch"])?;
//!
//! let workflow = GraphWorkflow::new(WorkflowType::new("Pipeline", "1.0"), builder.build()?);
//! let mut decider = Decider::new(Arc::new(workflow));
//! let started = RawHistoryEvent::new(
//!     1,
//!     chrono::Utc::now(),
//!     EventKind::WorkflowExecutionStarted,
//!     serde_json::json!({ "input": "order-7" }),
//! );
//! decider.ingest(&[started])?;
//!
//! // Nothing else has happened yet: only `fetch` is ready
//! let decisions = decider.decide();
//! assert!(matches!(
//!     &decisions[..],
//!     [Decision::ScheduleActivityTask { activity_id, input, .. }]
//!         if activity_id == "fetch" && input == "order-7"
//! ));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod duration_serde;

pub mod engine;
pub mod event;
pub mod graph;
pub mod history;
pub mod reliability;
pub mod workflow;

/// Prelude for common imports
pub mod prelude {
    pub use crate::engine::{
        ActionEvaluation, Decider, DeciderConfig, DeciderError, DecisionContext,
    };
    pub use crate::event::{EventKind, LifecycleState, NormalizedEvent, RawHistoryEvent};
    pub use crate::graph::{DependencyGraph, DependencyGraphBuilder, GraphError, Selector};
    pub use crate::history::HistoryStore;
    pub use crate::reliability::RetryPolicy;
    pub use crate::workflow::{
        Action, ActionKind, ActionState, ActivityOptions, ActivityType, ChildWorkflowOptions,
        Decision, GraphWorkflow, InputSource, Outcome, Workflow, WorkflowType,
    };
}

// Re-export key types at crate root
pub use engine::{ActionEvaluation, Decider, DeciderConfig, DeciderError, DecisionContext};
pub use event::{
    normalize, EventKind, LifecycleState, NormalizeError, NormalizedEvent, RawHistoryEvent,
};
pub use graph::{
    DependencyGraph, DependencyGraphBuilder, GraphError, Selection, Selector, CHECKPOINT_MARKER,
};
pub use history::HistoryStore;
pub use reliability::{RetryPolicy, RetryPolicyError};
pub use workflow::{
    Action, ActionKind, ActionState, ActivityOptions, ActivityType, ChildPolicy,
    ChildWorkflowOptions, Decision, GraphWorkflow, InputSource, Outcome, Workflow, WorkflowType,
};
