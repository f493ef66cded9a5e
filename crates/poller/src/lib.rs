//! # Replayflow Poller
//!
//! Runs [`replayflow_decider`] deciders against a coordination service.
//!
//! ```text
//! ┌───────────────┐  poll / page / respond   ┌──────────────────────┐
//! │DecisionPoller │ ───────────────────────▶ │ dyn DecisionService  │
//! │  (per task:   │                          └──────────────────────┘
//! │   Decider)    │ ◀── WorkflowRegistry (workflow type -> Workflow)
//! └───────────────┘
//!        ▲ × N
//! ┌───────────────┐
//! │ DeciderWorker │  tokio tasks + watch shutdown
//! └───────────────┘
//! ```
//!
//! The transport stays behind [`DecisionService`]; [`InMemoryDecisionService`]
//! serves scripted histories for tests and local runs.

pub mod config;
pub mod memory;
pub mod poller;
pub mod registry;
pub mod service;
pub mod telemetry;
pub mod worker;

pub use config::{PollerConfig, WorkerConfig};
pub use memory::{InMemoryDecisionService, Submission};
pub use poller::{DecisionPoller, PollOutcome, PollerError};
pub use registry::{RegistryError, WorkflowRegistry};
pub use service::{
    DecisionService, DecisionTask, HistoryPage, PollRequest, ServiceError, WorkflowExecution,
};
pub use telemetry::{init_tracing, TelemetryConfig};
pub use worker::{DeciderWorker, WorkerError};
