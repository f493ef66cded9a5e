//! Dependency graph of a workflow's actions
//!
//! ```text
//!  group 0                         group 1
//! ┌───────┐
//! │ fetch │──┐
//! └───────┘  │   ┌──────┐          ┌─────────┐
//!            ├──▶│ join │─────────▶│ publish │
//! ┌───────┐  │   └──────┘          └─────────┘
//! │ parse │──┘
//! └───────┘
//! ```
//!
//! Each action belongs to a numbered group. Once every action of the current
//! group is finished the decider records a checkpoint marker naming the next
//! group; from then on older history is no longer needed and actions of
//! earlier groups are skipped.

mod builder;
mod cycles;
mod dependency;
mod error;

pub use builder::{DependencyGraphBuilder, Selection, Selector};
pub use dependency::DependencyGraph;
pub use error::GraphError;

/// Marker (and signal) name carrying the current checkpoint group
pub const CHECKPOINT_MARKER: &str = "replayflow.checkpoint";
