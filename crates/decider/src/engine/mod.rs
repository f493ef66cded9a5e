//! Decision engine
//!
//! ```text
//!   history pages (newest first)
//!            │
//!            ▼
//!  ┌───────────────────┐   normalize    ┌──────────────┐
//!  │ Decider::ingest   │───────────────▶│ HistoryStore │
//!  └───────────────────┘                └──────┬───────┘
//!                                              │
//!  ┌───────────────────┐  DecisionContext      │
//!  │ Decider::decide   │◀──────────────────────┘
//!  └─────────┬─────────┘
//!            │ Workflow::decide (errors and panics become failures)
//!            ▼
//!      Vec<Decision>
//! ```

mod context;
mod decider;

pub use context::{ActionEvaluation, DecisionContext};
pub use decider::{Decider, DeciderConfig, DeciderError};
