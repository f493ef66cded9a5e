//! Workflow definitions and the decisions they produce

mod action;
mod decision;
mod definition;
pub(crate) mod state;

pub use action::{Action, ActionKind, InputSource, MAX_ACTION_ID_LEN};
pub use decision::{
    ActivityOptions, ActivityType, ChildPolicy, ChildWorkflowOptions, Decision, WorkflowType,
    MAX_DETAILS_LEN, MAX_REASON_LEN,
};
pub use definition::{GraphWorkflow, Workflow};
pub use state::{ActionState, Outcome};
