//! Action state machine
//!
//! ```text
//!            decide                terminal event
//!  INITIAL ─────────▶ ACTIVE ──────────────────────▶ SUCCESS
//!                       ▲    └─────────────────────▶ ERROR
//!                       │                              │
//!                       │ decide            retry timer│started + fired
//!                       └───────── RETRY ◀─────────────┘
//! ```
//!
//! State is never stored; it is recomputed from the action's events on every
//! decision cycle.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::action::{Action, ActionKind};
use super::decision::Decision;
use crate::event::{LifecycleState, NormalizedEvent};
use crate::reliability::{RetryPolicy, RETRY_CONTROL};

/// Lifecycle state of one action, derived from history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionState {
    /// Nothing in history yet
    Initial,
    /// Started and not finished, or waiting on a retry timer
    Active,
    /// A retry timer fired; the action must be started again
    Retry,
    Success,
    Error,
}

impl std::fmt::Display for ActionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initial => "INITIAL",
            Self::Active => "ACTIVE",
            Self::Retry => "RETRY",
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Result of an action as seen by its dependents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Finished; carries the action's output
    Success(String),
    /// Not finished yet, including failures that will be retried
    NotReady,
    /// Failed for good
    Failed { reason: String, details: String },
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::NotReady)
    }
}

/// Everything history says about one action
#[derive(Debug, Clone)]
pub(crate) struct ActionView<'h> {
    pub state: ActionState,
    pub outcome: Outcome,
    /// Delay of the retry to schedule, when the action failed and may retry
    pub retry_delay: Option<Duration>,
    pub last: Option<&'h NormalizedEvent>,
}

impl ActionView<'_> {
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_terminal()
    }
}

/// Derive an action's view from its events, oldest first
pub(crate) fn view<'h>(action: &Action, events: &[&'h NormalizedEvent]) -> ActionView<'h> {
    let retry_timers: Vec<&NormalizedEvent> = events
        .iter()
        .copied()
        .filter(|event| RetryPolicy::is_retry_timer(event))
        .collect();

    let last = events
        .iter()
        .rev()
        .copied()
        .find(|event| event.state() != LifecycleState::Info);

    let Some(event) = last else {
        return ActionView {
            state: ActionState::Initial,
            outcome: Outcome::NotReady,
            retry_delay: None,
            last: None,
        };
    };

    match event.state() {
        LifecycleState::Success if RetryPolicy::is_retry_event(event, &retry_timers) => {
            ActionView {
                state: ActionState::Retry,
                outcome: Outcome::NotReady,
                retry_delay: None,
                last,
            }
        }
        LifecycleState::Success => ActionView {
            state: ActionState::Success,
            outcome: Outcome::Success(output(event)),
            retry_delay: None,
            last,
        },
        LifecycleState::Error | LifecycleState::Critical => {
            let retry_delay = action
                .retry_policy()
                .and_then(|policy| policy.next_delay(&retry_timers, event.timestamp()));
            let outcome = match retry_delay {
                Some(_) => Outcome::NotReady,
                None => Outcome::Failed {
                    reason: reason(event),
                    details: event.data("details").unwrap_or_default().to_string(),
                },
            };
            if retry_delay.is_none() && action.retry_policy().is_some() {
                debug!(
                    action_id = action.id(),
                    retries = retry_timers.len(),
                    "Retry budget used up"
                );
            }
            ActionView {
                state: ActionState::Error,
                outcome,
                retry_delay,
                last,
            }
        }
        LifecycleState::Active | LifecycleState::Info => ActionView {
            state: ActionState::Active,
            outcome: Outcome::NotReady,
            retry_delay: None,
            last,
        },
    }
}

/// Decisions for one action in its current state
///
/// `input` is the resolved input, needed only when the action is (re)started.
pub(crate) fn decisions(action: &Action, view: &ActionView<'_>, input: &str) -> Vec<Decision> {
    match view.state {
        ActionState::Initial | ActionState::Retry => {
            debug!(action_id = action.id(), state = %view.state, "Starting action");
            vec![start_decision(action, input)]
        }
        ActionState::Active => Vec::new(),
        ActionState::Success => match &view.outcome {
            Outcome::Success(output) if action.completes_workflow_on_success() => {
                vec![Decision::complete(output.clone())]
            }
            _ => Vec::new(),
        },
        ActionState::Error => {
            if let Some(delay) = view.retry_delay {
                info!(
                    action_id = action.id(),
                    delay_secs = delay.as_secs(),
                    "Scheduling retry"
                );
                return vec![Decision::StartTimer {
                    timer_id: action.id().to_string(),
                    start_to_fire_timeout: delay,
                    control: Some(RETRY_CONTROL.to_string()),
                }];
            }

            let Outcome::Failed { reason, details } = &view.outcome else {
                return Vec::new();
            };
            if action.retry_policy().is_some() {
                warn!(action_id = action.id(), reason = %reason, "Retries exhausted");
            }
            if action.fails_workflow_on_error() {
                vec![Decision::fail(
                    format!("{}: {}", action.id(), reason),
                    details.clone(),
                )]
            } else {
                Vec::new()
            }
        }
    }
}

/// The kind-specific decision that starts an action
pub(crate) fn start_decision(action: &Action, input: &str) -> Decision {
    let id = action.id().to_string();
    match action.kind() {
        ActionKind::Activity {
            activity_type,
            options,
            ..
        } => Decision::ScheduleActivityTask {
            activity_id: id,
            activity_type: activity_type.clone(),
            input: input.to_string(),
            control: None,
            options: options.clone(),
        },
        ActionKind::Timer { delay } => Decision::StartTimer {
            timer_id: id,
            start_to_fire_timeout: *delay,
            control: None,
        },
        ActionKind::Signal {
            workflow_id,
            run_id,
            ..
        } => Decision::SignalExternalWorkflowExecution {
            signal_name: id,
            workflow_id: workflow_id.clone(),
            run_id: run_id.clone(),
            input: input.to_string(),
            control: None,
        },
        ActionKind::ChildWorkflow {
            workflow_type,
            options,
            ..
        } => Decision::StartChildWorkflowExecution {
            workflow_id: id,
            workflow_type: workflow_type.clone(),
            input: input.to_string(),
            control: None,
            options: options.clone(),
        },
        ActionKind::Marker { .. } => Decision::RecordMarker {
            marker_name: id,
            details: input.to_string(),
        },
    }
}

/// Output of a successful event: result, else details, else empty
fn output(event: &NormalizedEvent) -> String {
    ["result", "details"]
        .iter()
        .filter_map(|label| event.data(label))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Failure reason: reason, else cause, else the event kind
fn reason(event: &NormalizedEvent) -> String {
    ["reason", "cause"]
        .iter()
        .filter_map(|label| event.data(label))
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| event.kind().to_string())
}
