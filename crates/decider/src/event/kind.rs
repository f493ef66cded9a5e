//! Wire-level history event kinds

use serde::{Deserialize, Serialize};

/// Event types of a workflow execution history, as named on the wire
///
/// Variant names match the `eventType` strings of the coordination service.
/// Anything the service adds later deserializes to [`EventKind::Unknown`] and
/// is treated as informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    // =========================================================================
    // Workflow Execution Events
    // =========================================================================
    WorkflowExecutionStarted,
    WorkflowExecutionCancelRequested,
    WorkflowExecutionCompleted,
    CompleteWorkflowExecutionFailed,
    WorkflowExecutionFailed,
    FailWorkflowExecutionFailed,
    WorkflowExecutionTimedOut,
    WorkflowExecutionCanceled,
    CancelWorkflowExecutionFailed,
    WorkflowExecutionContinuedAsNew,
    ContinueAsNewWorkflowExecutionFailed,
    WorkflowExecutionTerminated,

    // =========================================================================
    // Decision Task Events
    // =========================================================================
    DecisionTaskScheduled,
    DecisionTaskStarted,
    DecisionTaskCompleted,
    DecisionTaskTimedOut,

    // =========================================================================
    // Activity Task Events
    // =========================================================================
    ActivityTaskScheduled,
    ScheduleActivityTaskFailed,
    ActivityTaskStarted,
    ActivityTaskCompleted,
    ActivityTaskFailed,
    ActivityTaskTimedOut,
    ActivityTaskCanceled,
    ActivityTaskCancelRequested,
    RequestCancelActivityTaskFailed,

    // =========================================================================
    // Signal and Marker Events
    // =========================================================================
    WorkflowExecutionSignaled,
    MarkerRecorded,
    RecordMarkerFailed,

    // =========================================================================
    // Timer Events
    // =========================================================================
    TimerStarted,
    StartTimerFailed,
    TimerFired,
    TimerCanceled,
    CancelTimerFailed,

    // =========================================================================
    // Child Workflow Events
    // =========================================================================
    StartChildWorkflowExecutionInitiated,
    StartChildWorkflowExecutionFailed,
    ChildWorkflowExecutionStarted,
    ChildWorkflowExecutionCompleted,
    ChildWorkflowExecutionFailed,
    ChildWorkflowExecutionTimedOut,
    ChildWorkflowExecutionCanceled,
    ChildWorkflowExecutionTerminated,

    // =========================================================================
    // External Workflow Events
    // =========================================================================
    SignalExternalWorkflowExecutionInitiated,
    SignalExternalWorkflowExecutionFailed,
    ExternalWorkflowExecutionSignaled,
    RequestCancelExternalWorkflowExecutionInitiated,
    RequestCancelExternalWorkflowExecutionFailed,
    ExternalWorkflowExecutionCancelRequested,

    /// Any event type this client does not know about
    #[serde(other)]
    Unknown,
}

impl EventKind {
    /// Name of the JSON object holding this kind's attributes
    ///
    /// `ActivityTaskScheduled` carries its payload under
    /// `activityTaskScheduledEventAttributes`, and so on.
    pub fn attributes_key(&self) -> String {
        let name = format!("{self:?}");
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => format!(
                "{}{}EventAttributes",
                first.to_ascii_lowercase(),
                chars.as_str()
            ),
            None => String::new(),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
