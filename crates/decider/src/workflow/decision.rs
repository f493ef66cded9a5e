//! Decisions: the commands a decider hands back to the service

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum length of a workflow failure reason accepted by the service
pub const MAX_REASON_LEN: usize = 256;

/// Maximum length of failure details and results accepted by the service
pub const MAX_DETAILS_LEN: usize = 32_768;

/// One command for the coordination service
///
/// Serialized with a `decisionType` tag and camelCase fields, timeouts as
/// decimal seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decisionType", rename_all_fields = "camelCase")]
pub enum Decision {
    // =========================================================================
    // Unit of work decisions
    // =========================================================================
    ScheduleActivityTask {
        activity_id: String,
        activity_type: ActivityType,
        #[serde(default)]
        input: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        control: Option<String>,
        #[serde(flatten)]
        options: ActivityOptions,
    },

    StartTimer {
        timer_id: String,
        #[serde(with = "crate::duration_serde")]
        start_to_fire_timeout: Duration,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        control: Option<String>,
    },

    SignalExternalWorkflowExecution {
        signal_name: String,
        workflow_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
        #[serde(default)]
        input: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        control: Option<String>,
    },

    StartChildWorkflowExecution {
        workflow_id: String,
        workflow_type: WorkflowType,
        #[serde(default)]
        input: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        control: Option<String>,
        #[serde(flatten)]
        options: ChildWorkflowOptions,
    },

    RecordMarker {
        marker_name: String,
        #[serde(default)]
        details: String,
    },

    // =========================================================================
    // Workflow decisions
    // =========================================================================
    CompleteWorkflowExecution {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },

    FailWorkflowExecution {
        reason: String,
        #[serde(default)]
        details: String,
    },
}

impl Decision {
    /// Complete the workflow with a result
    pub fn complete(result: impl Into<String>) -> Self {
        Self::CompleteWorkflowExecution {
            result: Some(truncate(result.into(), MAX_DETAILS_LEN)),
        }
    }

    /// Fail the workflow
    ///
    /// The reason and details are cut to the lengths the service accepts.
    pub fn fail(reason: impl Into<String>, details: impl Into<String>) -> Self {
        Self::FailWorkflowExecution {
            reason: truncate(reason.into(), MAX_REASON_LEN),
            details: truncate(details.into(), MAX_DETAILS_LEN),
        }
    }

    /// Record a marker
    pub fn record_marker(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::RecordMarker {
            marker_name: name.into(),
            details: details.into(),
        }
    }

    /// Whether this decision closes the workflow
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CompleteWorkflowExecution { .. } | Self::FailWorkflowExecution { .. }
        )
    }

    /// Wire name of the decision type
    pub fn decision_type(&self) -> &'static str {
        match self {
            Self::ScheduleActivityTask { .. } => "ScheduleActivityTask",
            Self::StartTimer { .. } => "StartTimer",
            Self::SignalExternalWorkflowExecution { .. } => "SignalExternalWorkflowExecution",
            Self::StartChildWorkflowExecution { .. } => "StartChildWorkflowExecution",
            Self::RecordMarker { .. } => "RecordMarker",
            Self::CompleteWorkflowExecution { .. } => "CompleteWorkflowExecution",
            Self::FailWorkflowExecution { .. } => "FailWorkflowExecution",
        }
    }
}

/// Cut a string to at most `max` bytes on a char boundary
fn truncate(mut text: String, max: usize) -> String {
    if text.len() > max {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

/// Registered activity type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityType {
    pub name: String,
    pub version: String,
}

impl ActivityType {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Registered workflow type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowType {
    pub name: String,
    pub version: String,
}

impl WorkflowType {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Options for scheduling an activity
///
/// Unset values fall back to the defaults registered with the activity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_list: Option<String>,

    #[serde(
        default,
        with = "crate::duration_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub schedule_to_close_timeout: Option<Duration>,

    #[serde(
        default,
        with = "crate::duration_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub schedule_to_start_timeout: Option<Duration>,

    #[serde(
        default,
        with = "crate::duration_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_to_close_timeout: Option<Duration>,

    #[serde(
        default,
        with = "crate::duration_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub heartbeat_timeout: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_priority: Option<i32>,
}

impl ActivityOptions {
    /// Set the task list
    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = Some(task_list.into());
        self
    }

    /// Set the schedule-to-close timeout
    pub fn with_schedule_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.schedule_to_close_timeout = Some(timeout);
        self
    }

    /// Set the schedule-to-start timeout
    pub fn with_schedule_to_start_timeout(mut self, timeout: Duration) -> Self {
        self.schedule_to_start_timeout = Some(timeout);
        self
    }

    /// Set the start-to-close timeout
    pub fn with_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.start_to_close_timeout = Some(timeout);
        self
    }

    /// Set the heartbeat timeout
    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = Some(timeout);
        self
    }

    /// Set the task priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.task_priority = Some(priority);
        self
    }
}

/// What happens to a child run when its parent closes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChildPolicy {
    Terminate,
    RequestCancel,
    Abandon,
}

/// Options for starting a child workflow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildWorkflowOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_list: Option<String>,

    #[serde(
        default,
        with = "crate::duration_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub execution_start_to_close_timeout: Option<Duration>,

    #[serde(
        default,
        with = "crate::duration_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub task_start_to_close_timeout: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_policy: Option<ChildPolicy>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_list: Vec<String>,
}

impl ChildWorkflowOptions {
    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = Some(task_list.into());
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_start_to_close_timeout = Some(timeout);
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_start_to_close_timeout = Some(timeout);
        self
    }

    pub fn with_child_policy(mut self, policy: ChildPolicy) -> Self {
        self.child_policy = Some(policy);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag_list.push(tag.into());
        self
    }
}
