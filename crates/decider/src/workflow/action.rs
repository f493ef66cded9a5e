//! Actions: the units of work a workflow is made of

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::decision::{ActivityOptions, ActivityType, ChildWorkflowOptions, WorkflowType};
use crate::reliability::RetryPolicy;

/// Maximum length of an action id
pub const MAX_ACTION_ID_LEN: usize = 256;

/// Where an action takes its input from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum InputSource {
    /// A fixed string
    Static(String),
    /// The input the run was started with
    WorkflowInput,
    /// The output of another action, which must be one of this action's parents
    OutputOf(String),
}

impl Default for InputSource {
    fn default() -> Self {
        Self::Static(String::new())
    }
}

impl InputSource {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Static(value.into())
    }

    pub fn output_of(action_id: impl Into<String>) -> Self {
        Self::OutputOf(action_id.into())
    }

    /// Action id this input depends on, if any
    pub fn dependency(&self) -> Option<&str> {
        match self {
            Self::OutputOf(id) => Some(id),
            _ => None,
        }
    }
}

/// Kind-specific configuration of an action
///
/// The action id doubles as the service-level identifier: activity id, timer
/// id, signal name, child workflow id or marker name.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    Activity {
        activity_type: ActivityType,
        input: InputSource,
        options: ActivityOptions,
    },
    Timer {
        delay: Duration,
    },
    Signal {
        workflow_id: String,
        run_id: Option<String>,
        input: InputSource,
    },
    ChildWorkflow {
        workflow_type: WorkflowType,
        input: InputSource,
        options: ChildWorkflowOptions,
    },
    Marker {
        details: InputSource,
    },
}

impl ActionKind {
    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::Activity { .. } => "activity",
            Self::Timer { .. } => "timer",
            Self::Signal { .. } => "signal",
            Self::ChildWorkflow { .. } => "child_workflow",
            Self::Marker { .. } => "marker",
        }
    }

    /// Input of the action; timers have none
    pub fn input(&self) -> Option<&InputSource> {
        match self {
            Self::Activity { input, .. }
            | Self::Signal { input, .. }
            | Self::ChildWorkflow { input, .. } => Some(input),
            Self::Marker { details } => Some(details),
            Self::Timer { .. } => None,
        }
    }
}

/// One unit of work in a workflow
///
/// Actions carry configuration only. Their state is always derived from the
/// run's history, so the same action value is shared by every run of the
/// workflow.
///
/// # Example
///
/// ```
/// use replayflow_decider::{Action, ActivityType, InputSource, RetryPolicy};
///
/// let action = Action::activity("fetch", ActivityType::new("Fetch", "1.0"))
///     .with_input(InputSource::WorkflowInput)
///     .with_retry(RetryPolicy::exponential())
///     .complete_workflow_on_success(true);
///
/// assert_eq!(action.id(), "fetch");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    id: String,
    kind: ActionKind,
    retry_policy: Option<RetryPolicy>,
    fail_workflow_on_error: bool,
    complete_workflow_on_success: bool,
}

impl Action {
    /// Create an action of any kind
    pub fn new(id: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            id: id.into(),
            kind,
            retry_policy: None,
            fail_workflow_on_error: true,
            complete_workflow_on_success: false,
        }
    }

    /// Schedule an activity task
    pub fn activity(id: impl Into<String>, activity_type: ActivityType) -> Self {
        Self::new(
            id,
            ActionKind::Activity {
                activity_type,
                input: InputSource::default(),
                options: ActivityOptions::default(),
            },
        )
    }

    /// Start a timer
    pub fn timer(id: impl Into<String>, delay: Duration) -> Self {
        Self::new(id, ActionKind::Timer { delay })
    }

    /// Send a signal named `id` to another workflow
    pub fn signal(id: impl Into<String>, workflow_id: impl Into<String>) -> Self {
        Self::new(
            id,
            ActionKind::Signal {
                workflow_id: workflow_id.into(),
                run_id: None,
                input: InputSource::default(),
            },
        )
    }

    /// Start a child workflow whose workflow id is `id`
    pub fn child_workflow(id: impl Into<String>, workflow_type: WorkflowType) -> Self {
        Self::new(
            id,
            ActionKind::ChildWorkflow {
                workflow_type,
                input: InputSource::default(),
                options: ChildWorkflowOptions::default(),
            },
        )
    }

    /// Record a marker named `id`
    pub fn marker(id: impl Into<String>) -> Self {
        Self::new(
            id,
            ActionKind::Marker {
                details: InputSource::default(),
            },
        )
    }

    /// Set the input (marker details for markers); ignored by timers
    pub fn with_input(mut self, source: InputSource) -> Self {
        match &mut self.kind {
            ActionKind::Activity { input, .. }
            | ActionKind::Signal { input, .. }
            | ActionKind::ChildWorkflow { input, .. } => *input = source,
            ActionKind::Marker { details } => *details = source,
            ActionKind::Timer { .. } => {}
        }
        self
    }

    /// Set activity options; ignored by other kinds
    pub fn with_activity_options(mut self, new_options: ActivityOptions) -> Self {
        self.set_activity_options(new_options);
        self
    }

    /// Set child workflow options; ignored by other kinds
    pub fn with_child_options(mut self, new_options: ChildWorkflowOptions) -> Self {
        if let ActionKind::ChildWorkflow { options, .. } = &mut self.kind {
            *options = new_options;
        }
        self
    }

    /// Target a specific run of the signalled workflow; ignored by other kinds
    pub fn with_run_id(mut self, id: impl Into<String>) -> Self {
        if let ActionKind::Signal { run_id, .. } = &mut self.kind {
            *run_id = Some(id.into());
        }
        self
    }

    /// Retry failures with this policy
    ///
    /// The policy is validated when the action is added to a graph.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Whether a terminal failure of this action fails the workflow (default true)
    pub fn fail_workflow_on_error(mut self, fail: bool) -> Self {
        self.fail_workflow_on_error = fail;
        self
    }

    /// Whether success of this action completes the workflow (default false)
    pub fn complete_workflow_on_success(mut self, complete: bool) -> Self {
        self.complete_workflow_on_success = complete;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }

    pub fn fails_workflow_on_error(&self) -> bool {
        self.fail_workflow_on_error
    }

    pub fn completes_workflow_on_success(&self) -> bool {
        self.complete_workflow_on_success
    }

    pub(crate) fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.retry_policy = Some(policy);
    }

    pub(crate) fn set_fail_workflow_on_error(&mut self, fail: bool) {
        self.fail_workflow_on_error = fail;
    }

    pub(crate) fn set_activity_options(&mut self, new_options: ActivityOptions) {
        if let ActionKind::Activity { options, .. } = &mut self.kind {
            *options = new_options;
        }
    }
}
