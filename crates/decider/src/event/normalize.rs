//! Event normalization
//!
//! Every wire-level kind maps to a fixed [`KindBehavior`]: the lifecycle state
//! it signals, whether it starts a unit of work, where its correlation id and
//! unit id live in the attribute payload, and which payload fields are kept as
//! data pairs. The mapping is a single exhaustive `match`, so a new
//! [`EventKind`] variant does not compile until it is classified.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{EventKind, RawHistoryEvent};

/// What an event means for the unit of work it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// Unit has been started or is in flight
    Active,
    /// Unit finished successfully
    Success,
    /// Unit failed, timed out or was cancelled
    Error,
    /// The service rejected a request; retrying is pointless
    Critical,
    /// Not relevant to decision logic
    Info,
}

/// Errors raised while normalizing a raw record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// A kind that requires an attribute object arrived without one
    #[error("event {event_id} ({kind}) has no attributes")]
    MissingAttributes { event_id: i64, kind: EventKind },

    /// Correlation field missing or not an integer
    #[error("event {event_id} ({kind}) has no usable `{field}`")]
    MissingCorrelation {
        event_id: i64,
        kind: EventKind,
        field: &'static str,
    },

    /// Initiator event without the field naming its unit of work
    #[error("event {event_id} ({kind}) has no unit id in `{field}`")]
    MissingUnitId {
        event_id: i64,
        kind: EventKind,
        field: &'static str,
    },
}

/// Where a kind finds its correlation id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Correlation {
    /// Initiators correlate to themselves
    Own,
    /// Id of the initiating event, read from this attribute
    Field(&'static str),
    /// Not part of any unit of work
    Unrelated,
}

/// Normalization rule for one event kind
#[derive(Debug, Clone, Copy)]
struct KindBehavior {
    state: LifecycleState,
    initiator: bool,
    unit_field: Option<&'static str>,
    correlation: Correlation,
    /// `(label, attribute path)` pairs; paths may be dotted
    data: [Option<(&'static str, &'static str)>; 2],
}

impl KindBehavior {
    fn info() -> Self {
        Self {
            state: LifecycleState::Info,
            initiator: false,
            unit_field: None,
            correlation: Correlation::Unrelated,
            data: [None, None],
        }
    }

    fn initiator(state: LifecycleState, unit_field: &'static str) -> Self {
        Self {
            state,
            initiator: true,
            unit_field: Some(unit_field),
            correlation: Correlation::Own,
            data: [None, None],
        }
    }

    fn follower(state: LifecycleState, correlation_field: &'static str) -> Self {
        Self {
            state,
            initiator: false,
            unit_field: None,
            correlation: Correlation::Field(correlation_field),
            data: [None, None],
        }
    }

    fn critical() -> Self {
        Self {
            state: LifecycleState::Critical,
            ..Self::info()
        }
    }

    fn unit(mut self, field: &'static str) -> Self {
        self.unit_field = Some(field);
        self
    }

    fn with(mut self, label: &'static str, path: &'static str) -> Self {
        if self.data[0].is_none() {
            self.data[0] = Some((label, path));
        } else {
            self.data[1] = Some((label, path));
        }
        self
    }
}

fn behavior(kind: EventKind) -> KindBehavior {
    use EventKind::*;
    use LifecycleState::*;

    match kind {
        WorkflowExecutionStarted => KindBehavior::info()
            .with("input", "input")
            .with("parentWorkflowId", "parentWorkflowExecution.workflowId"),
        WorkflowExecutionCancelRequested => KindBehavior::info().with("cause", "cause"),
        WorkflowExecutionCompleted => KindBehavior::info().with("result", "result"),
        WorkflowExecutionFailed | WorkflowExecutionTerminated => KindBehavior::info()
            .with("reason", "reason")
            .with("details", "details"),
        WorkflowExecutionTimedOut => KindBehavior::info().with("reason", "timeoutType"),
        WorkflowExecutionCanceled => KindBehavior::info().with("details", "details"),
        WorkflowExecutionContinuedAsNew => KindBehavior::info()
            .with("input", "input")
            .with("runId", "newExecutionRunId"),
        CompleteWorkflowExecutionFailed
        | FailWorkflowExecutionFailed
        | CancelWorkflowExecutionFailed
        | ContinueAsNewWorkflowExecutionFailed => KindBehavior::critical().with("cause", "cause"),

        DecisionTaskScheduled | DecisionTaskStarted | DecisionTaskTimedOut => KindBehavior::info(),
        DecisionTaskCompleted => KindBehavior::info().with("executionContext", "executionContext"),

        ActivityTaskScheduled => KindBehavior::initiator(Active, "activityId")
            .with("input", "input")
            .with("control", "control"),
        ScheduleActivityTaskFailed => {
            KindBehavior::initiator(Critical, "activityId").with("cause", "cause")
        }
        ActivityTaskStarted => {
            KindBehavior::follower(Active, "scheduledEventId").with("identity", "identity")
        }
        ActivityTaskCompleted => {
            KindBehavior::follower(Success, "scheduledEventId").with("result", "result")
        }
        ActivityTaskFailed => KindBehavior::follower(Error, "scheduledEventId")
            .with("reason", "reason")
            .with("details", "details"),
        ActivityTaskTimedOut => KindBehavior::follower(Error, "scheduledEventId")
            .with("reason", "timeoutType")
            .with("details", "details"),
        ActivityTaskCanceled => {
            KindBehavior::follower(Error, "scheduledEventId").with("details", "details")
        }
        ActivityTaskCancelRequested => KindBehavior::info().with("activityId", "activityId"),
        RequestCancelActivityTaskFailed => KindBehavior::critical()
            .with("cause", "cause")
            .with("activityId", "activityId"),

        WorkflowExecutionSignaled => KindBehavior::info()
            .with("signalName", "signalName")
            .with("input", "input"),
        MarkerRecorded => KindBehavior::initiator(Success, "markerName").with("details", "details"),
        RecordMarkerFailed => KindBehavior::initiator(Critical, "markerName").with("cause", "cause"),

        TimerStarted => KindBehavior::initiator(Active, "timerId")
            .with("control", "control")
            .with("startToFireTimeout", "startToFireTimeout"),
        StartTimerFailed => KindBehavior::initiator(Critical, "timerId").with("cause", "cause"),
        TimerFired => KindBehavior::follower(Success, "startedEventId").unit("timerId"),
        TimerCanceled => KindBehavior::follower(Error, "startedEventId").unit("timerId"),
        CancelTimerFailed => KindBehavior::critical()
            .with("cause", "cause")
            .with("timerId", "timerId"),

        StartChildWorkflowExecutionInitiated => KindBehavior::initiator(Active, "workflowId")
            .with("input", "input")
            .with("control", "control"),
        StartChildWorkflowExecutionFailed => {
            KindBehavior::follower(Critical, "initiatedEventId")
                .unit("workflowId")
                .with("cause", "cause")
        }
        ChildWorkflowExecutionStarted => KindBehavior::follower(Active, "initiatedEventId")
            .unit("workflowExecution.workflowId")
            .with("runId", "workflowExecution.runId"),
        ChildWorkflowExecutionCompleted => KindBehavior::follower(Success, "initiatedEventId")
            .unit("workflowExecution.workflowId")
            .with("result", "result"),
        // reason and details are separate attributes and stay separate
        ChildWorkflowExecutionFailed => KindBehavior::follower(Error, "initiatedEventId")
            .unit("workflowExecution.workflowId")
            .with("reason", "reason")
            .with("details", "details"),
        ChildWorkflowExecutionTimedOut => KindBehavior::follower(Error, "initiatedEventId")
            .unit("workflowExecution.workflowId")
            .with("reason", "timeoutType"),
        ChildWorkflowExecutionCanceled => KindBehavior::follower(Error, "initiatedEventId")
            .unit("workflowExecution.workflowId")
            .with("details", "details"),
        ChildWorkflowExecutionTerminated => {
            KindBehavior::follower(Error, "initiatedEventId").unit("workflowExecution.workflowId")
        }

        SignalExternalWorkflowExecutionInitiated => {
            KindBehavior::initiator(Active, "signalName")
                .with("input", "input")
                .with("control", "control")
        }
        SignalExternalWorkflowExecutionFailed => {
            KindBehavior::follower(Error, "initiatedEventId")
                .with("reason", "cause")
                .with("control", "control")
        }
        ExternalWorkflowExecutionSignaled => KindBehavior::follower(Success, "initiatedEventId")
            .with("runId", "workflowExecution.runId"),
        RequestCancelExternalWorkflowExecutionInitiated
        | ExternalWorkflowExecutionCancelRequested => KindBehavior::info(),
        RequestCancelExternalWorkflowExecutionFailed => {
            KindBehavior::critical().with("cause", "cause")
        }

        Unknown => KindBehavior::info(),
    }
}

/// One labelled value extracted from an event payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPair {
    pub label: &'static str,
    pub value: String,
}

/// A history event reduced to the fields decision logic needs
///
/// Equality and ordering are by `sequence_id` only.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    sequence_id: i64,
    timestamp: DateTime<Utc>,
    kind: EventKind,
    state: LifecycleState,
    initiator: bool,
    unit_id: Option<String>,
    correlation_id: Option<i64>,
    data: [Option<DataPair>; 2],
}

impl NormalizedEvent {
    pub fn sequence_id(&self) -> i64 {
        self.sequence_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether this event begins a new unit of work
    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    /// Id of the unit of work, when carried by the event or derived from its initiator
    pub fn unit_id(&self) -> Option<&str> {
        self.unit_id.as_deref()
    }

    /// Sequence id of the initiating event; initiators point at themselves
    pub fn correlation_id(&self) -> Option<i64> {
        self.correlation_id
    }

    /// Value of the data pair with the given label
    pub fn data(&self, label: &str) -> Option<&str> {
        self.data
            .iter()
            .flatten()
            .find(|pair| pair.label == label)
            .map(|pair| pair.value.as_str())
    }

    /// All data pairs present on this event
    pub fn data_pairs(&self) -> impl Iterator<Item = &DataPair> {
        self.data.iter().flatten()
    }

    /// Fill in the unit id from the initiating event
    pub(crate) fn resolve_unit_id(&mut self, unit_id: &str) {
        if self.unit_id.is_none() {
            self.unit_id = Some(unit_id.to_string());
        }
    }
}

impl PartialEq for NormalizedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.sequence_id == other.sequence_id
    }
}

impl Eq for NormalizedEvent {}

impl PartialOrd for NormalizedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NormalizedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence_id.cmp(&other.sequence_id)
    }
}

/// Normalize one raw history record
pub fn normalize(raw: &RawHistoryEvent) -> Result<NormalizedEvent, NormalizeError> {
    let rule = behavior(raw.event_type);
    let empty = Map::new();
    let attrs = match raw.attributes() {
        Some(attrs) => attrs,
        None if rule.initiator || rule.correlation != Correlation::Unrelated => {
            return Err(NormalizeError::MissingAttributes {
                event_id: raw.event_id,
                kind: raw.event_type,
            });
        }
        None => &empty,
    };

    let correlation_id = match rule.correlation {
        Correlation::Own => Some(raw.event_id),
        Correlation::Field(field) => Some(lookup(attrs, field).and_then(as_i64).ok_or(
            NormalizeError::MissingCorrelation {
                event_id: raw.event_id,
                kind: raw.event_type,
                field,
            },
        )?),
        Correlation::Unrelated => None,
    };

    let unit_id = match rule.unit_field {
        Some(field) => {
            let value = text(lookup(attrs, field));
            if value.is_empty() {
                if rule.initiator {
                    return Err(NormalizeError::MissingUnitId {
                        event_id: raw.event_id,
                        kind: raw.event_type,
                        field,
                    });
                }
                None
            } else {
                Some(value)
            }
        }
        None => None,
    };

    let data = rule.data.map(|slot| {
        slot.map(|(label, path)| DataPair {
            label,
            value: text(lookup(attrs, path)),
        })
    });

    Ok(NormalizedEvent {
        sequence_id: raw.event_id,
        timestamp: raw.event_timestamp,
        kind: raw.event_type,
        state: rule.state,
        initiator: rule.initiator,
        unit_id,
        correlation_id,
        data,
    })
}

/// Resolve a dotted attribute path
fn lookup<'a>(attrs: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = attrs.get(segments.next()?)?;
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(current)
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Payload values as text; absent, JSON null and the literal "null" become ""
fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) if s == "null" => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
