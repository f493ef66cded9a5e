//! Test helpers that fabricate history the way the coordination service would

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use replayflow_decider::{Decider, Decision, EventKind, RawHistoryEvent, Workflow};
use serde_json::{json, Value};

/// Builds a run's history, turning submitted decisions into the events the
/// service would record for them
pub struct HistoryBuilder {
    events: Vec<RawHistoryEvent>,
    clock: DateTime<Utc>,
    /// unit id -> sequence id of its latest initiating event
    initiated: HashMap<String, i64>,
    /// unit id -> sequence id of its latest started event
    started: HashMap<String, i64>,
}

impl HistoryBuilder {
    /// A run that has just started and is waiting for its first decision
    pub fn started(input: &str) -> Self {
        let mut builder = Self {
            events: Vec::new(),
            clock: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            initiated: HashMap::new(),
            started: HashMap::new(),
        };
        builder.push(
            EventKind::WorkflowExecutionStarted,
            json!({
                "input": input,
                "workflowType": { "name": "Test", "version": "1" },
                "taskList": { "name": "deciders" }
            }),
        );
        builder.decision_task();
        builder
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock
    }

    /// Move the clock forward
    pub fn advance(&mut self, secs: i64) -> &mut Self {
        self.clock += Duration::seconds(secs);
        self
    }

    pub fn push(&mut self, kind: EventKind, attributes: Value) -> i64 {
        let id = self.events.len() as i64 + 1;
        self.events
            .push(RawHistoryEvent::new(id, self.clock, kind, attributes));
        id
    }

    pub fn last_event_id(&self) -> i64 {
        self.events.len() as i64
    }

    /// Schedule and start a decision task
    pub fn decision_task(&mut self) -> &mut Self {
        let scheduled = self.push(
            EventKind::DecisionTaskScheduled,
            json!({ "taskList": { "name": "deciders" } }),
        );
        self.push(
            EventKind::DecisionTaskStarted,
            json!({ "scheduledEventId": scheduled, "identity": "test-decider" }),
        );
        self
    }

    /// Complete the open decision task with `decisions` and record their effects
    ///
    /// Opens a decision task first when the last event is not a started one.
    pub fn apply(&mut self, decisions: &[Decision]) -> &mut Self {
        let task_open = self
            .events
            .last()
            .is_some_and(|event| event.event_type == EventKind::DecisionTaskStarted);
        if !task_open {
            self.decision_task();
        }
        let started = self.last_event_id();
        let completed = self.push(
            EventKind::DecisionTaskCompleted,
            json!({ "scheduledEventId": started - 1, "startedEventId": started }),
        );

        for decision in decisions {
            match decision {
                Decision::ScheduleActivityTask {
                    activity_id,
                    activity_type,
                    input,
                    control,
                    ..
                } => {
                    let id = self.push(
                        EventKind::ActivityTaskScheduled,
                        json!({
                            "activityId": activity_id,
                            "activityType": activity_type,
                            "input": input,
                            "control": control,
                            "decisionTaskCompletedEventId": completed
                        }),
                    );
                    self.initiated.insert(activity_id.clone(), id);
                }
                Decision::StartTimer {
                    timer_id,
                    start_to_fire_timeout,
                    control,
                } => {
                    let id = self.push(
                        EventKind::TimerStarted,
                        json!({
                            "timerId": timer_id,
                            "control": control,
                            "startToFireTimeout": start_to_fire_timeout.as_secs().to_string(),
                            "decisionTaskCompletedEventId": completed
                        }),
                    );
                    self.initiated.insert(timer_id.clone(), id);
                }
                Decision::SignalExternalWorkflowExecution {
                    signal_name,
                    workflow_id,
                    input,
                    control,
                    ..
                } => {
                    let id = self.push(
                        EventKind::SignalExternalWorkflowExecutionInitiated,
                        json!({
                            "signalName": signal_name,
                            "workflowId": workflow_id,
                            "input": input,
                            "control": control,
                            "decisionTaskCompletedEventId": completed
                        }),
                    );
                    self.initiated.insert(signal_name.clone(), id);
                }
                Decision::StartChildWorkflowExecution {
                    workflow_id,
                    workflow_type,
                    input,
                    control,
                    ..
                } => {
                    let id = self.push(
                        EventKind::StartChildWorkflowExecutionInitiated,
                        json!({
                            "workflowId": workflow_id,
                            "workflowType": workflow_type,
                            "input": input,
                            "control": control,
                            "decisionTaskCompletedEventId": completed
                        }),
                    );
                    self.initiated.insert(workflow_id.clone(), id);
                }
                Decision::RecordMarker {
                    marker_name,
                    details,
                } => {
                    self.push(
                        EventKind::MarkerRecorded,
                        json!({
                            "markerName": marker_name,
                            "details": details,
                            "decisionTaskCompletedEventId": completed
                        }),
                    );
                }
                Decision::CompleteWorkflowExecution { result } => {
                    self.push(
                        EventKind::WorkflowExecutionCompleted,
                        json!({ "result": result, "decisionTaskCompletedEventId": completed }),
                    );
                }
                Decision::FailWorkflowExecution { reason, details } => {
                    self.push(
                        EventKind::WorkflowExecutionFailed,
                        json!({
                            "reason": reason,
                            "details": details,
                            "decisionTaskCompletedEventId": completed
                        }),
                    );
                }
            }
        }
        self
    }

    fn initiated(&self, unit: &str) -> i64 {
        *self
            .initiated
            .get(unit)
            .unwrap_or_else(|| panic!("`{unit}` was never initiated"))
    }

    fn activity_started(&mut self, activity_id: &str) -> (i64, i64) {
        let scheduled = self.initiated(activity_id);
        let started = self.push(
            EventKind::ActivityTaskStarted,
            json!({ "scheduledEventId": scheduled, "identity": "worker-1" }),
        );
        self.started.insert(activity_id.to_string(), started);
        (scheduled, started)
    }

    pub fn activity_completed(&mut self, activity_id: &str, result: &str) -> &mut Self {
        let (scheduled, started) = self.activity_started(activity_id);
        self.push(
            EventKind::ActivityTaskCompleted,
            json!({ "scheduledEventId": scheduled, "startedEventId": started, "result": result }),
        );
        self
    }

    pub fn activity_failed(&mut self, activity_id: &str, reason: &str, details: &str) -> &mut Self {
        let (scheduled, started) = self.activity_started(activity_id);
        self.push(
            EventKind::ActivityTaskFailed,
            json!({
                "scheduledEventId": scheduled,
                "startedEventId": started,
                "reason": reason,
                "details": details
            }),
        );
        self
    }

    pub fn activity_timed_out(&mut self, activity_id: &str, timeout_type: &str) -> &mut Self {
        let (scheduled, started) = self.activity_started(activity_id);
        self.push(
            EventKind::ActivityTaskTimedOut,
            json!({
                "scheduledEventId": scheduled,
                "startedEventId": started,
                "timeoutType": timeout_type
            }),
        );
        self
    }

    pub fn schedule_failed(&mut self, activity_id: &str, cause: &str) -> &mut Self {
        self.push(
            EventKind::ScheduleActivityTaskFailed,
            json!({
                "activityId": activity_id,
                "activityType": { "name": "Unknown", "version": "1" },
                "cause": cause
            }),
        );
        self
    }

    pub fn timer_fired(&mut self, timer_id: &str) -> &mut Self {
        let started = self.initiated(timer_id);
        self.push(
            EventKind::TimerFired,
            json!({ "timerId": timer_id, "startedEventId": started }),
        );
        self
    }

    pub fn signal_delivered(&mut self, signal_name: &str) -> &mut Self {
        let initiated = self.initiated(signal_name);
        self.push(
            EventKind::ExternalWorkflowExecutionSignaled,
            json!({
                "initiatedEventId": initiated,
                "workflowExecution": { "workflowId": "other", "runId": "run-other" }
            }),
        );
        self
    }

    pub fn signal_received(&mut self, signal_name: &str, input: &str) -> &mut Self {
        self.push(
            EventKind::WorkflowExecutionSignaled,
            json!({ "signalName": signal_name, "input": input }),
        );
        self
    }

    fn child_started(&mut self, workflow_id: &str) -> i64 {
        let initiated = self.initiated(workflow_id);
        self.push(
            EventKind::ChildWorkflowExecutionStarted,
            json!({
                "initiatedEventId": initiated,
                "workflowExecution": { "workflowId": workflow_id, "runId": "child-run" },
                "workflowType": { "name": "Child", "version": "1" }
            }),
        );
        initiated
    }

    pub fn child_completed(&mut self, workflow_id: &str, result: &str) -> &mut Self {
        let initiated = self.child_started(workflow_id);
        self.push(
            EventKind::ChildWorkflowExecutionCompleted,
            json!({
                "initiatedEventId": initiated,
                "workflowExecution": { "workflowId": workflow_id, "runId": "child-run" },
                "result": result
            }),
        );
        self
    }

    pub fn child_failed(&mut self, workflow_id: &str, reason: &str, details: &str) -> &mut Self {
        let initiated = self.child_started(workflow_id);
        self.push(
            EventKind::ChildWorkflowExecutionFailed,
            json!({
                "initiatedEventId": initiated,
                "workflowExecution": { "workflowId": workflow_id, "runId": "child-run" },
                "reason": reason,
                "details": details
            }),
        );
        self
    }

    /// All events, oldest first
    pub fn events(&self) -> Vec<RawHistoryEvent> {
        self.events.clone()
    }

    /// History split into pages of `size`, newest page first, newest event first
    pub fn pages(&self, size: usize) -> Vec<Vec<RawHistoryEvent>> {
        let newest_first: Vec<RawHistoryEvent> = self.events.iter().rev().cloned().collect();
        newest_first.chunks(size).map(<[_]>::to_vec).collect()
    }
}

/// Replay the whole history into a fresh decider and decide
pub fn decide(workflow: &Arc<dyn Workflow>, history: &HistoryBuilder) -> Vec<Decision> {
    let mut decider = Decider::new(Arc::clone(workflow));
    decider
        .ingest(&history.events())
        .expect("history should ingest");
    decider.decide()
}

/// Feed pages of `size`, newest first, until the decider needs no older ones
///
/// Returns the decisions and how many pages were read.
pub fn decide_paged(
    workflow: &Arc<dyn Workflow>,
    history: &HistoryBuilder,
    size: usize,
) -> (Vec<Decision>, usize) {
    let mut decider = Decider::new(Arc::clone(workflow));
    let mut read = 0;
    for page in history.pages(size) {
        decider.ingest(&page).expect("page should ingest");
        read += 1;
        if !decider.is_more_history_required() {
            break;
        }
    }
    (decider.decide(), read)
}

/// Decide, then record the decisions and open the next decision task
pub fn step(workflow: &Arc<dyn Workflow>, history: &mut HistoryBuilder) -> Vec<Decision> {
    let decisions = decide(workflow, history);
    history.apply(&decisions);
    decisions
}

/// Delay of the only decision when it is a timer
pub fn timer_delay(decisions: &[Decision]) -> Option<u64> {
    match decisions {
        [Decision::StartTimer {
            start_to_fire_timeout,
            ..
        }] => Some(start_to_fire_timeout.as_secs()),
        _ => None,
    }
}

/// Type names of decisions, in order
pub fn types(decisions: &[Decision]) -> Vec<&'static str> {
    decisions.iter().map(Decision::decision_type).collect()
}
