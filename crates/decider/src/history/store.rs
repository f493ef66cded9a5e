//! Per-run history store

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::event::{EventKind, LifecycleState, NormalizedEvent};

/// Accumulated, ordered history of one workflow run
///
/// Events may arrive in any order (the service pages newest-first) and may be
/// delivered more than once; the store keeps exactly one copy of each
/// `sequence_id` in ascending order and rebuilds its derived views on every
/// append that changes the event set.
#[derive(Debug, Default)]
pub struct HistoryStore {
    events: Vec<NormalizedEvent>,
    seen: HashSet<i64>,

    /// unit id -> positions in `events`
    by_unit: HashMap<String, Vec<usize>>,

    /// Sequence id of the latest `DecisionTaskCompleted`
    decision_boundary: Option<i64>,

    workflow_started: bool,
    workflow_input: Option<String>,
    markers: BTreeMap<String, String>,
    signals: BTreeMap<String, String>,

    /// positions of `CRITICAL` events
    critical: Vec<usize>,
}

impl HistoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append events, ignoring any sequence id already present
    ///
    /// Returns the number of events actually added.
    pub fn append(&mut self, events: impl IntoIterator<Item = NormalizedEvent>) -> usize {
        let mut added = 0;
        for event in events {
            if !self.seen.insert(event.sequence_id()) {
                debug!(
                    sequence_id = event.sequence_id(),
                    kind = %event.kind(),
                    "Skipping duplicate history event"
                );
                continue;
            }
            self.events.push(event);
            added += 1;
        }

        if added > 0 {
            self.events.sort_unstable_by_key(NormalizedEvent::sequence_id);
            self.rebuild();
        }
        added
    }

    /// Drop everything; used between unrelated runs
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events, oldest first
    pub fn events(&self) -> &[NormalizedEvent] {
        &self.events
    }

    /// Events belonging to one unit of work, oldest first
    pub fn events_for(&self, unit_id: &str) -> Vec<&NormalizedEvent> {
        self.by_unit
            .get(unit_id)
            .map(|positions| positions.iter().map(|&i| &self.events[i]).collect())
            .unwrap_or_default()
    }

    /// Sequence id of the most recent completed decision, if any
    pub fn decision_boundary(&self) -> Option<i64> {
        self.decision_boundary
    }

    /// Events recorded after the most recent completed decision
    pub fn since_last_decision(&self) -> &[NormalizedEvent] {
        let start = match self.decision_boundary {
            Some(boundary) => self
                .events
                .partition_point(|event| event.sequence_id() <= boundary),
            None => 0,
        };
        &self.events[start..]
    }

    /// Whether the `WorkflowExecutionStarted` event has been loaded
    pub fn has_workflow_started(&self) -> bool {
        self.workflow_started
    }

    /// Input of the run
    ///
    /// `None` until the start event is loaded, which may never happen once
    /// the poller stops paging at a checkpoint.
    pub fn workflow_input(&self) -> Option<&str> {
        self.workflow_input.as_deref()
    }

    /// Marker name -> details of the latest marker with that name
    pub fn markers(&self) -> &BTreeMap<String, String> {
        &self.markers
    }

    /// Signal name -> input of the latest signal with that name
    pub fn signals(&self) -> &BTreeMap<String, String> {
        &self.signals
    }

    /// Every `CRITICAL` event seen, oldest first
    pub fn critical_errors(&self) -> Vec<&NormalizedEvent> {
        self.critical.iter().map(|&i| &self.events[i]).collect()
    }

    /// `CRITICAL` events recorded after the most recent completed decision
    pub fn critical_errors_since_last_decision(&self) -> Vec<&NormalizedEvent> {
        let boundary = self.decision_boundary.unwrap_or(i64::MIN);
        self.critical_errors()
            .into_iter()
            .filter(|event| event.sequence_id() > boundary)
            .collect()
    }

    fn rebuild(&mut self) {
        self.by_unit.clear();
        self.critical.clear();
        self.markers.clear();
        self.signals.clear();
        self.decision_boundary = None;
        self.workflow_started = false;
        self.workflow_input = None;

        // initiator sequence id -> unit id
        let initiators: HashMap<i64, String> = self
            .events
            .iter()
            .filter(|event| event.is_initiator())
            .filter_map(|event| Some((event.sequence_id(), event.unit_id()?.to_string())))
            .collect();

        for (position, event) in self.events.iter_mut().enumerate() {
            if let Some(correlation) = event.correlation_id().filter(|_| !event.is_initiator()) {
                match initiators.get(&correlation) {
                    Some(unit_id) => {
                        if event.unit_id().is_none() {
                            event.resolve_unit_id(unit_id);
                        } else if event.unit_id() != Some(unit_id.as_str()) {
                            warn!(
                                sequence_id = event.sequence_id(),
                                correlation_id = correlation,
                                own_unit = event.unit_id().unwrap_or_default(),
                                initiator_unit = %unit_id,
                                "Event unit id disagrees with its initiator"
                            );
                        }
                    }
                    None => debug!(
                        sequence_id = event.sequence_id(),
                        correlation_id = correlation,
                        "Initiator not loaded yet"
                    ),
                }
            }

            if let Some(unit_id) = event.unit_id() {
                self.by_unit
                    .entry(unit_id.to_string())
                    .or_default()
                    .push(position);
            }

            if event.state() == LifecycleState::Critical {
                self.critical.push(position);
            }

            match event.kind() {
                EventKind::WorkflowExecutionStarted => {
                    self.workflow_started = true;
                    self.workflow_input = event.data("input").map(str::to_string);
                }
                EventKind::DecisionTaskCompleted => {
                    self.decision_boundary = Some(event.sequence_id());
                }
                EventKind::MarkerRecorded => {
                    if let Some(name) = event.unit_id() {
                        let details = event.data("details").unwrap_or_default();
                        self.markers.insert(name.to_string(), details.to_string());
                    }
                }
                EventKind::WorkflowExecutionSignaled => {
                    if let Some(name) = event.data("signalName").filter(|n| !n.is_empty()) {
                        let input = event.data("input").unwrap_or_default();
                        self.signals.insert(name.to_string(), input.to_string());
                    }
                }
                _ => {}
            }
        }
    }
}
