//! Replay context handed to workflow decision logic

use tracing::{debug, info};

use super::DeciderError;
use crate::graph::{DependencyGraph, CHECKPOINT_MARKER};
use crate::history::HistoryStore;
use crate::workflow::state::{self, ActionView};
use crate::workflow::{Action, ActionState, Decision, InputSource, Outcome};

/// State and decisions of one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEvaluation {
    pub state: ActionState,
    pub outcome: Outcome,
    /// What the action needs this cycle, ignoring its parents
    pub decisions: Vec<Decision>,
}

/// Read-only view of one run: the workflow's graph and the run's history
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    graph: &'a DependencyGraph,
    history: &'a HistoryStore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    /// Succeeded
    Satisfied,
    /// In a group the checkpoint has moved past
    Skipped,
    /// Failed for good
    Failed,
    /// Can never start because a parent failed
    Blocked,
    /// Not finished
    Pending,
    /// In a group after the current checkpoint
    Waiting,
}

enum Gate {
    Open,
    Wait,
    Blocked,
}

/// Result of walking the graph for one checkpoint group
struct GraphPass {
    decisions: Vec<Decision>,
    /// Every action of the current group is finished
    group_finished: bool,
    /// Every action of the graph is finished or skipped
    all_finished: bool,
}

impl<'a> DecisionContext<'a> {
    pub fn new(graph: &'a DependencyGraph, history: &'a HistoryStore) -> Self {
        Self { graph, history }
    }

    pub fn graph(&self) -> &'a DependencyGraph {
        self.graph
    }

    pub fn history(&self) -> &'a HistoryStore {
        self.history
    }

    /// Input of the run, when the start event has been loaded
    pub fn workflow_input(&self) -> Option<&'a str> {
        self.history.workflow_input()
    }

    /// Highest checkpoint group recorded by marker or signal
    pub fn checkpoint(&self) -> Option<u32> {
        [
            self.history.markers().get(CHECKPOINT_MARKER),
            self.history.signals().get(CHECKPOINT_MARKER),
        ]
        .into_iter()
        .flatten()
        .filter_map(|value| value.trim().parse::<u32>().ok())
        .max()
    }

    /// Group whose actions are being decided: the checkpoint, or the lowest group
    pub fn current_group(&self) -> Option<u32> {
        let lowest = self.graph.groups().first().copied();
        match (self.checkpoint(), lowest) {
            (Some(checkpoint), Some(lowest)) => Some(checkpoint.max(lowest)),
            (checkpoint, lowest) => checkpoint.or(lowest),
        }
    }

    pub fn state(&self, id: &str) -> Result<ActionState, DeciderError> {
        Ok(self.view(self.action(id)?).state)
    }

    pub fn outcome(&self, id: &str) -> Result<Outcome, DeciderError> {
        Ok(self.view(self.action(id)?).outcome)
    }

    /// Output of a successful action
    ///
    /// Asking for the output of an action in any other state is an error.
    pub fn output(&self, id: &str) -> Result<String, DeciderError> {
        let view = self.view(self.action(id)?);
        match view.outcome {
            Outcome::Success(output) => Ok(output),
            _ => Err(DeciderError::OutputNotAvailable {
                action: id.to_string(),
                state: view.state,
            }),
        }
    }

    /// State, outcome and decisions of one action, ignoring its parents
    pub fn evaluate(&self, id: &str) -> Result<ActionEvaluation, DeciderError> {
        let action = self.action(id)?;
        let view = self.view(action);
        let decisions = self.decisions_for(action, &view)?;
        Ok(ActionEvaluation {
            state: view.state,
            outcome: view.outcome,
            decisions,
        })
    }

    /// Decisions for one action, ignoring its parents
    pub fn decide_action(&self, id: &str) -> Result<Vec<Decision>, DeciderError> {
        Ok(self.evaluate(id)?.decisions)
    }

    /// Decisions for the whole graph
    ///
    /// Actions are visited in topological order. An action that has not
    /// started yet starts once every parent succeeded or was skipped by a
    /// checkpoint; a failed parent blocks it unless the action does not fail
    /// the workflow on error. When the current group is finished the
    /// checkpoint advances and a checkpoint marker is recorded ahead of the
    /// next group's decisions. A workflow failure or completion is returned
    /// alone, failure first; when every action is finished and neither was
    /// requested, the workflow completes.
    pub fn decide_graph(&self) -> Result<Vec<Decision>, DeciderError> {
        let groups = self.graph.groups();
        let Some(mut current) = self.current_group() else {
            return Ok(vec![Decision::CompleteWorkflowExecution { result: None }]);
        };

        let mut markers = Vec::new();
        loop {
            let pass = self.walk(current)?;
            let closing = pass.decisions.iter().any(Decision::is_terminal);
            if pass.group_finished && !closing {
                if let Some(&next) = groups.iter().find(|&&group| group > current) {
                    info!(from = current, to = next, "Advancing checkpoint");
                    markers.push(Decision::record_marker(
                        CHECKPOINT_MARKER,
                        next.to_string(),
                    ));
                    current = next;
                    continue;
                }
            }
            return Ok(finish(markers, pass));
        }
    }

    fn walk(&self, current: u32) -> Result<GraphPass, DeciderError> {
        let mut resolution = vec![Resolution::Pending; self.graph.len()];
        let mut pass = GraphPass {
            decisions: Vec::new(),
            group_finished: true,
            all_finished: true,
        };

        for &i in self.graph.order() {
            let action = self.graph.action_at(i);
            let group = self.graph.group_at(i);
            if group < current {
                resolution[i] = Resolution::Skipped;
                continue;
            }
            if group > current {
                resolution[i] = Resolution::Waiting;
                pass.all_finished = false;
                continue;
            }

            let view = self.view(action);
            if view.state == ActionState::Initial {
                let parents = self.graph.parent_indices(i).iter().map(|&p| resolution[p]);
                match gate(parents, action.fails_workflow_on_error()) {
                    Gate::Open => {}
                    Gate::Wait => {
                        pass.group_finished = false;
                        pass.all_finished = false;
                        continue;
                    }
                    Gate::Blocked => {
                        debug!(action_id = action.id(), "Blocked by failed parent");
                        resolution[i] = Resolution::Blocked;
                        continue;
                    }
                }
            }

            pass.decisions.extend(self.decisions_for(action, &view)?);
            resolution[i] = match view.outcome {
                Outcome::Success(_) => Resolution::Satisfied,
                Outcome::Failed { .. } => Resolution::Failed,
                Outcome::NotReady => {
                    pass.group_finished = false;
                    pass.all_finished = false;
                    Resolution::Pending
                }
            };
        }

        Ok(pass)
    }

    /// Whether the loaded history holds every input the graph may resolve next
    ///
    /// Any action from the current group onwards that still has to start or
    /// retry needs its input: the run input requires the start event, and the
    /// output of a parent before the current group requires that parent's
    /// result. Always true once the start event is loaded.
    pub fn inputs_loaded(&self) -> bool {
        if self.history.has_workflow_started() {
            return true;
        }
        let Some(current) = self.current_group() else {
            return true;
        };

        self.graph.order().iter().all(|&i| {
            let action = self.graph.action_at(i);
            if self.graph.group_at(i) < current {
                return true;
            }
            if !matches!(
                self.view(action).state,
                ActionState::Initial | ActionState::Retry
            ) {
                return true;
            }
            match action.kind().input() {
                Some(InputSource::WorkflowInput) => false,
                Some(InputSource::OutputOf(parent)) => {
                    let loaded = self
                        .graph
                        .group_of(parent)
                        .map_or(true, |group| group >= current);
                    loaded
                        || matches!(
                            self.outcome(parent),
                            Ok(Outcome::Success(_) | Outcome::Failed { .. })
                        )
                }
                _ => true,
            }
        })
    }

    fn action(&self, id: &str) -> Result<&'a Action, DeciderError> {
        self.graph
            .get(id)
            .ok_or_else(|| DeciderError::UnregisteredAction(id.to_string()))
    }

    fn view(&self, action: &Action) -> ActionView<'a> {
        state::view(action, &self.history.events_for(action.id()))
    }

    fn decisions_for(
        &self,
        action: &Action,
        view: &ActionView<'_>,
    ) -> Result<Vec<Decision>, DeciderError> {
        let input = match view.state {
            ActionState::Initial | ActionState::Retry => self.resolve_input(action)?,
            _ => String::new(),
        };
        Ok(state::decisions(action, view, &input))
    }

    fn resolve_input(&self, action: &Action) -> Result<String, DeciderError> {
        match action.kind().input() {
            None => Ok(String::new()),
            Some(InputSource::Static(value)) => Ok(value.clone()),
            Some(InputSource::WorkflowInput) => match self.workflow_input() {
                Some(input) => Ok(input.to_string()),
                None if self.history.has_workflow_started() => Ok(String::new()),
                None => Err(DeciderError::MissingWorkflowInput {
                    action: action.id().to_string(),
                }),
            },
            Some(InputSource::OutputOf(parent)) => match self.outcome(parent)? {
                Outcome::Success(output) => Ok(output),
                Outcome::Failed { .. } if !action.fails_workflow_on_error() => Ok(String::new()),
                _ => Err(DeciderError::MissingParentOutput {
                    action: action.id().to_string(),
                    parent: parent.clone(),
                }),
            },
        }
    }
}

fn gate(parents: impl Iterator<Item = Resolution>, fail_on_error: bool) -> Gate {
    let mut waiting = false;
    for parent in parents {
        match parent {
            Resolution::Satisfied | Resolution::Skipped => {}
            Resolution::Failed | Resolution::Blocked if fail_on_error => return Gate::Blocked,
            Resolution::Failed | Resolution::Blocked => {}
            Resolution::Pending | Resolution::Waiting => waiting = true,
        }
    }
    if waiting {
        Gate::Wait
    } else {
        Gate::Open
    }
}

fn finish(markers: Vec<Decision>, pass: GraphPass) -> Vec<Decision> {
    let terminal = pass
        .decisions
        .iter()
        .find(|d| matches!(d, Decision::FailWorkflowExecution { .. }))
        .or_else(|| {
            pass.decisions
                .iter()
                .find(|d| matches!(d, Decision::CompleteWorkflowExecution { .. }))
        });
    if let Some(decision) = terminal {
        return vec![decision.clone()];
    }
    if pass.all_finished {
        return vec![Decision::CompleteWorkflowExecution { result: None }];
    }

    let mut decisions = markers;
    decisions.extend(pass.decisions);
    decisions
}
