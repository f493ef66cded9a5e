//! Decision task polling with exponential backoff
//!
//! One poller handles one decision task at a time: it polls, pages history
//! into a [`Decider`] until the decider has seen enough, decides and submits.

use std::sync::Arc;
use std::time::Duration;

use replayflow_decider::{Decider, DeciderConfig, Decision};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::PollerConfig;
use crate::registry::{RegistryError, WorkflowRegistry};
use crate::service::{DecisionService, DecisionTask, PollRequest, ServiceError};

/// Poller errors
#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    /// Service error
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// The task names a workflow type nobody registered
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// What a single poll did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No task was available
    Idle,
    /// A task was decided; carries the submitted decisions
    Decided(Vec<Decision>),
}

/// Decision task poller with adaptive backoff
///
/// Polls with exponential backoff while idle and resets to the minimum
/// interval once a task is handled. The decider is reset and reused from one
/// task to the next.
pub struct DecisionPoller {
    service: Arc<dyn DecisionService>,
    registry: Arc<WorkflowRegistry>,
    config: PollerConfig,
    decider_config: DeciderConfig,
    decider: Option<Decider>,
    current_interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl DecisionPoller {
    /// Create a new decision poller
    pub fn new(
        service: Arc<dyn DecisionService>,
        registry: Arc<WorkflowRegistry>,
        config: PollerConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            service,
            registry,
            current_interval: config.min_interval,
            config,
            decider_config: DeciderConfig::default(),
            decider: None,
            shutdown_rx,
        }
    }

    /// Set the configuration of the deciders this poller creates
    pub fn with_decider_config(mut self, config: DeciderConfig) -> Self {
        self.decider_config = config;
        self
    }

    pub fn identity(&self) -> &str {
        &self.config.identity
    }

    /// Get the current poll interval
    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    fn request(&self) -> PollRequest {
        PollRequest {
            domain: self.config.domain.clone(),
            task_list: self.config.task_list.clone(),
            identity: self.config.identity.clone(),
            maximum_page_size: self.config.page_size,
        }
    }

    /// Poll for one decision task and handle it
    ///
    /// A task whose workflow type is not registered is left unanswered and
    /// reported as an error; the service times it out and reschedules it.
    #[instrument(skip(self), fields(identity = %self.config.identity))]
    pub async fn poll_once(&mut self) -> Result<PollOutcome, PollerError> {
        let request = self.request();
        let Some(task) = self.service.poll_for_decision_task(&request).await? else {
            self.increase_backoff();
            trace!(
                interval_ms = self.current_interval.as_millis(),
                "No decision task, backing off"
            );
            return Ok(PollOutcome::Idle);
        };
        self.reset_backoff();

        let workflow = self.registry.get(&task.workflow_type).inspect_err(|_| {
            warn!(
                workflow_type = %task.workflow_type,
                execution = %task.workflow_execution,
                "Decision task for unregistered workflow type"
            );
        })?;

        let mut decider = match self.decider.take() {
            Some(mut decider) => {
                decider.reset_with(workflow);
                decider
            }
            None => Decider::with_config(workflow, self.decider_config.clone()),
        };

        let decisions = self.replay(&request, &task, &mut decider).await?;
        self.decider = Some(decider);

        info!(
            execution = %task.workflow_execution,
            workflow_type = %task.workflow_type,
            decisions = decisions.len(),
            "Responding to decision task"
        );
        self.service
            .respond_decision_task_completed(&task.task_token, decisions.clone())
            .await?;
        Ok(PollOutcome::Decided(decisions))
    }

    /// Page history into the decider and decide
    async fn replay(
        &self,
        request: &PollRequest,
        task: &DecisionTask,
        decider: &mut Decider,
    ) -> Result<Vec<Decision>, PollerError> {
        let mut page = task.page.clone();
        let mut pages = 1;
        loop {
            if let Err(err) = decider.ingest(&page.events) {
                error!(
                    execution = %task.workflow_execution,
                    error = %err,
                    "History rejected, failing workflow"
                );
                return Ok(vec![Decision::fail("history rejected", err.to_string())]);
            }
            if !decider.is_more_history_required() {
                break;
            }
            let Some(token) = page.next_page_token.take() else {
                break;
            };
            page = self.service.next_history_page(request, &token).await?;
            pages += 1;
        }

        debug!(
            execution = %task.workflow_execution,
            pages,
            events = decider.history().len(),
            "History loaded"
        );
        Ok(decider.decide())
    }

    /// Poll until shutdown is signalled
    pub async fn run(&mut self) {
        info!(identity = %self.config.identity, "Starting decision poller");

        loop {
            if self.is_shutdown() {
                debug!("Poll loop: shutdown requested");
                break;
            }

            match self.poll_once().await {
                Ok(PollOutcome::Decided(_)) => continue,
                Ok(PollOutcome::Idle) => {}
                Err(err) => {
                    error!(error = %err, "Error polling decision tasks");
                    self.increase_backoff();
                }
            }

            if self.wait().await {
                break;
            }
        }

        info!(identity = %self.config.identity, "Decision poller stopped");
    }

    /// Wait for the current backoff interval
    ///
    /// Returns true if shutdown is signaled.
    pub async fn wait(&mut self) -> bool {
        let mut shutdown_rx = self.shutdown_rx.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.current_interval) => false,
            _ = shutdown_rx.changed() => {
                debug!("Shutdown signal received during wait");
                true
            }
        }
    }

    /// Reset backoff to minimum interval
    fn reset_backoff(&mut self) {
        self.current_interval = self.config.min_interval;
    }

    /// Increase backoff interval
    fn increase_backoff(&mut self) {
        let next = self
            .current_interval
            .mul_f64(self.config.backoff_multiplier.max(1.0));
        self.current_interval = next.min(self.config.max_interval);
    }
}

impl std::fmt::Debug for DecisionPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionPoller")
            .field("identity", &self.config.identity)
            .field("current_interval", &self.current_interval)
            .finish()
    }
}
