//! Pool of decision pollers
//!
//! Concurrency comes from running several independent pollers, each with its
//! own decider; no run's state is ever shared between tasks.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::config::WorkerConfig;
use crate::poller::DecisionPoller;
use crate::registry::WorkflowRegistry;
use crate::service::DecisionService;

/// Worker errors
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Worker already running
    #[error("decider worker is already running")]
    AlreadyRunning,

    /// Nothing to decide
    #[error("no workflows registered")]
    NoWorkflows,

    /// Shutdown timeout
    #[error("graceful shutdown timed out")]
    ShutdownTimeout,

    /// A poller task panicked
    #[error("poller task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Runs `pollers` decision pollers on tokio tasks
///
/// # Example
///
/// ```ignore
/// let worker = DeciderWorker::new(service, Arc::new(registry), WorkerConfig::from_env());
/// worker.start()?;
///
/// // ... later, graceful shutdown
/// worker.shutdown().await?;
/// ```
pub struct DeciderWorker {
    service: Arc<dyn DecisionService>,
    registry: Arc<WorkflowRegistry>,
    config: WorkerConfig,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl DeciderWorker {
    /// Create a new worker
    pub fn new(
        service: Arc<dyn DecisionService>,
        registry: Arc<WorkflowRegistry>,
        config: WorkerConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            service,
            registry,
            config,
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// Spawn the pollers
    #[instrument(skip(self), fields(task_list = %self.config.poller.task_list))]
    pub fn start(&mut self) -> Result<(), WorkerError> {
        if self.is_running() {
            return Err(WorkerError::AlreadyRunning);
        }
        if self.registry.is_empty() {
            return Err(WorkerError::NoWorkflows);
        }

        info!(
            pollers = self.config.pollers,
            domain = %self.config.poller.domain,
            workflow_types = ?self.registry.workflow_types(),
            "Starting decider worker"
        );

        self.shutdown_tx.send_replace(false);
        for index in 0..self.config.pollers {
            let config = self
                .config
                .poller
                .clone()
                .with_identity(format!("{}-{index}", self.config.poller.identity));
            let mut poller = DecisionPoller::new(
                Arc::clone(&self.service),
                Arc::clone(&self.registry),
                config,
                self.shutdown_tx.subscribe(),
            );
            self.handles
                .push(tokio::spawn(async move { poller.run().await }));
        }
        Ok(())
    }

    /// Check if pollers are running
    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Signal every poller to stop and wait for in-flight tasks
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self) -> Result<(), WorkerError> {
        if !self.is_running() {
            return Ok(());
        }

        info!("Initiating graceful shutdown");
        self.shutdown_tx.send_replace(true);

        let handles = std::mem::take(&mut self.handles);
        let joined = tokio::time::timeout(self.config.shutdown_timeout, async {
            for handle in handles {
                handle.await?;
            }
            Ok::<_, tokio::task::JoinError>(())
        })
        .await;

        match joined {
            Ok(result) => {
                result?;
                info!("Decider worker stopped");
                Ok(())
            }
            Err(_) => {
                warn!("Shutdown timeout reached");
                Err(WorkerError::ShutdownTimeout)
            }
        }
    }
}
