//! Interface to the remote coordination service
//!
//! The decider never talks to the network itself. A [`DecisionService`]
//! implementation hands out decision tasks, serves older history pages on
//! request and accepts the decisions made for a task.

use async_trait::async_trait;
use replayflow_decider::{Decision, RawHistoryEvent, WorkflowType};
use serde::{Deserialize, Serialize};

/// Errors reported by a coordination service
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The service could not be reached or refused the call
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Page token not issued by the service, or already expired
    #[error("invalid next page token: {0}")]
    InvalidPageToken(String),

    /// Task token not known to the service
    #[error("unknown task token: {0}")]
    UnknownTaskToken(String),

    /// Payload could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Identity of one workflow run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub run_id: String,
}

impl WorkflowExecution {
    pub fn new(workflow_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
        }
    }
}

impl std::fmt::Display for WorkflowExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.workflow_id, self.run_id)
    }
}

/// Parameters of a decision task poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRequest {
    pub domain: String,
    pub task_list: String,
    pub identity: String,
    pub maximum_page_size: usize,
}

/// One page of history, newest event first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub events: Vec<RawHistoryEvent>,
    /// Token for the next (older) page; absent on the oldest page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// A decision task handed out by the service, with the newest history page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionTask {
    pub task_token: String,
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    #[serde(flatten)]
    pub page: HistoryPage,
}

/// Client side of the coordination service's decision API
#[async_trait]
pub trait DecisionService: Send + Sync + 'static {
    /// Long-poll for a decision task; `None` when the poll timed out empty
    async fn poll_for_decision_task(
        &self,
        request: &PollRequest,
    ) -> Result<Option<DecisionTask>, ServiceError>;

    /// Fetch the history page that `next_page_token` points at
    async fn next_history_page(
        &self,
        request: &PollRequest,
        next_page_token: &str,
    ) -> Result<HistoryPage, ServiceError>;

    /// Submit the decisions made for a task
    async fn respond_decision_task_completed(
        &self,
        task_token: &str,
        decisions: Vec<Decision>,
    ) -> Result<(), ServiceError>;
}
