//! In-memory coordination service for testing and development

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use replayflow_decider::{Decision, RawHistoryEvent, WorkflowType};
use tracing::debug;
use uuid::Uuid;

use crate::service::{
    DecisionService, DecisionTask, HistoryPage, PollRequest, ServiceError, WorkflowExecution,
};

/// Decisions submitted for one task
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub task_token: String,
    pub workflow_execution: WorkflowExecution,
    pub decisions: Vec<Decision>,
    pub submitted_at: DateTime<Utc>,
}

struct QueuedTask {
    task_token: String,
    workflow_execution: WorkflowExecution,
    workflow_type: WorkflowType,
    /// Newest first
    events: Vec<RawHistoryEvent>,
}

struct OpenTask {
    workflow_execution: WorkflowExecution,
    events: Vec<RawHistoryEvent>,
}

#[derive(Default)]
struct Inner {
    queue: VecDeque<QueuedTask>,
    open: HashMap<String, OpenTask>,
    submissions: Vec<Submission>,
    pages_served: usize,
}

/// Coordination service that serves scripted decision tasks from memory
///
/// Tasks are handed out in the order they were queued. History is paged
/// newest first; page tokens have the form `<task token>:<offset>`.
///
/// # Example
///
/// ```ignore
/// let service = InMemoryDecisionService::new().with_page_size(10);
/// service.enqueue(WorkflowType::new("Order", "1"), execution, history);
/// // ... run a poller against it
/// assert_eq!(service.submissions().len(), 1);
/// ```
pub struct InMemoryDecisionService {
    inner: Mutex<Inner>,
    page_size: Option<usize>,
}

impl Default for InMemoryDecisionService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDecisionService {
    /// Create a service that honours the page size each poll asks for
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            page_size: None,
        }
    }

    /// Cap every page at `size` events, whatever the poll asks for
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size.max(1));
        self
    }

    /// Queue a decision task over `history` (oldest event first)
    ///
    /// Returns the task token.
    pub fn enqueue(
        &self,
        workflow_type: WorkflowType,
        workflow_execution: WorkflowExecution,
        history: Vec<RawHistoryEvent>,
    ) -> String {
        let task_token = format!("task-{}", Uuid::now_v7());
        let mut events = history;
        events.reverse();

        let mut inner = self.inner.lock();
        inner.queue.push_back(QueuedTask {
            task_token: task_token.clone(),
            workflow_execution,
            workflow_type,
            events,
        });
        task_token
    }

    /// Queue a decision task over a JSON array of history records
    pub fn enqueue_json(
        &self,
        workflow_type: WorkflowType,
        workflow_execution: WorkflowExecution,
        history: serde_json::Value,
    ) -> Result<String, ServiceError> {
        let events: Vec<RawHistoryEvent> = serde_json::from_value(history)?;
        Ok(self.enqueue(workflow_type, workflow_execution, events))
    }

    /// Tasks not handed out yet
    pub fn pending(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Everything submitted so far, in submission order
    pub fn submissions(&self) -> Vec<Submission> {
        self.inner.lock().submissions.clone()
    }

    /// History pages served, including the first page of each task
    pub fn pages_served(&self) -> usize {
        self.inner.lock().pages_served
    }

    fn page_size(&self, request: &PollRequest) -> usize {
        let requested = request.maximum_page_size.max(1);
        self.page_size.map_or(requested, |cap| cap.min(requested))
    }
}

fn page_at(task_token: &str, events: &[RawHistoryEvent], offset: usize, size: usize) -> HistoryPage {
    let end = offset.saturating_add(size).min(events.len());
    let start = offset.min(end);
    HistoryPage {
        events: events[start..end].to_vec(),
        next_page_token: (end < events.len()).then(|| format!("{task_token}:{end}")),
    }
}

#[async_trait]
impl DecisionService for InMemoryDecisionService {
    async fn poll_for_decision_task(
        &self,
        request: &PollRequest,
    ) -> Result<Option<DecisionTask>, ServiceError> {
        let size = self.page_size(request);
        let mut inner = self.inner.lock();
        let Some(task) = inner.queue.pop_front() else {
            return Ok(None);
        };

        let page = page_at(&task.task_token, &task.events, 0, size);
        inner.pages_served += 1;
        debug!(
            task_token = %task.task_token,
            identity = %request.identity,
            events = task.events.len(),
            "Handing out decision task"
        );

        inner.open.insert(
            task.task_token.clone(),
            OpenTask {
                workflow_execution: task.workflow_execution.clone(),
                events: task.events,
            },
        );
        Ok(Some(DecisionTask {
            task_token: task.task_token,
            workflow_execution: task.workflow_execution,
            workflow_type: task.workflow_type,
            page,
        }))
    }

    async fn next_history_page(
        &self,
        request: &PollRequest,
        next_page_token: &str,
    ) -> Result<HistoryPage, ServiceError> {
        let invalid = || ServiceError::InvalidPageToken(next_page_token.to_string());
        let (task_token, offset) = next_page_token.rsplit_once(':').ok_or_else(invalid)?;
        let offset: usize = offset.parse().map_err(|_| invalid())?;

        let size = self.page_size(request);
        let mut inner = self.inner.lock();
        let page = {
            let task = inner.open.get(task_token).ok_or_else(invalid)?;
            if offset >= task.events.len() {
                return Err(invalid());
            }
            page_at(task_token, &task.events, offset, size)
        };
        inner.pages_served += 1;
        Ok(page)
    }

    async fn respond_decision_task_completed(
        &self,
        task_token: &str,
        decisions: Vec<Decision>,
    ) -> Result<(), ServiceError> {
        let mut inner = self.inner.lock();
        let task = inner
            .open
            .remove(task_token)
            .ok_or_else(|| ServiceError::UnknownTaskToken(task_token.to_string()))?;

        debug!(
            task_token,
            decisions = decisions.len(),
            "Decision task completed"
        );
        inner.submissions.push(Submission {
            task_token: task_token.to_string(),
            workflow_execution: task.workflow_execution,
            decisions,
            submitted_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use replayflow_decider::EventKind;
    use serde_json::json;

    fn request(page_size: usize) -> PollRequest {
        PollRequest {
            domain: "test".into(),
            task_list: "deciders".into(),
            identity: "poller-1".into(),
            maximum_page_size: page_size,
        }
    }

    fn history(len: i64) -> Vec<RawHistoryEvent> {
        (1..=len)
            .map(|id| {
                RawHistoryEvent::new(
                    id,
                    Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
                    EventKind::DecisionTaskScheduled,
                    json!({}),
                )
            })
            .collect()
    }

    fn ids(page: &HistoryPage) -> Vec<i64> {
        page.events.iter().map(|e| e.event_id).collect()
    }

    #[tokio::test]
    async fn test_pages_newest_first() {
        let service = InMemoryDecisionService::new();
        service.enqueue(
            WorkflowType::new("T", "1"),
            WorkflowExecution::new("wf", "run"),
            history(5),
        );

        let task = service
            .poll_for_decision_task(&request(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ids(&task.page), vec![5, 4]);

        let token = task.page.next_page_token.unwrap();
        let second = service.next_history_page(&request(2), &token).await.unwrap();
        assert_eq!(ids(&second), vec![3, 2]);

        let token = second.next_page_token.unwrap();
        let last = service.next_history_page(&request(2), &token).await.unwrap();
        assert_eq!(ids(&last), vec![1]);
        assert!(last.next_page_token.is_none());
        assert_eq!(service.pages_served(), 3);
    }

    #[tokio::test]
    async fn test_page_size_cap() {
        let service = InMemoryDecisionService::new().with_page_size(3);
        service.enqueue(
            WorkflowType::new("T", "1"),
            WorkflowExecution::new("wf", "run"),
            history(10),
        );

        let task = service
            .poll_for_decision_task(&request(100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.page.events.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_poll_and_bad_tokens() {
        let service = InMemoryDecisionService::new();
        assert!(service
            .poll_for_decision_task(&request(10))
            .await
            .unwrap()
            .is_none());

        assert!(matches!(
            service.next_history_page(&request(10), "garbage").await,
            Err(ServiceError::InvalidPageToken(_))
        ));
        assert!(matches!(
            service
                .respond_decision_task_completed("task-missing", Vec::new())
                .await,
            Err(ServiceError::UnknownTaskToken(_))
        ));
    }

    #[tokio::test]
    async fn test_submission_is_recorded_once() {
        let service = InMemoryDecisionService::new();
        let token = service.enqueue(
            WorkflowType::new("T", "1"),
            WorkflowExecution::new("wf", "run"),
            history(1),
        );
        service.poll_for_decision_task(&request(10)).await.unwrap();

        service
            .respond_decision_task_completed(&token, vec![Decision::complete("ok")])
            .await
            .unwrap();
        assert!(service
            .respond_decision_task_completed(&token, Vec::new())
            .await
            .is_err());

        let submissions = service.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].workflow_execution.workflow_id, "wf");
        assert_eq!(submissions[0].decisions, vec![Decision::complete("ok")]);
    }

    #[test]
    fn test_enqueue_json() {
        let service = InMemoryDecisionService::new();
        let result = service.enqueue_json(
            WorkflowType::new("T", "1"),
            WorkflowExecution::new("wf", "run"),
            json!([{
                "eventId": 1,
                "eventTimestamp": 1700000000,
                "eventType": "WorkflowExecutionStarted",
                "workflowExecutionStartedEventAttributes": { "input": "" }
            }]),
        );
        assert!(result.is_ok());
        assert_eq!(service.pending(), 1);

        let invalid = service.enqueue_json(
            WorkflowType::new("T", "1"),
            WorkflowExecution::new("wf", "run"),
            json!({ "not": "a list" }),
        );
        assert!(matches!(invalid, Err(ServiceError::Serialization(_))));
    }
}
