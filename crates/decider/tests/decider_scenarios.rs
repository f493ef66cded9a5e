//! End-to-end decision scenarios replayed against fabricated histories

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{decide, decide_paged, step, timer_delay, types, HistoryBuilder};
use replayflow_decider::prelude::*;
use replayflow_decider::CHECKPOINT_MARKER;

fn fetch() -> Action {
    Action::activity("fetch", ActivityType::new("Fetch", "1.0"))
}

fn activity(id: &str) -> Action {
    Action::activity(id, ActivityType::new("Work", "1.0"))
}

fn workflow(builder: DependencyGraphBuilder) -> Arc<dyn Workflow> {
    Arc::new(GraphWorkflow::new(
        WorkflowType::new("Scenario", "1.0"),
        builder.build().expect("graph should build"),
    ))
}

fn single(action: Action) -> Arc<dyn Workflow> {
    let mut builder = DependencyGraph::builder();
    builder.add(action, &[]).expect("should add");
    workflow(builder)
}

fn split_join() -> Arc<dyn Workflow> {
    let mut builder = DependencyGraph::builder();
    builder
        .add(activity("a"), &[])
        .unwrap()
        .add(activity("b"), &[])
        .unwrap()
        .add(activity("c"), &["a", "b"])
        .unwrap();
    workflow(builder)
}

// =============================================================================
// Replay properties
// =============================================================================

#[test_log::test]
fn test_reingesting_history_changes_nothing() {
    let workflow = split_join();
    let mut history = HistoryBuilder::started("{}");
    step(&workflow, &mut history);
    history.activity_completed("a", "A");

    let mut decider = Decider::new(Arc::clone(&workflow));
    let first = decider.ingest(&history.events()).unwrap();
    let before = decider.decide();

    assert_eq!(decider.ingest(&history.events()).unwrap(), 0);
    for page in history.pages(3) {
        assert_eq!(decider.ingest(&page).unwrap(), 0);
    }

    assert_eq!(decider.history().len(), first);
    assert_eq!(decider.decide(), before);
}

#[test_log::test]
fn test_decide_is_deterministic() {
    let workflow = split_join();
    let mut history = HistoryBuilder::started("{}");
    step(&workflow, &mut history);
    history.activity_completed("b", "B");

    let mut paged = Decider::new(Arc::clone(&workflow));
    for page in history.pages(2) {
        paged.ingest(&page).unwrap();
    }
    let whole = decide(&workflow, &history);

    assert_eq!(paged.decide(), paged.decide());
    assert_eq!(paged.decide(), whole);
}

// =============================================================================
// Graph definition
// =============================================================================

#[test]
fn test_three_node_cycle_is_reported() {
    let mut builder = DependencyGraph::builder();
    builder
        .add(activity("A"), &["C"])
        .unwrap()
        .add(activity("B"), &["A"])
        .unwrap()
        .add(activity("C"), &["B"])
        .unwrap();

    match builder.build() {
        Err(GraphError::Cycles(cycles)) => {
            assert_eq!(cycles.len(), 1);
            let mut members = cycles[0].clone();
            members.sort();
            assert_eq!(members, vec!["A", "B", "C"]);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn test_self_cycle_is_reported() {
    let mut builder = DependencyGraph::builder();
    builder.add(activity("A"), &["A"]).unwrap();

    match builder.build() {
        Err(GraphError::Cycles(cycles)) => assert_eq!(cycles, vec![vec!["A".to_string()]]),
        other => panic!("expected a self cycle, got {other:?}"),
    }
}

// =============================================================================
// Dependencies
// =============================================================================

#[test_log::test]
fn test_join_waits_for_every_parent() {
    let workflow = split_join();
    let mut history = HistoryBuilder::started("{}");

    let first = step(&workflow, &mut history);
    assert_eq!(types(&first), vec!["ScheduleActivityTask"; 2]);

    history.activity_completed("a", "A");
    assert!(step(&workflow, &mut history).is_empty());

    history.activity_completed("b", "B");
    let decisions = step(&workflow, &mut history);
    assert_eq!(decisions.len(), 1);
    assert!(matches!(
        &decisions[0],
        Decision::ScheduleActivityTask { activity_id, .. } if activity_id == "c"
    ));

    history.activity_completed("c", "C");
    assert_eq!(
        decide(&workflow, &history),
        vec![Decision::CompleteWorkflowExecution { result: None }]
    );
}

#[test_log::test]
fn test_inputs_flow_from_workflow_and_parents() {
    let mut builder = DependencyGraph::builder();
    builder
        .add(fetch().with_input(InputSource::WorkflowInput), &[])
        .unwrap()
        .add(
            activity("store").with_input(InputSource::output_of("fetch")),
            &["fetch"],
        )
        .unwrap();
    let workflow = workflow(builder);
    let mut history = HistoryBuilder::started("order-7");

    let first = step(&workflow, &mut history);
    assert!(matches!(
        &first[..],
        [Decision::ScheduleActivityTask { input, .. }] if input == "order-7"
    ));

    history.activity_completed("fetch", "payload");
    let second = step(&workflow, &mut history);
    assert!(matches!(
        &second[..],
        [Decision::ScheduleActivityTask { activity_id, input, .. }]
            if activity_id == "store" && input == "payload"
    ));
}

#[test_log::test]
fn test_failed_parent_blocks_or_releases_child() {
    let build = |child_fails_workflow: bool| {
        let mut builder = DependencyGraph::builder();
        builder
            .add(fetch().fail_workflow_on_error(false), &[])
            .unwrap()
            .add(
                activity("fallback")
                    .with_input(InputSource::output_of("fetch"))
                    .fail_workflow_on_error(child_fails_workflow),
                &["fetch"],
            )
            .unwrap();
        workflow(builder)
    };

    let strict = build(true);
    let mut history = HistoryBuilder::started("");
    step(&strict, &mut history);
    history.activity_failed("fetch", "boom", "");
    // the child can never run and nothing else is pending
    assert_eq!(
        decide(&strict, &history),
        vec![Decision::CompleteWorkflowExecution { result: None }]
    );

    let lenient = build(false);
    let mut history = HistoryBuilder::started("");
    step(&lenient, &mut history);
    history.activity_failed("fetch", "boom", "");
    let decisions = decide(&lenient, &history);
    assert!(matches!(
        &decisions[..],
        [Decision::ScheduleActivityTask { activity_id, input, .. }]
            if activity_id == "fallback" && input.is_empty()
    ));
}

// =============================================================================
// Failures and retries
// =============================================================================

#[test_log::test]
fn test_unit_failure_fails_workflow() {
    let workflow = single(fetch());
    let mut history = HistoryBuilder::started("");
    step(&workflow, &mut history);
    history.activity_timed_out("fetch", "START_TO_CLOSE");

    assert_eq!(
        decide(&workflow, &history),
        vec![Decision::fail("fetch: START_TO_CLOSE", "")]
    );
}

#[test_log::test]
fn test_retry_backoff_schedule() {
    let workflow = single(
        fetch().with_retry(
            RetryPolicy::exponential()
                .with_initial_interval(Duration::from_secs(5))
                .with_maximum_interval(Duration::from_secs(60)),
        ),
    );
    let mut history = HistoryBuilder::started("");
    step(&workflow, &mut history);

    let mut delays = Vec::new();
    for _ in 0..6 {
        history.activity_failed("fetch", "boom", "");
        let decisions = step(&workflow, &mut history);
        let delay = timer_delay(&decisions).expect("should start a retry timer");
        delays.push(delay);

        history.advance(delay as i64).timer_fired("fetch");
        let retried = step(&workflow, &mut history);
        assert_eq!(types(&retried), vec!["ScheduleActivityTask"]);
    }

    // first failure waits the initial interval; retries 1..5 then back off
    assert_eq!(delays, vec![5, 5, 10, 20, 40, 60]);

    history.activity_completed("fetch", "done");
    assert_eq!(
        decide(&workflow, &history),
        vec![Decision::CompleteWorkflowExecution { result: None }]
    );
}

#[test_log::test]
fn test_retry_stops_at_expiration() {
    let workflow = single(
        fetch().with_retry(
            RetryPolicy::exponential()
                .with_initial_interval(Duration::from_secs(5))
                .with_expiration_interval(Duration::from_secs(30)),
        ),
    );
    let mut history = HistoryBuilder::started("");
    step(&workflow, &mut history);

    // t=0: first retry timer, 5s
    history.activity_failed("fetch", "boom", "trace");
    assert_eq!(timer_delay(&step(&workflow, &mut history)), Some(5));
    history.advance(5).timer_fired("fetch");
    step(&workflow, &mut history);

    // t=6: 6s elapsed + 5s
    history.advance(1).activity_failed("fetch", "boom", "trace");
    assert_eq!(timer_delay(&step(&workflow, &mut history)), Some(5));
    history.advance(5).timer_fired("fetch");
    step(&workflow, &mut history);

    // t=12: 12s elapsed + 10s
    history.advance(1).activity_failed("fetch", "boom", "trace");
    assert_eq!(timer_delay(&step(&workflow, &mut history)), Some(10));
    history.advance(10).timer_fired("fetch");
    step(&workflow, &mut history);

    // t=23: 23s elapsed + 20s exceeds 30s
    history.advance(1).activity_failed("fetch", "boom", "trace");
    assert_eq!(
        decide(&workflow, &history),
        vec![Decision::fail("fetch: boom", "trace")]
    );
}

#[test_log::test]
fn test_retry_respects_maximum_attempts() {
    let workflow = single(
        fetch()
            .with_retry(RetryPolicy::fixed(Duration::from_secs(2), 1))
            .fail_workflow_on_error(false),
    );
    let mut history = HistoryBuilder::started("");
    step(&workflow, &mut history);

    for expected in [Some(2), Some(2)] {
        history.activity_failed("fetch", "boom", "");
        assert_eq!(timer_delay(&step(&workflow, &mut history)), expected);
        history.advance(2).timer_fired("fetch");
        step(&workflow, &mut history);
    }

    // two retry timers exceed one attempt; tolerated failure ends the run
    history.activity_failed("fetch", "boom", "");
    assert_eq!(
        decide(&workflow, &history),
        vec![Decision::CompleteWorkflowExecution { result: None }]
    );
}

#[test_log::test]
fn test_critical_error_overrides_everything() {
    let workflow = split_join();
    let mut history = HistoryBuilder::started("");
    step(&workflow, &mut history);
    history
        .activity_completed("a", "A")
        .schedule_failed("b", "ACTIVITY_TYPE_DOES_NOT_EXIST");

    let decisions = decide(&workflow, &history);
    assert_eq!(decisions.len(), 1);
    match &decisions[0] {
        Decision::FailWorkflowExecution { reason, details } => {
            assert!(reason.contains("1 critical error"), "{reason}");
            assert!(details.contains("ACTIVITY_TYPE_DOES_NOT_EXIST"), "{details}");
        }
        other => panic!("unexpected decision {other:?}"),
    }
}

#[test_log::test]
fn test_child_failure_keeps_reason_and_details() {
    let workflow = single(Action::child_workflow(
        "child-1",
        WorkflowType::new("Child", "1"),
    ));
    let mut history = HistoryBuilder::started("");
    let first = step(&workflow, &mut history);
    assert_eq!(types(&first), vec!["StartChildWorkflowExecution"]);

    history.child_failed("child-1", "validation", "field `x` missing");
    assert_eq!(
        decide(&workflow, &history),
        vec![Decision::fail("child-1: validation", "field `x` missing")]
    );
}

// =============================================================================
// Other action kinds
// =============================================================================

#[test_log::test]
fn test_timer_signal_and_marker_actions() {
    let mut builder = DependencyGraph::builder();
    builder
        .add(Action::timer("cool-down", Duration::from_secs(30)), &[])
        .unwrap()
        .add(
            Action::signal("ready", "downstream-workflow")
                .with_input(InputSource::text("go")),
            &["cool-down"],
        )
        .unwrap()
        .add(
            Action::marker("audit").with_input(InputSource::text("signalled")),
            &["ready"],
        )
        .unwrap();
    let workflow = workflow(builder);
    let mut history = HistoryBuilder::started("");

    let first = step(&workflow, &mut history);
    assert_eq!(timer_delay(&first), Some(30));

    history.advance(30).timer_fired("cool-down");
    let second = step(&workflow, &mut history);
    assert!(matches!(
        &second[..],
        [Decision::SignalExternalWorkflowExecution { signal_name, workflow_id, input, .. }]
            if signal_name == "ready" && workflow_id == "downstream-workflow" && input == "go"
    ));

    history.signal_delivered("ready");
    let third = step(&workflow, &mut history);
    assert_eq!(third, vec![Decision::record_marker("audit", "signalled")]);

    // the marker is recorded by applying the decision; everything is done
    assert_eq!(
        decide(&workflow, &history),
        vec![Decision::CompleteWorkflowExecution { result: None }]
    );
}

#[test_log::test]
fn test_complete_on_success_carries_output() {
    let workflow = single(fetch().complete_workflow_on_success(true));
    let mut history = HistoryBuilder::started("");
    step(&workflow, &mut history);
    history.activity_completed("fetch", "{\"total\":3}");

    assert_eq!(
        decide(&workflow, &history),
        vec![Decision::complete("{\"total\":3}")]
    );
}

// =============================================================================
// Checkpoints
// =============================================================================

fn two_groups() -> Arc<dyn Workflow> {
    let mut builder = DependencyGraph::builder();
    builder
        .add(activity("extract"), &[])
        .unwrap()
        .group_and_parent(1, 0)
        .unwrap()
        .add(activity("load"), &[])
        .unwrap();
    workflow(builder)
}

#[test_log::test]
fn test_finished_group_records_checkpoint() {
    let workflow = two_groups();
    let mut history = HistoryBuilder::started("");

    assert_eq!(types(&step(&workflow, &mut history)), vec!["ScheduleActivityTask"]);
    history.activity_completed("extract", "rows");

    let decisions = step(&workflow, &mut history);
    assert_eq!(decisions.len(), 2);
    assert_eq!(decisions[0], Decision::record_marker(CHECKPOINT_MARKER, "1"));
    assert!(matches!(
        &decisions[1],
        Decision::ScheduleActivityTask { activity_id, .. } if activity_id == "load"
    ));
}

#[test_log::test]
fn test_checkpoint_stops_history_paging() {
    let workflow = two_groups();
    let mut history = HistoryBuilder::started("");
    step(&workflow, &mut history);
    history.activity_completed("extract", "rows");
    step(&workflow, &mut history);
    history.decision_task();

    let mut decider = Decider::new(Arc::clone(&workflow));
    let mut pages = 0;
    for page in history.pages(4) {
        decider.ingest(&page).unwrap();
        pages += 1;
        if !decider.is_more_history_required() {
            break;
        }
    }

    assert!(!decider.is_more_history_required());
    assert!(pages < history.pages(4).len());
    assert!(decider.history().workflow_input().is_none());
    assert_eq!(decider.context().checkpoint(), Some(1));
    assert_eq!(decider.context().state("load").unwrap(), ActionState::Active);
    assert!(decider.decide().is_empty());
}

#[test_log::test]
fn test_retry_after_checkpoint_reads_earlier_output() {
    let mut builder = DependencyGraph::builder();
    builder
        .add(activity("extract"), &[])
        .unwrap()
        .group_and_parent(1, 0)
        .unwrap()
        .add(
            activity("load")
                .with_input(InputSource::output_of("extract"))
                .with_retry(RetryPolicy::fixed(Duration::from_secs(2), 3)),
            &[],
        )
        .unwrap();
    let workflow = workflow(builder);

    let mut history = HistoryBuilder::started("");
    step(&workflow, &mut history);
    history.activity_completed("extract", "rows");
    step(&workflow, &mut history);
    history.activity_failed("load", "boom", "");
    assert_eq!(timer_delay(&step(&workflow, &mut history)), Some(2));
    history.advance(2).timer_fired("load");
    history.decision_task();

    let full = decide(&workflow, &history);
    assert!(matches!(
        &full[..],
        [Decision::ScheduleActivityTask { activity_id, input, .. }]
            if activity_id == "load" && input == "rows"
    ));

    let (paged, read) = decide_paged(&workflow, &history, 3);
    assert_eq!(paged, full);
    // paging ends once `extract` resolves, short of the start event
    assert!(read < history.pages(3).len());
}

#[test_log::test]
fn test_later_group_reads_run_input_past_checkpoint() {
    let mut builder = DependencyGraph::builder();
    builder
        .add(activity("a"), &[])
        .unwrap()
        .group_and_parent(1, 0)
        .unwrap()
        .add(activity("b"), &[])
        .unwrap()
        .group_and_parent(2, 1)
        .unwrap()
        .add(activity("c").with_input(InputSource::WorkflowInput), &[])
        .unwrap();
    let workflow = workflow(builder);

    let mut history = HistoryBuilder::started("IN");
    step(&workflow, &mut history);
    history.activity_completed("a", "A");
    step(&workflow, &mut history);
    history.activity_completed("b", "B");
    history.decision_task();

    let full = decide(&workflow, &history);
    assert_eq!(full[0], Decision::record_marker(CHECKPOINT_MARKER, "2"));
    assert!(matches!(
        &full[1..],
        [Decision::ScheduleActivityTask { activity_id, input, .. }]
            if activity_id == "c" && input == "IN"
    ));
    let (paged, read) = decide_paged(&workflow, &history, 3);
    assert_eq!(paged, full);
    assert_eq!(read, history.pages(3).len());

    // once `c` is running nothing before the last checkpoint is needed
    history.apply(&full);
    history.activity_completed("c", "C");
    history.decision_task();
    let (paged, read) = decide_paged(&workflow, &history, 3);
    assert_eq!(paged, decide(&workflow, &history));
    assert_eq!(paged, vec![Decision::CompleteWorkflowExecution { result: None }]);
    assert!(read < history.pages(3).len());
}

#[test_log::test]
fn test_checkpoint_signal_skips_groups() {
    let workflow = two_groups();
    let mut history = HistoryBuilder::started("");
    step(&workflow, &mut history);
    history.signal_received(CHECKPOINT_MARKER, "1");

    let decisions = decide(&workflow, &history);
    assert!(matches!(
        &decisions[..],
        [Decision::ScheduleActivityTask { activity_id, .. }] if activity_id == "load"
    ));
}

// =============================================================================
// Context queries and custom logic
// =============================================================================

struct Approval {
    graph: DependencyGraph,
}

impl Workflow for Approval {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::new("Approval", "1")
    }

    fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    fn decide(&self, ctx: &DecisionContext<'_>) -> anyhow::Result<Vec<Decision>> {
        let review = ctx.evaluate("review")?;
        match review.outcome {
            Outcome::Success(verdict) if verdict == "rejected" => {
                Ok(vec![Decision::fail("rejected", "")])
            }
            _ => Ok(ctx.decide_graph()?),
        }
    }
}

#[test_log::test]
fn test_custom_logic_uses_context() {
    let mut builder = DependencyGraph::builder();
    builder
        .add(activity("review"), &[])
        .unwrap()
        .add(activity("ship"), &["review"])
        .unwrap();
    let workflow: Arc<dyn Workflow> = Arc::new(Approval {
        graph: builder.build().unwrap(),
    });

    let mut history = HistoryBuilder::started("");
    step(&workflow, &mut history);
    history.activity_completed("review", "rejected");
    assert_eq!(
        decide(&workflow, &history),
        vec![Decision::fail("rejected", "")]
    );
}

#[test]
fn test_context_contract_violations() {
    let workflow = split_join();
    let history = HistoryBuilder::started("");
    let mut decider = Decider::new(Arc::clone(&workflow));
    decider.ingest(&history.events()).unwrap();
    let ctx = decider.context();

    assert!(matches!(
        ctx.output("a"),
        Err(DeciderError::OutputNotAvailable { state: ActionState::Initial, .. })
    ));
    assert!(matches!(
        ctx.evaluate("nope"),
        Err(DeciderError::UnregisteredAction(id)) if id == "nope"
    ));
    assert_eq!(ctx.outcome("a").unwrap(), Outcome::NotReady);
}
