//! Integration tests for the workflow engine, using purpose-built test
//! tools against an in-memory store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use trellis_engine::{
  EngineConfig, ExecuteOptions, ExecutionEvent, RecoveryCoordinator, WorkflowEngine,
  WorkflowSubmission, signature_hash,
};
use trellis_store::{ExecutionStatus, Json, NodeRecord, SqliteStore, Store, WorkflowRecord};
use trellis_tool::{
  Tool, ToolCategory, ToolContract, ToolError, ToolInputs, ToolOutputs,
};
use trellis_tool_registry::{ToolRegistry, ToolRegistryBuilder};
use trellis_workflow::{Edge, NodeSpec, WorkflowSpec};

// ---------------------------------------------------------------------------
// Test tools
// ---------------------------------------------------------------------------

/// Returns its inputs verbatim.
struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
  fn contract(&self) -> ToolContract {
    ToolContract::new("echo", "returns its inputs verbatim", ToolCategory::Utility)
  }

  async fn execute(
    &self,
    inputs: ToolInputs,
    _cancel: CancellationToken,
  ) -> Result<ToolOutputs, ToolError> {
    Ok(inputs)
  }
}

/// Produces a fixed identifier.
struct MakeIdTool;

#[async_trait]
impl Tool for MakeIdTool {
  fn contract(&self) -> ToolContract {
    let mut contract = ToolContract::new("make_id", "produces an id", ToolCategory::Utility);
    contract.output_schema = json!({
      "type": "object",
      "properties": { "id": { "type": "string" } },
      "required": ["id"]
    });
    contract
  }

  async fn execute(
    &self,
    _inputs: ToolInputs,
    _cancel: CancellationToken,
  ) -> Result<ToolOutputs, ToolError> {
    let mut outputs = ToolOutputs::new();
    outputs.insert("id".to_owned(), json!("X"));
    Ok(outputs)
  }
}

/// Fails with a fixed message after a short delay.
struct FailingTool {
  delay: Duration,
}

#[async_trait]
impl Tool for FailingTool {
  fn contract(&self) -> ToolContract {
    ToolContract::new("fail", "always fails", ToolCategory::Utility)
  }

  async fn execute(
    &self,
    _inputs: ToolInputs,
    _cancel: CancellationToken,
  ) -> Result<ToolOutputs, ToolError> {
    tokio::time::sleep(self.delay).await;
    Err(ToolError::execution("boom"))
  }
}

/// Sleeps for a long time, honouring cancellation.
struct SleepyTool {
  duration: Duration,
}

#[async_trait]
impl Tool for SleepyTool {
  fn contract(&self) -> ToolContract {
    ToolContract::new("sleepy", "sleeps unless cancelled", ToolCategory::Utility)
  }

  async fn execute(
    &self,
    inputs: ToolInputs,
    cancel: CancellationToken,
  ) -> Result<ToolOutputs, ToolError> {
    tokio::select! {
      _ = cancel.cancelled() => Err(ToolError::Cancelled),
      _ = tokio::time::sleep(self.duration) => Ok(inputs),
    }
  }
}

/// Returns a shape that violates its own output schema.
struct BadOutputTool;

#[async_trait]
impl Tool for BadOutputTool {
  fn contract(&self) -> ToolContract {
    let mut contract = ToolContract::new("bad_output", "lies about its outputs", ToolCategory::Utility);
    contract.output_schema = json!({
      "type": "object",
      "properties": { "id": { "type": "string" } },
      "required": ["id"]
    });
    contract
  }

  async fn execute(
    &self,
    _inputs: ToolInputs,
    _cancel: CancellationToken,
  ) -> Result<ToolOutputs, ToolError> {
    let mut outputs = ToolOutputs::new();
    outputs.insert("wrong".to_owned(), json!(1));
    Ok(outputs)
  }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn default_registry() -> ToolRegistry {
  ToolRegistryBuilder::new()
    .tool(Arc::new(EchoTool))
    .tool(Arc::new(MakeIdTool))
    .tool(Arc::new(FailingTool {
      delay: Duration::from_millis(10),
    }))
    .tool(Arc::new(SleepyTool {
      duration: Duration::from_secs(10),
    }))
    .tool(Arc::new(BadOutputTool))
    .build()
    .expect("registry builds")
}

async fn engine() -> (Arc<SqliteStore>, WorkflowEngine<SqliteStore>) {
  let store = Arc::new(SqliteStore::in_memory().await.expect("open in-memory db"));
  store.migrate().await.expect("run migrations");
  let engine = WorkflowEngine::new(
    Arc::new(default_registry()),
    store.clone(),
    EngineConfig::default(),
  );
  (store, engine)
}

async fn collect(mut submission: WorkflowSubmission) -> Vec<ExecutionEvent> {
  let mut events = Vec::new();
  while let Some(event) = submission.events.recv().await {
    events.push(event);
  }
  events
}

fn node(id: &str, tool: &str) -> NodeSpec {
  NodeSpec {
    node_id: id.to_owned(),
    tool: tool.to_owned(),
    literal_inputs: serde_json::Map::new(),
    input_mappings: HashMap::new(),
  }
}

fn node_with_inputs(id: &str, tool: &str, inputs: serde_json::Value) -> NodeSpec {
  NodeSpec {
    literal_inputs: inputs.as_object().expect("object literal").clone(),
    ..node(id, tool)
  }
}

fn edge(from: &str, to: &str) -> Edge {
  Edge {
    from: from.to_owned(),
    to: to.to_owned(),
  }
}

fn completed_index(events: &[ExecutionEvent], node_id: &str) -> usize {
  events
    .iter()
    .position(
      |e| matches!(e, ExecutionEvent::NodeCompleted { node_id: id, .. } if id == node_id),
    )
    .unwrap_or_else(|| panic!("no node_completed for {node_id}"))
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn trivial_single_node_success() {
  let (store, engine) = engine().await;

  let spec = WorkflowSpec {
    nodes: vec![node_with_inputs("n1", "echo", json!({ "a": 1 }))],
    edges: vec![],
  };
  let submission = engine.submit(spec, ExecuteOptions::default());
  let workflow_id = submission.workflow_id.clone();
  let events = collect(submission).await;

  assert!(matches!(
    events.first(),
    Some(ExecutionEvent::Start { total_nodes: 1, .. })
  ));
  assert!(matches!(events.last(), Some(ExecutionEvent::Complete)));

  let completed = events
    .iter()
    .find_map(|e| match e {
      ExecutionEvent::NodeCompleted {
        node_id,
        progress,
        outputs,
      } if node_id == "n1" => Some((*progress, outputs.clone())),
      _ => None,
    })
    .expect("n1 completed");
  assert_eq!(completed.0, 1.0);
  assert_eq!(serde_json::Value::Object(completed.1), json!({ "a": 1 }));

  let results = events
    .iter()
    .find_map(|e| match e {
      ExecutionEvent::WorkflowCompleted { results, .. } => Some(results.clone()),
      _ => None,
    })
    .expect("workflow completed");
  assert_eq!(
    serde_json::Value::Object(results),
    json!({ "n1": { "a": 1 } })
  );

  let record = store.get_workflow(&workflow_id).await.unwrap().unwrap();
  assert_eq!(record.status, ExecutionStatus::Completed);
  assert_eq!(record.progress, 1.0);
  assert!(record.completed_at.is_some());

  let nodes = store.list_nodes(&workflow_id).await.unwrap();
  assert_eq!(nodes.len(), 1);
  assert_eq!(nodes[0].status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn diamond_orders_batches_and_counts_events() {
  let (_store, engine) = engine().await;

  let spec = WorkflowSpec {
    nodes: vec![
      node("root", "echo"),
      node("left", "echo"),
      node("right", "echo"),
      node("sink", "echo"),
    ],
    edges: vec![
      edge("root", "left"),
      edge("root", "right"),
      edge("left", "sink"),
      edge("right", "sink"),
    ],
  };
  let events = collect(engine.submit(spec, ExecuteOptions::default())).await;

  // Exactly one start and one complete; every node completed.
  assert_eq!(
    events.iter().filter(|e| matches!(e, ExecutionEvent::Start { .. })).count(),
    1
  );
  assert_eq!(
    events.iter().filter(|e| matches!(e, ExecutionEvent::Complete)).count(),
    1
  );
  assert_eq!(
    events
      .iter()
      .filter(|e| matches!(e, ExecutionEvent::NodeCompleted { .. }))
      .count(),
    4
  );
  assert!(events.iter().any(|e| matches!(e, ExecutionEvent::WorkflowCompleted { .. })));

  // root before both middles, both middles before sink; middles unordered.
  let root = completed_index(&events, "root");
  let left = completed_index(&events, "left");
  let right = completed_index(&events, "right");
  let sink = completed_index(&events, "sink");
  assert!(root < left && root < right);
  assert!(left < sink && right < sink);

  // progress is monotonically non-decreasing.
  let progresses: Vec<f64> = events
    .iter()
    .filter_map(|e| match e {
      ExecutionEvent::NodeCompleted { progress, .. } => Some(*progress),
      _ => None,
    })
    .collect();
  assert!(progresses.windows(2).all(|w| w[0] <= w[1]));
  assert_eq!(progresses.last(), Some(&1.0));
}

#[tokio::test]
async fn mapping_wires_upstream_output_into_downstream_input() {
  let (store, engine) = engine().await;

  let mut consumer = node("b", "echo");
  consumer
    .input_mappings
    .insert("a.id".to_owned(), "ref".to_owned());

  let spec = WorkflowSpec {
    nodes: vec![node("a", "make_id"), consumer],
    edges: vec![],
  };
  let submission = engine.submit(spec, ExecuteOptions::default());
  let workflow_id = submission.workflow_id.clone();
  let events = collect(submission).await;

  // b's tool received exactly what a emitted.
  let outputs = events
    .iter()
    .find_map(|e| match e {
      ExecutionEvent::NodeCompleted { node_id, outputs, .. } if node_id == "b" => {
        Some(outputs.clone())
      }
      _ => None,
    })
    .expect("b completed");
  assert_eq!(serde_json::Value::Object(outputs), json!({ "ref": "X" }));

  let nodes = store.list_nodes(&workflow_id).await.unwrap();
  let b_row = nodes.iter().find(|n| n.node_id == "b").unwrap();
  assert_eq!(b_row.resolved_inputs.0, json!({ "ref": "X" }));
}

#[tokio::test]
async fn cycle_is_rejected_without_persisting() {
  let (store, engine) = engine().await;

  let spec = WorkflowSpec {
    nodes: vec![node("x", "echo"), node("y", "echo")],
    edges: vec![edge("x", "y"), edge("y", "x")],
  };
  let submission = engine.submit(spec, ExecuteOptions::default());
  let workflow_id = submission.workflow_id.clone();
  let events = collect(submission).await;

  assert_eq!(events.len(), 2);
  assert!(matches!(
    &events[0],
    ExecutionEvent::WorkflowFailed { error, .. } if error.contains("cycle")
  ));
  assert!(matches!(events[1], ExecutionEvent::Complete));

  assert!(store.get_workflow(&workflow_id).await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_tool_is_rejected_without_persisting() {
  let (store, engine) = engine().await;

  let spec = WorkflowSpec {
    nodes: vec![node("n1", "ghost")],
    edges: vec![],
  };
  let submission = engine.submit(spec, ExecuteOptions::default());
  let workflow_id = submission.workflow_id.clone();
  let events = collect(submission).await;

  assert!(matches!(
    &events[0],
    ExecutionEvent::WorkflowFailed { error, .. } if error.contains("unknown tool")
  ));
  assert!(store.get_workflow(&workflow_id).await.unwrap().is_none());
}

#[tokio::test]
async fn first_fatal_failure_cancels_running_siblings() {
  let (store, engine) = engine().await;

  // p and r sleep for 10s honouring cancellation; q fails after 10ms.
  let spec = WorkflowSpec {
    nodes: vec![node("p", "sleepy"), node("q", "fail"), node("r", "sleepy")],
    edges: vec![],
  };

  let started = Instant::now();
  let submission = engine.submit(spec, ExecuteOptions::default());
  let workflow_id = submission.workflow_id.clone();
  let events = collect(submission).await;
  let elapsed = started.elapsed();

  // Far below the sleepers' duration: cancellation was prompt.
  assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");

  let failed: Vec<&str> = events
    .iter()
    .filter_map(|e| match e {
      ExecutionEvent::NodeFailed { node_id, .. } => Some(node_id.as_str()),
      _ => None,
    })
    .collect();
  assert_eq!(failed, vec!["q"]);

  assert!(matches!(
    events[events.len() - 2],
    ExecutionEvent::WorkflowFailed { .. }
  ));
  assert!(matches!(events[events.len() - 1], ExecutionEvent::Complete));

  // Siblings finalised as FAILED with the distinguished cancellation error.
  let nodes = store.list_nodes(&workflow_id).await.unwrap();
  assert_eq!(nodes.len(), 3);
  for sibling in ["p", "r"] {
    let row = nodes.iter().find(|n| n.node_id == sibling).unwrap();
    assert_eq!(row.status, ExecutionStatus::Failed);
    assert_eq!(row.error_message.as_deref(), Some("cancelled"));
  }
  let q_row = nodes.iter().find(|n| n.node_id == "q").unwrap();
  assert_eq!(q_row.status, ExecutionStatus::Failed);
  assert_eq!(q_row.error_message.as_deref(), Some("boom"));

  let record = store.get_workflow(&workflow_id).await.unwrap().unwrap();
  assert_eq!(record.status, ExecutionStatus::Failed);
  assert!(record.error_message.unwrap().contains("q"));
}

#[tokio::test]
async fn failure_in_early_batch_skips_later_batches() {
  let (store, engine) = engine().await;

  let spec = WorkflowSpec {
    nodes: vec![node("a", "fail"), node("b", "echo")],
    edges: vec![edge("a", "b")],
  };
  let submission = engine.submit(spec, ExecuteOptions::default());
  let workflow_id = submission.workflow_id.clone();
  let events = collect(submission).await;

  assert!(!events
    .iter()
    .any(|e| matches!(e, ExecutionEvent::NodeCompleted { .. })));

  // b was never dispatched, so it has no row.
  let nodes = store.list_nodes(&workflow_id).await.unwrap();
  assert_eq!(nodes.len(), 1);
  assert_eq!(nodes[0].node_id, "a");
}

#[tokio::test]
async fn unresolved_input_fails_the_node() {
  let (store, engine) = engine().await;

  let mut consumer = node("b", "echo");
  consumer
    .input_mappings
    .insert("a.missing".to_owned(), "ref".to_owned());

  let spec = WorkflowSpec {
    nodes: vec![node_with_inputs("a", "echo", json!({ "present": true })), consumer],
    edges: vec![],
  };
  let submission = engine.submit(spec, ExecuteOptions::default());
  let workflow_id = submission.workflow_id.clone();
  let events = collect(submission).await;

  assert!(events.iter().any(|e| matches!(
    e,
    ExecutionEvent::NodeFailed { node_id, error } if node_id == "b" && error.contains("unresolved")
  )));

  let nodes = store.list_nodes(&workflow_id).await.unwrap();
  let b_row = nodes.iter().find(|n| n.node_id == "b").unwrap();
  assert_eq!(b_row.status, ExecutionStatus::Failed);
  assert!(b_row.error_message.as_deref().unwrap().contains("a.missing"));
}

#[tokio::test]
async fn output_schema_violation_converts_success_into_failure() {
  let (store, engine) = engine().await;

  let spec = WorkflowSpec {
    nodes: vec![node("n1", "bad_output")],
    edges: vec![],
  };
  let submission = engine.submit(spec, ExecuteOptions::default());
  let workflow_id = submission.workflow_id.clone();
  let events = collect(submission).await;

  assert!(events.iter().any(|e| matches!(
    e,
    ExecutionEvent::NodeFailed { node_id, error } if node_id == "n1" && error.contains("output schema")
  )));

  let nodes = store.list_nodes(&workflow_id).await.unwrap();
  assert_eq!(nodes[0].status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn empty_workflow_completes_immediately() {
  let (store, engine) = engine().await;

  let spec = WorkflowSpec {
    nodes: vec![],
    edges: vec![],
  };
  let submission = engine.submit(spec, ExecuteOptions::default());
  let workflow_id = submission.workflow_id.clone();
  let events = collect(submission).await;

  assert!(matches!(
    events.first(),
    Some(ExecutionEvent::Start { total_nodes: 0, .. })
  ));
  assert!(events.iter().any(|e| matches!(
    e,
    ExecutionEvent::WorkflowCompleted { results, .. } if results.is_empty()
  )));

  let record = store.get_workflow(&workflow_id).await.unwrap().unwrap();
  assert_eq!(record.status, ExecutionStatus::Completed);
  assert_eq!(record.progress, 1.0);
}

#[tokio::test]
async fn external_cancellation_fails_the_workflow() {
  let (store, engine) = engine().await;

  let spec = WorkflowSpec {
    nodes: vec![node("slow", "sleepy")],
    edges: vec![],
  };
  let submission = engine.submit(spec, ExecuteOptions::default());
  let workflow_id = submission.workflow_id.clone();
  let cancel = submission.cancel.clone();

  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
  });

  let started = Instant::now();
  let events = collect(submission).await;
  assert!(started.elapsed() < Duration::from_secs(5));

  assert!(events.iter().any(|e| matches!(
    e,
    ExecutionEvent::WorkflowFailed { error, .. } if error == "cancelled"
  )));

  let record = store.get_workflow(&workflow_id).await.unwrap().unwrap();
  assert_eq!(record.status, ExecutionStatus::Failed);
  assert_eq!(record.error_message.as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn deadline_behaves_like_cancellation() {
  let (store, engine) = engine().await;

  let spec = WorkflowSpec {
    nodes: vec![node("slow", "sleepy")],
    edges: vec![],
  };
  let options = ExecuteOptions {
    deadline: Some(Duration::from_millis(30)),
    ..Default::default()
  };
  let submission = engine.submit(spec, options);
  let workflow_id = submission.workflow_id.clone();

  let started = Instant::now();
  let events = collect(submission).await;
  assert!(started.elapsed() < Duration::from_secs(5));

  assert!(events.iter().any(|e| matches!(
    e,
    ExecutionEvent::WorkflowFailed { error, .. } if error == "cancelled"
  )));
  let record = store.get_workflow(&workflow_id).await.unwrap().unwrap();
  assert_eq!(record.status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn node_failure_records_an_error_signature() {
  let (store, engine) = engine().await;

  let spec = WorkflowSpec {
    nodes: vec![node("n1", "fail")],
    edges: vec![],
  };
  collect(engine.submit(spec, ExecuteOptions::default())).await;

  let hash = signature_hash("execution", "fail", "boom");
  let signature = store.get_error_signature(&hash).await.unwrap().unwrap();
  assert_eq!(signature.occurrence_count, 1);
  assert_eq!(signature.tool_name, "fail");
  assert_eq!(signature.error_message, "boom");
}

#[tokio::test]
async fn bounded_worker_pool_still_completes_every_node() {
  let store = Arc::new(SqliteStore::in_memory().await.unwrap());
  store.migrate().await.unwrap();
  let engine = WorkflowEngine::new(
    Arc::new(default_registry()),
    store.clone(),
    EngineConfig {
      max_concurrent_nodes: Some(1),
      ..Default::default()
    },
  );

  let spec = WorkflowSpec {
    nodes: vec![node("a", "echo"), node("b", "echo"), node("c", "echo")],
    edges: vec![],
  };
  let events = collect(engine.submit(spec, ExecuteOptions::default())).await;

  assert_eq!(
    events
      .iter()
      .filter(|e| matches!(e, ExecutionEvent::NodeCompleted { .. }))
      .count(),
    3
  );
  assert!(events.iter().any(|e| matches!(e, ExecutionEvent::WorkflowCompleted { .. })));
}

#[tokio::test]
async fn restart_recovery_marks_rows_pending_and_starts_nothing() {
  let store = Arc::new(SqliteStore::in_memory().await.unwrap());
  store.migrate().await.unwrap();

  // Simulate a prior process dying mid-run.
  let spec = WorkflowSpec {
    nodes: vec![node("n1", "echo"), node("n2", "echo")],
    edges: vec![],
  };
  let workflow = WorkflowRecord {
    status: ExecutionStatus::Running,
    ..WorkflowRecord::pending("wf-crashed".to_owned(), spec, chrono::Utc::now())
  };
  store.create_workflow(&workflow).await.unwrap();
  for node_id in ["n1", "n2"] {
    store
      .create_node(&NodeRecord {
        id: format!("row-{node_id}"),
        workflow_id: "wf-crashed".to_owned(),
        node_id: node_id.to_owned(),
        tool: "echo".to_owned(),
        resolved_inputs: Json(json!({})),
        outputs: None,
        status: ExecutionStatus::Running,
        retry_count: 0,
        created_at: chrono::Utc::now(),
        started_at: Some(chrono::Utc::now()),
        completed_at: None,
        error_message: None,
        isolation_handle: None,
      })
      .await
      .unwrap();
  }

  let coordinator = RecoveryCoordinator::new(store.clone());
  let recovered = coordinator.recover().await.unwrap();
  assert_eq!(recovered.workflow_ids, vec!["wf-crashed"]);
  assert_eq!(recovered.node_ids.len(), 2);

  let record = store.get_workflow("wf-crashed").await.unwrap().unwrap();
  assert_eq!(record.status, ExecutionStatus::Pending);
  assert_eq!(
    record.error_message.as_deref(),
    Some("interrupted by restart")
  );
  for row in store.list_nodes("wf-crashed").await.unwrap() {
    assert_eq!(row.status, ExecutionStatus::Pending);
    assert_eq!(row.error_message.as_deref(), Some("interrupted by restart"));
  }

  // Pessimistic resume: nothing was re-submitted, rows stay PENDING.
  let record = store.get_workflow("wf-crashed").await.unwrap().unwrap();
  assert_eq!(record.status, ExecutionStatus::Pending);
}
