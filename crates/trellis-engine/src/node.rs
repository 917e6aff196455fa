//! Single-node execution.
//!
//! A node runner resolves inputs from literals and upstream outputs,
//! persists the node execution row, invokes the tool racing the
//! cancellation token, validates outputs against the contract, and
//! finalises the row. It never retries; retry policy, if any, belongs to a
//! higher layer and produces a fresh row.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use trellis_store::{ExecutionStatus, Json, NodeRecord, Store};
use trellis_tool::{Tool, ToolContract, ToolError, ToolInputs, ToolOutputs, validate_instance};
use trellis_workflow::{NodeSpec, WorkflowSpec};

use crate::error::ExecutionError;

/// Everything a spawned node runner needs, prepared by the engine.
pub(crate) struct NodeRun<S> {
  pub store: Arc<S>,
  pub workflow_id: String,
  pub node: NodeSpec,
  pub tool: Arc<dyn Tool>,
  pub contract: ToolContract,
  /// Snapshot of the outputs of every upstream node this node maps from.
  pub upstream: HashMap<String, ToolOutputs>,
  pub cancel: CancellationToken,
  pub limiter: Option<Arc<tokio::sync::Semaphore>>,
}

/// What a node runner reports back to the engine.
pub(crate) struct NodeOutcome {
  pub node_id: String,
  pub result: Result<ToolOutputs, ExecutionError>,
}

/// Resolve a node's inputs: literals first, then every mapping
/// `"<upstream>.<field>" -> <local>` read from the upstream snapshot.
pub(crate) fn resolve_inputs(
  node: &NodeSpec,
  upstream: &HashMap<String, ToolOutputs>,
) -> Result<ToolInputs, ExecutionError> {
  let mut resolved = node.literal_inputs.clone();

  for (reference, local) in &node.input_mappings {
    let unresolved = || ExecutionError::UnresolvedInput {
      node_id: node.node_id.clone(),
      reference: reference.clone(),
    };

    let (upstream_id, field) = WorkflowSpec::split_mapping_key(reference).ok_or_else(unresolved)?;
    let outputs = upstream.get(upstream_id).ok_or_else(unresolved)?;
    let value = outputs.get(field).ok_or_else(unresolved)?;
    resolved.insert(local.clone(), value.clone());
  }

  Ok(resolved)
}

pub(crate) async fn run_node<S: Store>(run: NodeRun<S>) -> NodeOutcome {
  let node_id = run.node.node_id.clone();
  let result = execute(run).await;
  NodeOutcome { node_id, result }
}

async fn execute<S: Store>(run: NodeRun<S>) -> Result<ToolOutputs, ExecutionError> {
  // Queue behind the global concurrency cap, if one is configured.
  let _permit = match &run.limiter {
    Some(limiter) => match limiter.clone().acquire_owned().await {
      Ok(permit) => Some(permit),
      Err(_) => return Err(ExecutionError::Cancelled),
    },
    None => None,
  };

  let node_id = run.node.node_id.clone();

  // Input resolution and schema validation happen before the row is
  // created; their failures are still recorded so status queries see the
  // node-level error.
  let resolved = match resolve_inputs(&run.node, &run.upstream) {
    Ok(resolved) => resolved,
    Err(error) => {
      persist_failed(&run, run.node.literal_inputs.clone(), &error).await?;
      return Err(error);
    }
  };

  let inputs_value = serde_json::Value::Object(resolved.clone());
  if let Err(violation) = validate_instance(&run.contract.input_schema, &inputs_value) {
    let error = ExecutionError::InputSchema {
      node_id: node_id.clone(),
      detail: violation.message,
    };
    persist_failed(&run, resolved, &error).await?;
    return Err(error);
  }

  let record = new_record(&run, resolved.clone(), ExecutionStatus::Running, None);
  let record_id = record.id.clone();
  run.store.create_node(&record).await?;

  debug!(workflow_id = %run.workflow_id, node_id = %node_id, tool = %run.node.tool, "node running");

  // Race the invocation against cancellation. Tools are expected to honour
  // the token themselves; the race keeps cancellation prompt either way.
  let invoked = tokio::select! {
    _ = run.cancel.cancelled() => Err(ToolError::Cancelled),
    result = run.tool.execute(resolved, run.cancel.clone()) => result,
  };

  match invoked {
    Ok(outputs) => {
      let outputs_value = serde_json::Value::Object(outputs.clone());
      if let Err(violation) = validate_instance(&run.contract.output_schema, &outputs_value) {
        let error = ExecutionError::OutputSchema {
          node_id: node_id.clone(),
          detail: violation.message,
        };
        run
          .store
          .fail_node(&record_id, &error.to_string(), Utc::now())
          .await?;
        return Err(error);
      }

      run
        .store
        .complete_node(&record_id, &outputs_value, Utc::now())
        .await?;
      Ok(outputs)
    }
    Err(ToolError::Cancelled) => {
      let error = ExecutionError::Cancelled;
      run
        .store
        .fail_node(&record_id, &error.to_string(), Utc::now())
        .await?;
      Err(error)
    }
    Err(tool_error) => {
      let error = ExecutionError::Tool {
        node_id: node_id.clone(),
        message: tool_error.to_string(),
      };
      run
        .store
        .fail_node(&record_id, &error.to_string(), Utc::now())
        .await?;
      Err(error)
    }
  }
}

/// Persist a row for a node that failed before invocation.
async fn persist_failed<S: Store>(
  run: &NodeRun<S>,
  inputs: ToolInputs,
  error: &ExecutionError,
) -> Result<(), ExecutionError> {
  let mut record = new_record(run, inputs, ExecutionStatus::Failed, Some(error.to_string()));
  record.completed_at = Some(Utc::now());
  run.store.create_node(&record).await?;
  Ok(())
}

fn new_record<S>(
  run: &NodeRun<S>,
  inputs: ToolInputs,
  status: ExecutionStatus,
  error_message: Option<String>,
) -> NodeRecord {
  let now = Utc::now();
  NodeRecord {
    id: uuid::Uuid::new_v4().to_string(),
    workflow_id: run.workflow_id.clone(),
    node_id: run.node.node_id.clone(),
    tool: run.node.tool.clone(),
    resolved_inputs: Json(serde_json::Value::Object(inputs)),
    outputs: None,
    status,
    retry_count: 0,
    created_at: now,
    started_at: Some(now),
    completed_at: None,
    error_message,
    isolation_handle: None,
  }
}
