//! Workflow execution engine.
//!
//! `WorkflowEngine::submit` validates a spec, persists the execution
//! record, and spawns a driver task that dispatches each layer of the plan
//! concurrently, streaming lifecycle events into a bounded channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use trellis_store::{Store, WorkflowRecord};
use trellis_tool::{Tool, ToolContract, ToolOutputs};
use trellis_tool_registry::ToolRegistry;
use trellis_workflow::{ExecutionPlan, GraphError, WorkflowSpec};

use crate::error::ExecutionError;
use crate::events::ExecutionEvent;
use crate::node::{NodeOutcome, NodeRun, run_node};
use crate::signature::signature_hash;

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Cap on concurrently running nodes across all workflows. `None` means
  /// unbounded per workflow; when capped, excess nodes queue and start as
  /// slots free.
  pub max_concurrent_nodes: Option<usize>,
  /// Capacity of each submission's event channel. The driver applies
  /// back-pressure when the consumer lags.
  pub event_buffer: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      max_concurrent_nodes: None,
      event_buffer: 64,
    }
  }
}

/// Per-submission options.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
  pub user_id: Option<String>,
  /// Overall deadline; reaching it behaves exactly like external
  /// cancellation.
  pub deadline: Option<Duration>,
}

/// Handle returned by [`WorkflowEngine::submit`].
pub struct WorkflowSubmission {
  pub workflow_id: String,
  /// Signalling this token cancels the whole workflow.
  pub cancel: CancellationToken,
  /// Lazy, finite event stream; `Complete` is always the last item.
  pub events: mpsc::Receiver<ExecutionEvent>,
}

/// The workflow execution engine.
pub struct WorkflowEngine<S> {
  registry: Arc<ToolRegistry>,
  store: Arc<S>,
  config: EngineConfig,
  limiter: Option<Arc<Semaphore>>,
}

impl<S: Store + 'static> WorkflowEngine<S> {
  pub fn new(registry: Arc<ToolRegistry>, store: Arc<S>, config: EngineConfig) -> Self {
    let limiter = config
      .max_concurrent_nodes
      .map(|cap| Arc::new(Semaphore::new(cap)));
    Self {
      registry,
      store,
      config,
      limiter,
    }
  }

  pub fn store(&self) -> &Arc<S> {
    &self.store
  }

  pub fn registry(&self) -> &Arc<ToolRegistry> {
    &self.registry
  }

  /// Submit a workflow for execution.
  ///
  /// Returns immediately; a spawned driver performs validation and
  /// execution, streaming events into the submission's channel. A spec
  /// that fails validation produces `workflow_failed` + `complete` and is
  /// never persisted.
  pub fn submit(&self, spec: WorkflowSpec, options: ExecuteOptions) -> WorkflowSubmission {
    let workflow_id = uuid::Uuid::new_v4().to_string();
    let (events, receiver) = mpsc::channel(self.config.event_buffer);
    let cancel = CancellationToken::new();

    let driver = Driver {
      registry: self.registry.clone(),
      store: self.store.clone(),
      limiter: self.limiter.clone(),
      workflow_id: workflow_id.clone(),
      spec,
      user_id: options.user_id,
      deadline: options.deadline,
      cancel: cancel.child_token(),
      events,
    };
    tokio::spawn(driver.run());

    WorkflowSubmission {
      workflow_id,
      cancel,
      events: receiver,
    }
  }
}

/// A registered tool paired with its contract snapshot, captured at
/// validation time.
#[derive(Clone)]
struct PreparedTool {
  tool: Arc<dyn Tool>,
  contract: ToolContract,
}

/// Drives one workflow execution to completion.
struct Driver<S> {
  registry: Arc<ToolRegistry>,
  store: Arc<S>,
  limiter: Option<Arc<Semaphore>>,
  workflow_id: String,
  spec: WorkflowSpec,
  user_id: Option<String>,
  deadline: Option<Duration>,
  cancel: CancellationToken,
  events: mpsc::Sender<ExecutionEvent>,
}

impl<S: Store + 'static> Driver<S> {
  async fn run(self) {
    let (plan, tools) = match self.validate() {
      Ok(validated) => validated,
      Err(error) => {
        warn!(workflow_id = %self.workflow_id, error = %error, "workflow rejected");
        self
          .send(ExecutionEvent::WorkflowFailed {
            workflow_id: self.workflow_id.clone(),
            error: error.to_string(),
          })
          .await;
        self.send(ExecutionEvent::Complete).await;
        return;
      }
    };

    let record = WorkflowRecord::pending(self.workflow_id.clone(), self.spec.clone(), Utc::now());
    if let Err(error) = self.store.create_workflow(&record).await {
      self.finalise_failed(ExecutionError::from(error).to_string()).await;
      return;
    }
    if let Err(error) = self
      .store
      .mark_workflow_running(&self.workflow_id, Utc::now())
      .await
    {
      self.finalise_failed(ExecutionError::from(error).to_string()).await;
      return;
    }

    info!(
        workflow_id = %self.workflow_id,
        total_nodes = plan.total_nodes(),
        user = self.user_id.as_deref().unwrap_or("anonymous"),
        "workflow started"
    );
    self
      .send(ExecutionEvent::Start {
        workflow_id: self.workflow_id.clone(),
        total_nodes: plan.total_nodes(),
      })
      .await;

    let deadline_guard = self.deadline.map(|timeout| {
      let cancel = self.cancel.clone();
      tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        cancel.cancel();
      })
    });

    self.drive(&plan, &tools).await;

    if let Some(guard) = deadline_guard {
      guard.abort();
    }
  }

  /// Validate the graph and capture every referenced tool.
  fn validate(
    &self,
  ) -> Result<(ExecutionPlan, HashMap<String, PreparedTool>), ExecutionError> {
    let plan = ExecutionPlan::build(&self.spec)?;

    let mut tools: HashMap<String, PreparedTool> = HashMap::new();
    for node in &self.spec.nodes {
      if tools.contains_key(&node.tool) {
        continue;
      }
      match (
        self.registry.lookup(&node.tool),
        self.registry.contract(&node.tool),
      ) {
        (Some(tool), Some(contract)) => {
          tools.insert(node.tool.clone(), PreparedTool { tool, contract });
        }
        _ => return Err(GraphError::UnknownTool(node.tool.clone()).into()),
      }
    }

    Ok((plan, tools))
  }

  /// Execute the plan batch by batch.
  async fn drive(&self, plan: &ExecutionPlan, tools: &HashMap<String, PreparedTool>) {
    let total = plan.total_nodes();
    let mut result_map: HashMap<String, ToolOutputs> = HashMap::new();
    let mut completed_count = 0usize;

    for batch in plan.batches() {
      if self.cancel.is_cancelled() {
        self.finalise_failed("cancelled".to_owned()).await;
        return;
      }

      let mut running = FuturesUnordered::new();
      for node_id in batch {
        let node = self
          .spec
          .node(node_id)
          .expect("plan references declared nodes")
          .clone();
        let prepared = tools
          .get(&node.tool)
          .expect("validation captured every referenced tool")
          .clone();

        // Snapshot just the upstream outputs this node maps from.
        let mut upstream: HashMap<String, ToolOutputs> = HashMap::new();
        for reference in node.input_mappings.keys() {
          if let Some((upstream_id, _)) = WorkflowSpec::split_mapping_key(reference) {
            if let Some(outputs) = result_map.get(upstream_id) {
              upstream.insert(upstream_id.to_owned(), outputs.clone());
            }
          }
        }

        self
          .send(ExecutionEvent::NodeStarted {
            node_id: node_id.clone(),
          })
          .await;

        let handle = tokio::spawn(run_node(NodeRun {
          store: self.store.clone(),
          workflow_id: self.workflow_id.clone(),
          node,
          tool: prepared.tool,
          contract: prepared.contract,
          upstream,
          cancel: self.cancel.clone(),
          limiter: self.limiter.clone(),
        }));

        let joined_node_id = node_id.clone();
        running.push(async move {
          match handle.await {
            Ok(outcome) => outcome,
            Err(join_error) => NodeOutcome {
              node_id: joined_node_id.clone(),
              result: Err(ExecutionError::Tool {
                node_id: joined_node_id,
                message: format!("node task panicked: {join_error}"),
              }),
            },
          }
        });
      }

      // Process completions as they arrive so the first fatal failure can
      // cancel siblings without waiting out the batch.
      while let Some(outcome) = running.next().await {
        match outcome.result {
          Ok(outputs) => {
            completed_count += 1;
            let progress = completed_count as f64 / total as f64;
            if let Err(error) = self
              .store
              .update_workflow_progress(&self.workflow_id, progress)
              .await
            {
              self.cancel.cancel();
              while running.next().await.is_some() {}
              self.finalise_failed(ExecutionError::from(error).to_string()).await;
              return;
            }

            result_map.insert(outcome.node_id.clone(), outputs.clone());
            self
              .send(ExecutionEvent::NodeCompleted {
                node_id: outcome.node_id,
                progress,
                outputs,
              })
              .await;
          }
          Err(error) => {
            warn!(
                workflow_id = %self.workflow_id,
                node_id = %outcome.node_id,
                error = %error,
                "node failed"
            );
            self
              .send(ExecutionEvent::NodeFailed {
                node_id: outcome.node_id.clone(),
                error: error.to_string(),
              })
              .await;
            self.record_error_signature(&outcome.node_id, &error).await;

            // First fatal wins: stop siblings, wait for them to finalise
            // their rows, never start later batches.
            self.cancel.cancel();
            while running.next().await.is_some() {}

            let message = if error.is_cancelled() {
              "cancelled".to_owned()
            } else {
              format!("node '{}' failed: {}", outcome.node_id, error)
            };
            self.finalise_failed(message).await;
            return;
          }
        }
      }
    }

    let mut results = serde_json::Map::new();
    for (node_id, outputs) in result_map {
      results.insert(node_id, serde_json::Value::Object(outputs));
    }

    if let Err(error) = self
      .store
      .complete_workflow(
        &self.workflow_id,
        &serde_json::Value::Object(results.clone()),
        Utc::now(),
      )
      .await
    {
      self.finalise_failed(ExecutionError::from(error).to_string()).await;
      return;
    }

    info!(workflow_id = %self.workflow_id, nodes = total, "workflow completed");
    self
      .send(ExecutionEvent::WorkflowCompleted {
        workflow_id: self.workflow_id.clone(),
        results,
      })
      .await;
    self.send(ExecutionEvent::Complete).await;
  }

  /// Mark the workflow FAILED (best effort) and terminate the stream.
  async fn finalise_failed(&self, message: String) {
    if let Err(error) = self
      .store
      .fail_workflow(&self.workflow_id, &message, Utc::now())
      .await
    {
      warn!(
          workflow_id = %self.workflow_id,
          error = %error,
          "could not persist workflow failure"
      );
    }

    self
      .send(ExecutionEvent::WorkflowFailed {
        workflow_id: self.workflow_id.clone(),
        error: message,
      })
      .await;
    self.send(ExecutionEvent::Complete).await;
  }

  /// Log the failure into the error-signature table. Best effort: a store
  /// error here never masks the node error, and cancellations and
  /// persistence failures are not signatures worth learning from.
  async fn record_error_signature(&self, node_id: &str, error: &ExecutionError) {
    if matches!(
      error,
      ExecutionError::Cancelled | ExecutionError::Persistence(_)
    ) {
      return;
    }

    let tool_name = self
      .spec
      .node(node_id)
      .map(|n| n.tool.as_str())
      .unwrap_or("unknown");
    let message = error.to_string();
    let hash = signature_hash(error.kind(), tool_name, &message);

    if let Err(store_error) = self
      .store
      .record_error_signature(error.kind(), &message, tool_name, &hash, Utc::now())
      .await
    {
      warn!(
          workflow_id = %self.workflow_id,
          error = %store_error,
          "could not record error signature"
      );
    }
  }

  async fn send(&self, event: ExecutionEvent) {
    // A dropped receiver just means nobody is watching any more.
    let _ = self.events.send(event).await;
  }
}
