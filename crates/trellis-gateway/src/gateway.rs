use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;
use trellis_engine::{ExecuteOptions, ExecutionEvent, WorkflowEngine, WorkflowSubmission};
use trellis_store::{ExecutionStatus, Store, StoreError};
use trellis_tool::ToolCategory;
use trellis_tool_registry::{SchemaComposer, SchemaCompositionError, ToolRegistry};
use trellis_workflow::{NodeSpec, WorkflowSpec};

use crate::types::{
  CallStatus, ExecutionSummary, HealthResponse, SchemaMode, SchemaResponse, SystemStatusResponse,
  ToolCallOutcome, ToolCatalogue, WorkflowStatusResponse,
};

/// The gateway over one engine, one registry, and one store, owned by the
/// application root.
pub struct Gateway<S> {
  registry: Arc<ToolRegistry>,
  engine: Arc<WorkflowEngine<S>>,
  store: Arc<S>,
}

impl<S: Store + 'static> Gateway<S> {
  pub fn new(registry: Arc<ToolRegistry>, engine: Arc<WorkflowEngine<S>>, store: Arc<S>) -> Self {
    Self {
      registry,
      engine,
      store,
    }
  }

  pub fn health(&self) -> HealthResponse {
    HealthResponse {
      status: "healthy".to_owned(),
      service: "trellis-gateway".to_owned(),
    }
  }

  /// Every registered contract, optionally filtered by category.
  pub fn catalogue(&self, category: Option<ToolCategory>) -> ToolCatalogue {
    let tools: Vec<_> = self
      .registry
      .contracts()
      .into_iter()
      .filter(|contract| category.is_none_or(|c| contract.category == c))
      .map(Into::into)
      .collect();
    let count = tools.len();
    ToolCatalogue { tools, count }
  }

  /// A tool's user-facing input schema, standalone or with its declared
  /// dependencies auto-wired.
  pub fn tool_schema(
    &self,
    name: &str,
    as_pipeline: bool,
  ) -> Result<SchemaResponse, SchemaCompositionError> {
    let composer = SchemaComposer::new(&self.registry);
    let schema = composer.combined_input_schema(name, as_pipeline)?;
    Ok(SchemaResponse {
      tool: name.to_owned(),
      mode: if as_pipeline {
        SchemaMode::Pipeline
      } else {
        SchemaMode::Standalone
      },
      schema,
    })
  }

  /// The combined user-input schema of an explicit ordered pipeline.
  pub fn pipeline_schema(
    &self,
    names: &[String],
  ) -> Result<serde_json::Value, SchemaCompositionError> {
    SchemaComposer::new(&self.registry).pipeline_schema(names)
  }

  /// Execute one tool as a degenerate single-node workflow and wait for
  /// its terminal state.
  pub async fn call_tool(
    &self,
    name: &str,
    arguments: serde_json::Map<String, serde_json::Value>,
  ) -> ToolCallOutcome {
    info!(tool = %name, "single-tool invocation");

    let spec = WorkflowSpec {
      nodes: vec![NodeSpec {
        node_id: name.to_owned(),
        tool: name.to_owned(),
        literal_inputs: arguments,
        input_mappings: HashMap::new(),
      }],
      edges: vec![],
    };

    let mut submission = self.engine.submit(spec, ExecuteOptions::default());
    let mut outcome = ToolCallOutcome {
      tool: name.to_owned(),
      status: CallStatus::Failed,
      result: None,
      error: None,
    };

    while let Some(event) = submission.events.recv().await {
      match event {
        ExecutionEvent::WorkflowCompleted { mut results, .. } => {
          outcome.status = CallStatus::Completed;
          outcome.result = results
            .remove(name)
            .and_then(|value| value.as_object().cloned());
        }
        ExecutionEvent::WorkflowFailed { error, .. } => {
          outcome.status = CallStatus::Failed;
          outcome.error = Some(error);
        }
        _ => {}
      }
    }

    outcome
  }

  /// Submit a workflow; the caller consumes the returned event stream.
  pub fn submit_workflow(
    &self,
    spec: WorkflowSpec,
    user_id: Option<String>,
  ) -> WorkflowSubmission {
    self.engine.submit(
      spec,
      ExecuteOptions {
        user_id,
        deadline: None,
      },
    )
  }

  /// The persisted state of a workflow, or `None` if the id is unknown.
  pub async fn workflow_status(
    &self,
    workflow_id: &str,
  ) -> Result<Option<WorkflowStatusResponse>, StoreError> {
    let record = self.store.get_workflow(workflow_id).await?;
    Ok(record.map(Into::into))
  }

  /// Most recent executions, optionally filtered by status.
  pub async fn recent_executions(
    &self,
    limit: i64,
    status: Option<ExecutionStatus>,
  ) -> Result<Vec<ExecutionSummary>, StoreError> {
    let records = self.store.list_recent_workflows(limit, status).await?;
    Ok(records.into_iter().map(Into::into).collect())
  }

  /// Workflow totals by status.
  pub async fn system_status(&self) -> Result<SystemStatusResponse, StoreError> {
    Ok(self.store.status_counts().await?.into())
  }
}
