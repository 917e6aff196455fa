use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trellis_store::{ExecutionStatus, StatusCounts, WorkflowRecord};
use trellis_tool::{ToolCategory, ToolContract};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
  pub status: String,
  pub service: String,
}

/// One catalogue entry, in the wire shape clients expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
  pub name: String,
  pub description: String,
  pub category: ToolCategory,
  pub input_schema: serde_json::Value,
  pub output_schema: serde_json::Value,
  pub requires_isolation: bool,
  pub dependencies: Vec<String>,
}

impl From<ToolContract> for ToolDescriptor {
  fn from(contract: ToolContract) -> Self {
    Self {
      name: contract.name,
      description: contract.description,
      category: contract.category,
      input_schema: contract.input_schema,
      output_schema: contract.output_schema,
      requires_isolation: contract.requires_isolation,
      dependencies: contract.dependencies,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCatalogue {
  pub tools: Vec<ToolDescriptor>,
  pub count: usize,
}

/// Terminal status of a single-tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallStatus {
  Completed,
  Failed,
}

/// Result of the single-tool invocation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallOutcome {
  pub tool: String,
  pub status: CallStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<serde_json::Map<String, serde_json::Value>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaMode {
  Standalone,
  Pipeline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaResponse {
  pub tool: String,
  pub mode: SchemaMode,
  pub schema: serde_json::Value,
}

/// Persisted workflow state, as returned by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStatusResponse {
  pub workflow_id: String,
  pub status: ExecutionStatus,
  pub progress: f64,
  pub created_at: DateTime<Utc>,
  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub results: Option<serde_json::Value>,
}

impl From<WorkflowRecord> for WorkflowStatusResponse {
  fn from(record: WorkflowRecord) -> Self {
    Self {
      workflow_id: record.id,
      status: record.status,
      progress: record.progress,
      created_at: record.created_at,
      started_at: record.started_at,
      completed_at: record.completed_at,
      error: record.error_message,
      results: record.results.map(|r| r.0),
    }
  }
}

/// One row of the recent-executions listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
  pub id: String,
  pub status: ExecutionStatus,
  pub progress: f64,
  pub created_at: DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl From<WorkflowRecord> for ExecutionSummary {
  fn from(record: WorkflowRecord) -> Self {
    Self {
      id: record.id,
      status: record.status,
      progress: record.progress,
      created_at: record.created_at,
      error: record.error_message,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatusResponse {
  pub total_workflows: i64,
  pub pending: i64,
  pub running: i64,
  pub completed: i64,
  pub failed: i64,
}

impl From<StatusCounts> for SystemStatusResponse {
  fn from(counts: StatusCounts) -> Self {
    Self {
      total_workflows: counts.total,
      pending: counts.pending,
      running: counts.running,
      completed: counts.completed,
      failed: counts.failed,
    }
  }
}
