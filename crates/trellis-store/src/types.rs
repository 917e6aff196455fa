use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use trellis_workflow::WorkflowSpec;

/// Lifecycle status shared by workflow and node executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
  Pending,
  Running,
  Completed,
  Failed,
}

impl ExecutionStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Failed)
  }
}

/// A workflow execution as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRecord {
  pub id: String,
  pub spec: Json<WorkflowSpec>,
  pub status: ExecutionStatus,
  pub progress: f64,
  pub created_at: DateTime<Utc>,
  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
  pub error_message: Option<String>,
  /// node_id -> outputs of every successful terminal node.
  pub results: Option<Json<serde_json::Value>>,
}

impl WorkflowRecord {
  /// A fresh PENDING record for an accepted spec.
  pub fn pending(id: String, spec: WorkflowSpec, created_at: DateTime<Utc>) -> Self {
    Self {
      id,
      spec: Json(spec),
      status: ExecutionStatus::Pending,
      progress: 0.0,
      created_at,
      started_at: None,
      completed_at: None,
      error_message: None,
      results: None,
    }
  }
}

/// A node execution as stored in the database, child of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeRecord {
  pub id: String,
  pub workflow_id: String,
  pub node_id: String,
  pub tool: String,
  pub resolved_inputs: Json<serde_json::Value>,
  pub outputs: Option<Json<serde_json::Value>>,
  pub status: ExecutionStatus,
  /// Persisted for forward compatibility; the engine never increments it.
  pub retry_count: i64,
  pub created_at: DateTime<Utc>,
  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
  pub error_message: Option<String>,
  /// Opaque sandbox handle; populated by an isolation collaborator.
  pub isolation_handle: Option<String>,
}

/// A normalised error signature, written by the engine on node failure and
/// read by the error-learning collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ErrorSignatureRecord {
  pub id: String,
  pub error_type: String,
  pub error_message: String,
  pub tool_name: String,
  pub signature_hash: String,
  pub first_seen: DateTime<Utc>,
  pub last_seen: DateTime<Utc>,
  pub occurrence_count: i64,
}

/// A candidate fix for an error signature, tracked by the learning
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResolutionRecord {
  pub id: String,
  pub error_signature_id: String,
  pub resolution_type: String,
  pub resolution_data: Json<serde_json::Value>,
  pub applied_count: i64,
  pub success_count: i64,
  pub created_at: DateTime<Utc>,
}

impl ResolutionRecord {
  /// Fraction of applications that succeeded; 0 when never applied.
  pub fn success_rate(&self) -> f64 {
    if self.applied_count == 0 {
      0.0
    } else {
      self.success_count as f64 / self.applied_count as f64
    }
  }
}

/// Workflow totals by status, for the system-status surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
  pub total: i64,
  pub pending: i64,
  pub running: i64,
  pub completed: i64,
  pub failed: i64,
}

/// Identifiers touched by a recovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveredIds {
  pub workflow_ids: Vec<String>,
  pub node_ids: Vec<String>,
}
