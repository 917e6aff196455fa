//! Trellis Store
//!
//! Durable records for workflow executions, node executions, and the error
//! log, persisted to a database. Four entities:
//! - `workflow_executions`: one row per submitted workflow.
//! - `node_executions`: one row per (workflow, node), cascade-deleted.
//! - `error_signatures` / `resolutions`: the error-learning log; the engine
//!   writes signatures, a separate collaborator reads them back.
//!
//! Every mutating operation runs inside a transaction that commits on
//! success, so readers observe final statuses only after commit.

mod error;
mod sqlite;
mod types;

use chrono::{DateTime, Utc};

/// Re-exported so callers can build JSON-blob columns without a direct
/// sqlx dependency.
pub use sqlx::types::Json;

pub use error::StoreError;
pub use sqlite::SqliteStore;
pub use types::{
  ErrorSignatureRecord, ExecutionStatus, NodeRecord, RecoveredIds, ResolutionRecord, StatusCounts,
  WorkflowRecord,
};

/// Storage operations for workflow and node executions.
pub trait Store: Send + Sync {
  /// Persist a new workflow execution row.
  fn create_workflow(
    &self,
    record: &WorkflowRecord,
  ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

  /// Fetch a workflow execution by id.
  fn get_workflow(
    &self,
    workflow_id: &str,
  ) -> impl std::future::Future<Output = Result<Option<WorkflowRecord>, StoreError>> + Send;

  /// Flip a workflow to RUNNING with its start timestamp.
  fn mark_workflow_running(
    &self,
    workflow_id: &str,
    started_at: DateTime<Utc>,
  ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

  /// Record overall progress (0.0-1.0).
  fn update_workflow_progress(
    &self,
    workflow_id: &str,
    progress: f64,
  ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

  /// Finalise a workflow as COMPLETED with its results map.
  fn complete_workflow(
    &self,
    workflow_id: &str,
    results: &serde_json::Value,
    completed_at: DateTime<Utc>,
  ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

  /// Finalise a workflow as FAILED with the first fatal error.
  fn fail_workflow(
    &self,
    workflow_id: &str,
    error_message: &str,
    completed_at: DateTime<Utc>,
  ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

  /// Persist a new node execution row.
  fn create_node(
    &self,
    record: &NodeRecord,
  ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

  /// Finalise a node as COMPLETED with its outputs.
  fn complete_node(
    &self,
    id: &str,
    outputs: &serde_json::Value,
    completed_at: DateTime<Utc>,
  ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

  /// Finalise a node as FAILED with its error message.
  fn fail_node(
    &self,
    id: &str,
    error_message: &str,
    completed_at: DateTime<Utc>,
  ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

  /// All node rows for a workflow, oldest first.
  fn list_nodes(
    &self,
    workflow_id: &str,
  ) -> impl std::future::Future<Output = Result<Vec<NodeRecord>, StoreError>> + Send;

  /// Most recent workflows, optionally filtered by status.
  fn list_recent_workflows(
    &self,
    limit: i64,
    status: Option<ExecutionStatus>,
  ) -> impl std::future::Future<Output = Result<Vec<WorkflowRecord>, StoreError>> + Send;

  /// Workflow totals by status.
  fn status_counts(
    &self,
  ) -> impl std::future::Future<Output = Result<StatusCounts, StoreError>> + Send;

  /// Mark every RUNNING or PENDING workflow and node as PENDING with the
  /// given message, in one transaction. Returns the affected identifiers.
  fn recover_interrupted(
    &self,
    error_message: &str,
  ) -> impl std::future::Future<Output = Result<RecoveredIds, StoreError>> + Send;

  /// Upsert an error signature: a new hash inserts a row, a known hash
  /// bumps `occurrence_count` and `last_seen`.
  fn record_error_signature(
    &self,
    error_type: &str,
    error_message: &str,
    tool_name: &str,
    signature_hash: &str,
    seen_at: DateTime<Utc>,
  ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

  /// Fetch an error signature by hash.
  fn get_error_signature(
    &self,
    signature_hash: &str,
  ) -> impl std::future::Future<Output = Result<Option<ErrorSignatureRecord>, StoreError>> + Send;

  /// Persist a candidate resolution for a signature.
  fn create_resolution(
    &self,
    record: &ResolutionRecord,
  ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

  /// Record one application of a resolution and whether it succeeded.
  fn record_resolution_applied(
    &self,
    id: &str,
    succeeded: bool,
  ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

  /// Resolutions for a signature, best success rate first.
  fn list_resolutions(
    &self,
    error_signature_id: &str,
  ) -> impl std::future::Future<Output = Result<Vec<ResolutionRecord>, StoreError>> + Send;
}
