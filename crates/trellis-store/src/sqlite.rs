use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;

use crate::error::StoreError;
use crate::types::{
  ErrorSignatureRecord, ExecutionStatus, NodeRecord, RecoveredIds, ResolutionRecord, StatusCounts,
  WorkflowRecord,
};
use crate::Store;

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Wrap an existing connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if missing) a database file.
  pub async fn connect(path: &Path) -> Result<Self, StoreError> {
    let options = SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true)
      .foreign_keys(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    Ok(Self::new(pool))
  }

  /// An in-memory database on a single connection, for tests.
  pub async fn in_memory() -> Result<Self, StoreError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .idle_timeout(None)
      .max_lifetime(None)
      .connect_with(options)
      .await?;
    Ok(Self::new(pool))
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await?;
    Ok(())
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }
}

impl Store for SqliteStore {
  async fn create_workflow(&self, record: &WorkflowRecord) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            INSERT INTO workflow_executions
                (id, spec, status, progress, created_at, started_at, completed_at, error_message, results)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&record.id)
    .bind(&record.spec)
    .bind(record.status)
    .bind(record.progress)
    .bind(record.created_at)
    .bind(record.started_at)
    .bind(record.completed_at)
    .bind(&record.error_message)
    .bind(&record.results)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_workflow(&self, workflow_id: &str) -> Result<Option<WorkflowRecord>, StoreError> {
    let record = sqlx::query_as(
      r#"
            SELECT id, spec, status, progress, created_at, started_at, completed_at, error_message, results
            FROM workflow_executions
            WHERE id = ?
            "#,
    )
    .bind(workflow_id)
    .fetch_optional(&self.pool)
    .await?;

    Ok(record)
  }

  async fn mark_workflow_running(
    &self,
    workflow_id: &str,
    started_at: DateTime<Utc>,
  ) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            UPDATE workflow_executions
            SET status = ?, started_at = ?
            WHERE id = ?
            "#,
    )
    .bind(ExecutionStatus::Running)
    .bind(started_at)
    .bind(workflow_id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn update_workflow_progress(
    &self,
    workflow_id: &str,
    progress: f64,
  ) -> Result<(), StoreError> {
    sqlx::query("UPDATE workflow_executions SET progress = ? WHERE id = ?")
      .bind(progress)
      .bind(workflow_id)
      .execute(&self.pool)
      .await?;

    Ok(())
  }

  async fn complete_workflow(
    &self,
    workflow_id: &str,
    results: &serde_json::Value,
    completed_at: DateTime<Utc>,
  ) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            UPDATE workflow_executions
            SET status = ?, progress = 1.0, results = ?, completed_at = ?
            WHERE id = ?
            "#,
    )
    .bind(ExecutionStatus::Completed)
    .bind(Json(results))
    .bind(completed_at)
    .bind(workflow_id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn fail_workflow(
    &self,
    workflow_id: &str,
    error_message: &str,
    completed_at: DateTime<Utc>,
  ) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            UPDATE workflow_executions
            SET status = ?, error_message = ?, completed_at = ?
            WHERE id = ?
            "#,
    )
    .bind(ExecutionStatus::Failed)
    .bind(error_message)
    .bind(completed_at)
    .bind(workflow_id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn create_node(&self, record: &NodeRecord) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            INSERT INTO node_executions
                (id, workflow_id, node_id, tool, resolved_inputs, outputs, status, retry_count,
                 created_at, started_at, completed_at, error_message, isolation_handle)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&record.id)
    .bind(&record.workflow_id)
    .bind(&record.node_id)
    .bind(&record.tool)
    .bind(&record.resolved_inputs)
    .bind(&record.outputs)
    .bind(record.status)
    .bind(record.retry_count)
    .bind(record.created_at)
    .bind(record.started_at)
    .bind(record.completed_at)
    .bind(&record.error_message)
    .bind(&record.isolation_handle)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn complete_node(
    &self,
    id: &str,
    outputs: &serde_json::Value,
    completed_at: DateTime<Utc>,
  ) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            UPDATE node_executions
            SET status = ?, outputs = ?, completed_at = ?
            WHERE id = ?
            "#,
    )
    .bind(ExecutionStatus::Completed)
    .bind(Json(outputs))
    .bind(completed_at)
    .bind(id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn fail_node(
    &self,
    id: &str,
    error_message: &str,
    completed_at: DateTime<Utc>,
  ) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            UPDATE node_executions
            SET status = ?, error_message = ?, completed_at = ?
            WHERE id = ?
            "#,
    )
    .bind(ExecutionStatus::Failed)
    .bind(error_message)
    .bind(completed_at)
    .bind(id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn list_nodes(&self, workflow_id: &str) -> Result<Vec<NodeRecord>, StoreError> {
    let records = sqlx::query_as(
      r#"
            SELECT id, workflow_id, node_id, tool, resolved_inputs, outputs, status, retry_count,
                   created_at, started_at, completed_at, error_message, isolation_handle
            FROM node_executions
            WHERE workflow_id = ?
            ORDER BY created_at ASC
            "#,
    )
    .bind(workflow_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(records)
  }

  async fn list_recent_workflows(
    &self,
    limit: i64,
    status: Option<ExecutionStatus>,
  ) -> Result<Vec<WorkflowRecord>, StoreError> {
    let records = match status {
      Some(status) => {
        sqlx::query_as(
          r#"
                SELECT id, spec, status, progress, created_at, started_at, completed_at, error_message, results
                FROM workflow_executions
                WHERE status = ?
                ORDER BY created_at DESC
                LIMIT ?
                "#,
        )
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?
      }
      None => {
        sqlx::query_as(
          r#"
                SELECT id, spec, status, progress, created_at, started_at, completed_at, error_message, results
                FROM workflow_executions
                ORDER BY created_at DESC
                LIMIT ?
                "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?
      }
    };

    Ok(records)
  }

  async fn status_counts(&self) -> Result<StatusCounts, StoreError> {
    let rows: Vec<(ExecutionStatus, i64)> =
      sqlx::query_as("SELECT status, COUNT(*) FROM workflow_executions GROUP BY status")
        .fetch_all(&self.pool)
        .await?;

    let mut counts = StatusCounts::default();
    for (status, count) in rows {
      counts.total += count;
      match status {
        ExecutionStatus::Pending => counts.pending = count,
        ExecutionStatus::Running => counts.running = count,
        ExecutionStatus::Completed => counts.completed = count,
        ExecutionStatus::Failed => counts.failed = count,
      }
    }

    Ok(counts)
  }

  async fn recover_interrupted(&self, error_message: &str) -> Result<RecoveredIds, StoreError> {
    let mut tx = self.pool.begin().await?;

    let workflow_ids: Vec<String> = sqlx::query_scalar(
      "SELECT id FROM workflow_executions WHERE status IN ('RUNNING', 'PENDING')",
    )
    .fetch_all(&mut *tx)
    .await?;

    let node_ids: Vec<String> =
      sqlx::query_scalar("SELECT id FROM node_executions WHERE status IN ('RUNNING', 'PENDING')")
        .fetch_all(&mut *tx)
        .await?;

    sqlx::query(
      r#"
            UPDATE workflow_executions
            SET status = ?, error_message = ?
            WHERE status IN ('RUNNING', 'PENDING')
            "#,
    )
    .bind(ExecutionStatus::Pending)
    .bind(error_message)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
      r#"
            UPDATE node_executions
            SET status = ?, error_message = ?
            WHERE status IN ('RUNNING', 'PENDING')
            "#,
    )
    .bind(ExecutionStatus::Pending)
    .bind(error_message)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(RecoveredIds {
      workflow_ids,
      node_ids,
    })
  }

  async fn record_error_signature(
    &self,
    error_type: &str,
    error_message: &str,
    tool_name: &str,
    signature_hash: &str,
    seen_at: DateTime<Utc>,
  ) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            INSERT INTO error_signatures
                (id, error_type, error_message, tool_name, signature_hash, first_seen, last_seen, occurrence_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, 1)
            ON CONFLICT (signature_hash) DO UPDATE SET
                occurrence_count = occurrence_count + 1,
                last_seen = excluded.last_seen
            "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(error_type)
    .bind(error_message)
    .bind(tool_name)
    .bind(signature_hash)
    .bind(seen_at)
    .bind(seen_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_error_signature(
    &self,
    signature_hash: &str,
  ) -> Result<Option<ErrorSignatureRecord>, StoreError> {
    let record = sqlx::query_as(
      r#"
            SELECT id, error_type, error_message, tool_name, signature_hash, first_seen, last_seen, occurrence_count
            FROM error_signatures
            WHERE signature_hash = ?
            "#,
    )
    .bind(signature_hash)
    .fetch_optional(&self.pool)
    .await?;

    Ok(record)
  }

  async fn create_resolution(&self, record: &ResolutionRecord) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            INSERT INTO resolutions
                (id, error_signature_id, resolution_type, resolution_data, applied_count, success_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&record.id)
    .bind(&record.error_signature_id)
    .bind(&record.resolution_type)
    .bind(&record.resolution_data)
    .bind(record.applied_count)
    .bind(record.success_count)
    .bind(record.created_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn record_resolution_applied(&self, id: &str, succeeded: bool) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            UPDATE resolutions
            SET applied_count = applied_count + 1,
                success_count = success_count + CASE WHEN ? THEN 1 ELSE 0 END
            WHERE id = ?
            "#,
    )
    .bind(succeeded)
    .bind(id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn list_resolutions(
    &self,
    error_signature_id: &str,
  ) -> Result<Vec<ResolutionRecord>, StoreError> {
    let records = sqlx::query_as(
      r#"
            SELECT id, error_signature_id, resolution_type, resolution_data, applied_count, success_count, created_at
            FROM resolutions
            WHERE error_signature_id = ?
            ORDER BY CASE WHEN applied_count = 0 THEN 0.0
                          ELSE CAST(success_count AS REAL) / applied_count END DESC
            "#,
    )
    .bind(error_signature_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(records)
  }
}
