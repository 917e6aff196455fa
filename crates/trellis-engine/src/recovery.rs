//! Startup reconciliation of in-flight records left by a prior process.
//!
//! Policy is pessimistic resume: interrupted rows are marked PENDING with
//! an explanatory message and left for an external driver to re-submit.
//! Tool side-effects are opaque and may not be idempotent, so nothing is
//! auto-restarted.

use std::sync::Arc;

use tracing::info;
use trellis_store::{RecoveredIds, Store, StoreError};

/// Error message stamped onto recovered rows.
pub const INTERRUPTED_MESSAGE: &str = "interrupted by restart";

/// Runs once, synchronously, before the engine accepts new work.
pub struct RecoveryCoordinator<S> {
  store: Arc<S>,
}

impl<S: Store> RecoveryCoordinator<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  /// Mark every RUNNING or PENDING workflow and node as interrupted and
  /// return the affected identifiers for operator tooling.
  pub async fn recover(&self) -> Result<RecoveredIds, StoreError> {
    let recovered = self.store.recover_interrupted(INTERRUPTED_MESSAGE).await?;

    if recovered.workflow_ids.is_empty() && recovered.node_ids.is_empty() {
      info!("no interrupted executions to recover");
    } else {
      info!(
        workflows = recovered.workflow_ids.len(),
        nodes = recovered.node_ids.len(),
        "recovered interrupted executions"
      );
    }

    Ok(recovered)
  }
}
