//! Trellis Engine
//!
//! Drives workflow DAGs end-to-end: validates the graph, persists execution
//! state, dispatches each layer of independent nodes concurrently, wires
//! upstream outputs into downstream inputs, and streams lifecycle events to
//! the caller.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkflowEngine                         │
//! │  - submit(spec, options) → WorkflowSubmission               │
//! │  - validation, layered dispatch, result-map wiring          │
//! │  - bounded event channel, cancellation, deadline            │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Node runner                          │
//! │  - resolves literal inputs + upstream mappings              │
//! │  - persists the node row, invokes the tool, validates       │
//! │    outputs against the contract schema                      │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       trellis-store                         │
//! │  - workflow / node rows committed before events are sent    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A first fatal node failure cancels still-running siblings, skips every
//! later batch, and finalises the workflow FAILED. There are no automatic
//! retries and no partial success.

mod engine;
mod error;
mod events;
mod node;
mod recovery;
mod signature;

pub use engine::{EngineConfig, ExecuteOptions, WorkflowEngine, WorkflowSubmission};
pub use error::ExecutionError;
pub use events::ExecutionEvent;
pub use recovery::{INTERRUPTED_MESSAGE, RecoveryCoordinator};
pub use signature::{normalise_error_message, signature_hash};
