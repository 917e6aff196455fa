//! Trellis Gateway
//!
//! The RPC surface clients discover and invoke tools through, expressed as
//! plain async methods returning serde-serialisable shapes. A transport
//! adapter (CLI, HTTP, stdio) owns the wire framing: event streams are
//! yielded as receivers for the adapter to serialise one event per line or
//! per server-sent event.

mod gateway;
mod types;

pub use gateway::Gateway;
pub use types::{
  CallStatus, ExecutionSummary, HealthResponse, SchemaMode, SchemaResponse, SystemStatusResponse,
  ToolCallOutcome, ToolCatalogue, ToolDescriptor, WorkflowStatusResponse,
};
