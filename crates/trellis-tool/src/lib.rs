//! Trellis Tool
//!
//! This crate defines the contract between the Trellis engine and its tool
//! plug-ins. A tool is a named, schema-described operation: it declares a
//! [`ToolContract`] once and exposes a single `execute` operation that takes
//! a dynamic input mapping and returns a dynamic output mapping.
//!
//! The engine never looks inside a tool. Everything it needs to schedule,
//! wire, and validate a tool invocation comes from the contract:
//! - `input_schema` / `output_schema`: JSON-Schema object types validated at
//!   node boundaries.
//! - `dependencies` and `output_mappings`: hints used only for schema
//!   composition, never for runtime scheduling.
//! - `requires_isolation`: carried through to the execution record; the
//!   sandbox itself is a collaborator.

mod contract;
mod error;
mod schema;
mod tool;

pub use contract::{ToolCategory, ToolContract};
pub use error::ToolError;
pub use schema::{SchemaViolation, validate_instance};
pub use tool::{Tool, ToolInputs, ToolOutputs};
