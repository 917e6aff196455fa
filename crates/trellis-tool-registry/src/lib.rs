//! Trellis Tool Registry
//!
//! A read-optimised catalogue of tool contracts. The registry is an
//! explicitly-constructed value owned by the application root and passed
//! into the engine at start-up; tools register through [`ToolRegistryBuilder`]
//! during wiring, so there is no hidden load-order coupling.
//!
//! Reads vastly dominate writes: lookups take a shared lock for the
//! duration of a hash probe, registration takes the write lock only for the
//! insert.
//!
//! The [`compose`] module derives user-facing input schemas for pipelines
//! by eliding fields an upstream tool's outputs will provide.

pub mod compose;
mod error;
mod registry;
#[cfg(test)]
pub(crate) mod testing;

pub use compose::{SchemaComposer, SchemaCompositionError};
pub use error::RegistryError;
pub use registry::{ToolRegistry, ToolRegistryBuilder};
