//! JSON-Schema boundary validation.
//!
//! Inputs and outputs are structurally typed: dynamic values checked against
//! the contract's declared schemas at node boundaries. No attempt is made to
//! type tool signatures at compile time.

use thiserror::Error;

/// A value failed validation against a declared schema.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SchemaViolation {
  pub message: String,
}

/// Validate `instance` against `schema`, reporting the first violation.
///
/// A malformed schema is reported the same way as a non-conforming value;
/// contracts are authored by tool developers and both mistakes surface at
/// the same boundary.
pub fn validate_instance(
  schema: &serde_json::Value,
  instance: &serde_json::Value,
) -> Result<(), SchemaViolation> {
  let validator = jsonschema::validator_for(schema).map_err(|e| SchemaViolation {
    message: format!("invalid schema: {}", e),
  })?;

  if let Err(error) = validator.validate(instance) {
    let path = error.instance_path.to_string();
    let message = if path.is_empty() {
      error.to_string()
    } else {
      format!("{}: {}", path, error)
    };
    return Err(SchemaViolation { message });
  }

  Ok(())
}
