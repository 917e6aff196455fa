use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
  /// A tool with this name is already registered. The registry is left
  /// unchanged.
  #[error("tool '{0}' is already registered")]
  AlreadyRegistered(String),
}
