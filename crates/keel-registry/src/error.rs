//! Registry error types

use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Component at catalog position {index} has an empty name")]
    EmptyName { index: usize },

    #[error("Duplicate component name in catalog: {0}")]
    DuplicateName(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
