//! Error types for the simulation core.

use thiserror::Error;

use crate::economy::ResourceKind;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for the simulation core.
///
/// Nothing here is fatal: callers that drive the tick loop treat every
/// variant as a rejected request and carry on.
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid agent reference.
    #[error("Agent not found: {0}")]
    AgentNotFound(u64),

    /// No template with the given name in the catalog.
    #[error("Unknown agent template: {0}")]
    TemplateNotFound(String),

    /// Data file parsing error.
    #[error("Failed to parse data '{source_name}': {message}")]
    DataParseError {
        /// Name of the file or buffer that failed to parse.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// Insufficient resources.
    #[error("Insufficient resources: need {required} {resource:?}, have {available}")]
    InsufficientResources {
        /// Resource type.
        resource: ResourceKind,
        /// Amount required.
        required: u32,
        /// Amount available.
        available: u32,
    },

    /// Invalid simulation state for the requested operation.
    #[error("Invalid simulation state: {0}")]
    InvalidState(String),
}
