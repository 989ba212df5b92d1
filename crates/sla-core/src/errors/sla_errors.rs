//! SLA/BLF error definitions

use thiserror::Error;

use crate::engine::EngineError;

/// Result type for SLA operations
pub type SlaResult<T> = Result<T, SlaError>;

/// Errors produced by the SLA/BLF subscription layer
///
/// ## Error Categories
///
/// - **InvalidArgument**: a required handle or dialog was missing
/// - **InvalidOperation**: the subscription has no record attached, or a body
///   was requested before anything was cached
/// - **ResourceCreation**: dialog, subscription or contact construction failed
/// - **Transmission**: a request was built but could not be sent
/// - **Configuration**: account or module configuration is unusable
#[derive(Debug, Clone, Error)]
pub enum SlaError {
    /// A required argument was absent
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Human-readable error message
        message: String,
    },

    /// The operation is not valid for the current subscription state
    #[error("Invalid operation: {message}")]
    InvalidOperation {
        /// Human-readable error message
        message: String,
    },

    /// The engine failed to construct a dialog, subscription or contact
    #[error("Failed to {operation}: {source}")]
    ResourceCreation {
        /// Operation that was being attempted
        operation: String,
        /// Status reported by the engine
        #[source]
        source: EngineError,
    },

    /// The engine failed to transmit an already built request
    #[error("Failed to send {operation}: {source}")]
    Transmission {
        /// Request that was being sent
        operation: String,
        /// Status reported by the engine
        #[source]
        source: EngineError,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Configuration {
        /// Human-readable error message
        message: String,
    },
}

impl SlaError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an invalid operation error
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wrap an engine failure that happened while building something
    pub fn resource_creation(operation: impl Into<String>, source: EngineError) -> Self {
        Self::ResourceCreation {
            operation: operation.into(),
            source,
        }
    }

    /// Wrap an engine failure that happened while sending
    pub fn transmission(operation: impl Into<String>, source: EngineError) -> Self {
        Self::Transmission {
            operation: operation.into(),
            source,
        }
    }

    /// Whether a later reconciliation pass could succeed where this failed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ResourceCreation { .. } | Self::Transmission { .. })
    }
}

impl From<toml::de::Error> for SlaError {
    fn from(err: toml::de::Error) -> Self {
        Self::configuration(err.to_string())
    }
}
