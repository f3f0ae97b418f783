//! Error types for the xyz provider.

use thiserror::Error;

/// Errors that can occur while serving the provider or constructing resources.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred (e.g. the resource monitor is unreachable).
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The host's resource monitor rejected a call.
    ///
    /// The host status is kept as-is so it can be surfaced unchanged.
    #[error("Resource monitor error: {0}")]
    Monitor(#[from] tonic::Status),

    /// A registered resource did not report an expected output.
    #[error("Invalid resource output: {0}")]
    Output(String),

    /// Invalid request from client.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Transport(_err) => "transport error (see Debug output)",
            Self::Monitor(status) => status.message(),
            Self::Output(msg) => msg,
            Self::InvalidRequest(msg) => msg,
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            },
            ProviderError::Monitor(status) => status,
            ProviderError::Output(msg) => tonic::Status::internal(msg),
            ProviderError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
        }
    }
}
