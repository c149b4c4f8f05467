//! Error types for the AzureRM provider.

use thiserror::Error;

use crate::arm::ArmError;

/// Errors that can occur while serving a provider request.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A resource operation was called before `Configure`.
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// A state or config value did not decode into the resource's types.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Converting configuration into API objects failed.
    #[error("Error Building list of {what}: {reason}")]
    Expand {
        /// The collection being built, e.g. "Load Balancing Rules".
        what: &'static str,
        /// Why the conversion failed.
        reason: String,
    },

    /// A call to Azure Resource Manager failed.
    #[error("{context}: {source}")]
    Azure {
        /// What the provider was doing when the call failed.
        context: String,
        /// The underlying ARM failure.
        #[source]
        source: ArmError,
    },

    /// Azure accepted a request but the response lacked data the provider needs.
    #[error("{0}")]
    MissingAttribute(String),
}

impl ProviderError {
    /// Wrap an ARM failure with a description of the operation.
    pub fn azure(context: impl Into<String>, source: ArmError) -> Self {
        Self::Azure {
            context: context.into(),
            source,
        }
    }

    /// Get the error message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::NotConfigured(msg)
            | Self::MissingAttribute(msg) => msg.clone(),
            Self::Serialization(err) => err.to_string(),
            Self::Transport(err) => err.to_string(),
            Self::Expand { .. } | Self::Azure { .. } => self.to_string(),
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::NotConfigured(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            },
            err @ ProviderError::Expand { .. } => tonic::Status::invalid_argument(err.to_string()),
            ProviderError::MissingAttribute(msg) => tonic::Status::internal(msg),
            ProviderError::Azure { context, source } => {
                let msg = format!("{}: {}", context, source);
                match source.status() {
                    Some(404) => tonic::Status::not_found(msg),
                    Some(401) | Some(403) => tonic::Status::permission_denied(msg),
                    Some(409) => tonic::Status::already_exists(msg),
                    Some(429) => tonic::Status::resource_exhausted(msg),
                    Some(400) => tonic::Status::invalid_argument(msg),
                    Some(s) if s >= 500 => tonic::Status::unavailable(msg),
                    _ => match source {
                        ArmError::Timeout(_) => tonic::Status::deadline_exceeded(msg),
                        ArmError::Authentication(_) => tonic::Status::unauthenticated(msg),
                        _ => tonic::Status::internal(msg),
                    },
                }
            },
        }
    }
}
