use reqwest::StatusCode;
use thiserror::Error;

use crate::client::storage::MountSpecError;
use crate::client::types::ExecuteResult;

#[derive(Error, Debug)]
pub enum AgsError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    // Capability errors
    #[error("{operation} is not supported by the {backend} backend, please use the {alternative} backend")]
    Unsupported {
        operation: &'static str,
        backend: &'static str,
        alternative: &'static str,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    // Input validation errors
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    #[error(transparent)]
    MountSpec(#[from] MountSpecError),

    // Remote call errors
    #[error("{context}: {status} - {body}")]
    Api {
        context: String,
        status: StatusCode,
        body: String,
    },

    #[error("[{code}] {message} (action: {action}, request id: {request_id})")]
    CloudApi {
        action: String,
        code: String,
        message: String,
        request_id: String,
    },

    #[error("failed to decode response from {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("response from {context} is missing {field}")]
    IncompleteResponse {
        context: String,
        field: &'static str,
    },

    /// The execution stream broke before the service closed it. `partial`
    /// holds what was decoded up to that point.
    #[error("execution stream interrupted: {reason}")]
    StreamInterrupted {
        reason: String,
        partial: Box<ExecuteResult>,
    },

    #[error("Request signing failed: {0}")]
    Signing(String),

    #[error("{operation} was cancelled")]
    Cancelled { operation: &'static str },

    #[error("{operation} exceeded its deadline of {seconds} seconds")]
    DeadlineExceeded { operation: &'static str, seconds: u64 },

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<AgsError>,
    },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AgsError {
    /// Wrap this error with the remote call it came from.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any call-context wrappers.
    pub fn root(&self) -> &AgsError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self.root(), Self::Unsupported { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound { .. })
    }

    /// Output decoded before the execution stream broke, if that is what
    /// this error is.
    pub fn partial_output(&self) -> Option<&ExecuteResult> {
        match self.root() {
            Self::StreamInterrupted { partial, .. } => Some(partial.as_ref()),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.root(),
            Self::Cancelled { .. } | Self::DeadlineExceeded { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AgsError>;
