//! Error types for the traffic analyst.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of a failure, as surfaced to result consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The replay target host could not be resolved.
    NetworkUnresolvable,
    /// The replay timed out.
    NetworkTimeout,
    /// Any other I/O failure while replaying traffic.
    NetworkIo,
    /// The backend answered with something that is not valid JSON.
    MalformedBackendResponse,
    /// A backend exists but is not ready to serve requests.
    BackendUnconfigured,
    /// No backend could be located at all.
    BackendUnavailable,
    /// Catch-all transport or logic failure talking to the backend.
    BackendError,
    /// A persisted encoding could not be decoded. Never surfaced to operators.
    ConfigDecodeFailure,
    /// The configuration store could not be read or written.
    Storage,
    /// The orchestrator no longer accepts work.
    ShutDown,
}

/// A shared error type for the entire analyst workspace.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum AnalystError {
    #[error("Network error: cannot resolve host - {0}")]
    NetworkUnresolvable(String),

    #[error("Network timeout: {0}")]
    NetworkTimeout(String),

    #[error("I/O error: {0}")]
    NetworkIo(String),

    #[error("Response parse error from model: {0}")]
    MalformedBackendResponse(String),

    #[error("Backend not configured: {0}")]
    BackendUnconfigured(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend error: {0}")]
    Backend(String),

    /// Decode failure of a persisted encoding
    #[error("Config decode failure: {format} - {message}")]
    ConfigDecode {
        format: String, // "base64-lines", "JSON", ...
        message: String,
    },

    /// Config store I/O or (de)serialization error
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Analyst is shutting down")]
    ShutDown,
}

impl AnalystError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn unconfigured(message: impl Into<String>) -> Self {
        Self::BackendUnconfigured(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedBackendResponse(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates a ConfigDecode error for the given encoding.
    pub fn decode(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigDecode {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Returns the classification used when the error reaches a result sink.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NetworkUnresolvable(_) => ErrorKind::NetworkUnresolvable,
            Self::NetworkTimeout(_) => ErrorKind::NetworkTimeout,
            Self::NetworkIo(_) => ErrorKind::NetworkIo,
            Self::MalformedBackendResponse(_) => ErrorKind::MalformedBackendResponse,
            Self::BackendUnconfigured(_) => ErrorKind::BackendUnconfigured,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::Backend(_) => ErrorKind::BackendError,
            Self::ConfigDecode { .. } => ErrorKind::ConfigDecodeFailure,
            Self::Storage(_) => ErrorKind::Storage,
            Self::ShutDown => ErrorKind::ShutDown,
        }
    }

    /// Check if the failure happened while replaying traffic
    pub fn is_network(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NetworkUnresolvable | ErrorKind::NetworkTimeout | ErrorKind::NetworkIo
        )
    }
}

impl From<std::io::Error> for AnalystError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(format!("{} (kind: {:?})", err, err.kind()))
    }
}

impl From<serde_json::Error> for AnalystError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode("JSON", err.to_string())
    }
}

impl From<base64::DecodeError> for AnalystError {
    fn from(err: base64::DecodeError) -> Self {
        Self::decode("base64", err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for AnalystError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::decode("utf-8", err.to_string())
    }
}

impl From<toml::de::Error> for AnalystError {
    fn from(err: toml::de::Error) -> Self {
        Self::Storage(format!("TOML parse error: {}", err))
    }
}

impl From<toml::ser::Error> for AnalystError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Storage(format!("TOML serialization error: {}", err))
    }
}

/// A type alias for `Result<T, AnalystError>`.
pub type Result<T> = std::result::Result<T, AnalystError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            AnalystError::unconfigured("no model").kind(),
            ErrorKind::BackendUnconfigured
        );
        assert_eq!(AnalystError::backend("boom").kind(), ErrorKind::BackendError);
        assert_eq!(
            AnalystError::decode("JSON", "eof").kind(),
            ErrorKind::ConfigDecodeFailure
        );
    }

    #[test]
    fn test_network_classification() {
        assert!(AnalystError::NetworkTimeout("slow".into()).is_network());
        assert!(AnalystError::NetworkUnresolvable("nx".into()).is_network());
        assert!(!AnalystError::backend("x").is_network());
    }

    #[test]
    fn test_display_keeps_underlying_message() {
        let err = AnalystError::NetworkUnresolvable("target.invalid".into());
        assert_eq!(
            err.to_string(),
            "Network error: cannot resolve host - target.invalid"
        );
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::BackendUnconfigured).unwrap();
        assert_eq!(json, "\"backend_unconfigured\"");
    }
}
