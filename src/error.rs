use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the search engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No actions available from node '{node}'")]
    NoActionsAvailable { node: String },

    #[error("Value store failure: {message}")]
    Persistence { message: String },

    #[error("Search cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Invalid feedback: {message}")]
    InvalidFeedback { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Node not found: {node}")]
    NodeNotFound { node: String },

    #[error("IO error: {source}")]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    #[error("Parse error: {message}")]
    Parse { message: String },
}

impl EngineError {
    /// Create a dead-end error for the given node
    pub fn no_actions(node: impl Into<String>) -> Self {
        Self::NoActionsAvailable { node: node.into() }
    }

    /// Create a new persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Create a new invalid feedback error
    pub fn invalid_feedback(message: impl Into<String>) -> Self {
        Self::InvalidFeedback {
            message: message.into(),
        }
    }

    /// Create a new invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a new node-not-found error
    pub fn node_not_found(node: impl Into<String>) -> Self {
        Self::NodeNotFound { node: node.into() }
    }

    /// Create a new IO error with path context
    pub fn io_error(err: std::io::Error, path: Option<impl Into<PathBuf>>) -> Self {
        Self::Io {
            source: err,
            path: path.map(|p| p.into()),
        }
    }

    /// Create a new parse error
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Whether a search should end locally with its partial result instead
    /// of surfacing this error to the caller
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::NoActionsAvailable { .. }
                | EngineError::Cancelled
                | EngineError::DeadlineExceeded
        )
    }

    /// Short machine-readable label, used in logs and result metadata
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NoActionsAvailable { .. } => "no_actions_available",
            EngineError::Persistence { .. } => "persistence",
            EngineError::Cancelled => "cancelled",
            EngineError::DeadlineExceeded => "deadline_exceeded",
            EngineError::InvalidFeedback { .. } => "invalid_feedback",
            EngineError::InvalidArgument { .. } => "invalid_argument",
            EngineError::NodeNotFound { .. } => "node_not_found",
            EngineError::Io { .. } => "io",
            EngineError::Parse { .. } => "parse",
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(error: rusqlite::Error) -> Self {
        EngineError::persistence(error.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(error: std::io::Error) -> Self {
        EngineError::io_error(error, None::<PathBuf>)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(error: serde_json::Error) -> Self {
        EngineError::parse_error(error.to_string())
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(error: serde_yaml::Error) -> Self {
        EngineError::parse_error(error.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(error: toml::de::Error) -> Self {
        EngineError::parse_error(error.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(error: toml::ser::Error) -> Self {
        EngineError::parse_error(error.to_string())
    }
}

/// Result type alias using EngineError
pub type EngineResult<T> = Result<T, EngineError>;

/// Extension trait for attaching context to foreign errors
pub trait ErrorExt<T> {
    /// Convert into a persistence error with added context
    fn persistence_context(self, message: impl AsRef<str>) -> EngineResult<T>;
}

impl<T, E: fmt::Display> ErrorExt<T> for Result<T, E> {
    fn persistence_context(self, message: impl AsRef<str>) -> EngineResult<T> {
        self.map_err(|e| EngineError::persistence(format!("{}: {}", message.as_ref(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(EngineError::no_actions("a").is_recoverable());
        assert!(EngineError::Cancelled.is_recoverable());
        assert!(EngineError::DeadlineExceeded.is_recoverable());
        assert!(!EngineError::persistence("disk full").is_recoverable());
        assert!(!EngineError::invalid_feedback("bad").is_recoverable());
    }

    #[test]
    fn test_persistence_context() {
        let result: Result<(), String> = Err("locked".to_string());
        let err = result.persistence_context("Failed to write").unwrap_err();
        assert_eq!(err.kind(), "persistence");
        assert_eq!(err.to_string(), "Value store failure: Failed to write: locked");
    }
}
