// src/error.rs - Harness and transport error taxonomy

use thiserror::Error;

/// Why a connect attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// Endpoint could not be reached
    Unreachable,
    /// Credentials were rejected by the backend
    AuthRejected,
    /// Required settings were missing or empty
    InvalidConfig,
}

impl std::fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectFailure::Unreachable => "unreachable",
            ConnectFailure::AuthRejected => "auth rejected",
            ConnectFailure::InvalidConfig => "invalid config",
        };
        f.write_str(label)
    }
}

/// Coarse error category used in run reports and metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Config,
    Connect,
    Schema,
    Write,
    Read,
    Cancelled,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Config => "config",
            ErrorCategory::Connect => "connect",
            ErrorCategory::Schema => "schema",
            ErrorCategory::Write => "write",
            ErrorCategory::Read => "read",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::Internal => "internal",
        }
    }
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connect error ({failure}): {message}")]
    Connect {
        failure: ConnectFailure,
        message: String,
    },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Write error for record {record_id}: {message}")]
    Write { record_id: String, message: String },

    #[error("Read error: {0}")]
    Read(String),

    #[error("Operation '{operation}' requires a connected session")]
    NotConnected { operation: &'static str },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Illegal run state transition {from} -> {to}")]
    IllegalTransition { from: &'static str, to: &'static str },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HarnessError {
    pub fn connect(failure: ConnectFailure, message: impl Into<String>) -> Self {
        HarnessError::Connect {
            failure,
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::connect(ConnectFailure::InvalidConfig, message)
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            HarnessError::Config(_) => ErrorCategory::Config,
            HarnessError::Connect { .. } => ErrorCategory::Connect,
            HarnessError::Schema(_) => ErrorCategory::Schema,
            HarnessError::Write { .. } => ErrorCategory::Write,
            HarnessError::Read(_) => ErrorCategory::Read,
            HarnessError::Cancelled => ErrorCategory::Cancelled,
            HarnessError::NotConnected { .. }
            | HarnessError::Transport(_)
            | HarnessError::Serialization(_)
            | HarnessError::IllegalTransition { .. } => ErrorCategory::Internal,
        }
    }

    /// Fatal errors stop a backend's run before verification
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Config | ErrorCategory::Connect | ErrorCategory::Schema
        )
    }
}

/// Errors surfaced by transport collaborators (SDK/REST/simulated clients)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("credentials rejected: {0}")]
    AuthRejected(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("client misconfigured: {0}")]
    Misconfigured(String),
}

impl TransportError {
    /// Map a transport failure raised while opening a session
    pub fn into_connect_error(self) -> HarnessError {
        match self {
            TransportError::Unreachable(msg) => {
                HarnessError::connect(ConnectFailure::Unreachable, msg)
            }
            TransportError::AuthRejected(msg) => {
                HarnessError::connect(ConnectFailure::AuthRejected, msg)
            }
            TransportError::Misconfigured(msg) => {
                HarnessError::connect(ConnectFailure::InvalidConfig, msg)
            }
            other => HarnessError::connect(ConnectFailure::Unreachable, other.to_string()),
        }
    }

    /// Map a transport failure raised while preparing a namespace
    pub fn into_schema_error(self, namespace: &str) -> HarnessError {
        HarnessError::Schema(format!("namespace '{}': {}", namespace, self))
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
