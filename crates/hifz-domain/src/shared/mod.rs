use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn from_string(s: &str) -> Self {
                Self(s.to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

define_id!(UserId);
define_id!(SubscriptionId);

/// Error codes for structured error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Session (1xxx)
    AuthRequired = 1001,

    // Remote store (2xxx)
    RemoteConflict = 2001,
    RemoteRejected = 2002,
    NotFound = 2003,

    // Local storage (4xxx)
    StorageCorruption = 4001,
    RepositoryError = 4002,
    SerializationError = 4003,

    // Infrastructure (5xxx)
    InfrastructureError = 5001,
    NetworkUnavailable = 5002,
    TimeoutError = 5003,

    // Validation (6xxx)
    ValidationError = 6001,
}

impl ErrorCode {
    /// Get error code as integer
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get error severity
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ErrorCode::AuthRequired | ErrorCode::RemoteConflict | ErrorCode::NotFound => {
                ErrorSeverity::Info
            }

            ErrorCode::NetworkUnavailable
            | ErrorCode::TimeoutError
            | ErrorCode::StorageCorruption
            | ErrorCode::RemoteRejected
            | ErrorCode::ValidationError => ErrorSeverity::Warning,

            ErrorCode::RepositoryError
            | ErrorCode::SerializationError
            | ErrorCode::InfrastructureError => ErrorSeverity::Error,
        }
    }

    /// Transient failures that are worth retrying later
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkUnavailable | ErrorCode::TimeoutError | ErrorCode::AuthRequired
        )
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// No signed-in user; sync operations short-circuit with this.
    #[error("Not authenticated")]
    AuthRequired,

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// Insert hit a uniqueness violation. Upserts treat this as success.
    #[error("Remote conflict: {0}")]
    RemoteConflict(String),

    #[error("Remote rejected request with status {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Storage corruption: {0}")]
    StorageCorruption(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl DomainError {
    /// Get error code
    pub fn code(&self) -> ErrorCode {
        match self {
            DomainError::AuthRequired => ErrorCode::AuthRequired,
            DomainError::NetworkUnavailable(_) => ErrorCode::NetworkUnavailable,
            DomainError::RemoteConflict(_) => ErrorCode::RemoteConflict,
            DomainError::Remote { .. } => ErrorCode::RemoteRejected,
            DomainError::StorageCorruption(_) => ErrorCode::StorageCorruption,
            DomainError::Repository(_) => ErrorCode::RepositoryError,
            DomainError::Infrastructure(_) => ErrorCode::InfrastructureError,
            DomainError::Timeout(_) => ErrorCode::TimeoutError,
            DomainError::Validation(_) => ErrorCode::ValidationError,
            DomainError::Serialization(_) => ErrorCode::SerializationError,
            DomainError::NotFound(_) => ErrorCode::NotFound,
        }
    }

    /// Get error message
    pub fn message(&self) -> &str {
        match self {
            DomainError::AuthRequired => "not authenticated",
            DomainError::Remote { message, .. } => message,
            DomainError::NetworkUnavailable(msg)
            | DomainError::RemoteConflict(msg)
            | DomainError::StorageCorruption(msg)
            | DomainError::Repository(msg)
            | DomainError::Infrastructure(msg)
            | DomainError::Timeout(msg)
            | DomainError::Validation(msg)
            | DomainError::Serialization(msg)
            | DomainError::NotFound(msg) => msg,
        }
    }

    /// Get error severity
    pub fn severity(&self) -> ErrorSeverity {
        self.code().severity()
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        self.code().is_recoverable()
    }

    /// Format error with code
    pub fn format_with_code(&self) -> String {
        format!("[{}] {}", self.code().code(), self)
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
