//! Error types for Assist Core
//!
//! Request-facing failures (validation, duplicates) carry the message that is
//! shown to the user; infrastructure failures wrap their source.

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, AssistError>;

/// Main error type for core operations
#[derive(Error, Debug)]
pub enum AssistError {
    /// Input rejected before any work was done
    #[error("{0}")]
    Validation(String),

    /// Username already taken
    #[error("Usuário já existe")]
    DuplicateUser(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AssistError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// True for errors caused by the caller's input rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::DuplicateUser(_))
    }
}

impl From<argon2::password_hash::Error> for AssistError {
    fn from(e: argon2::password_hash::Error) -> Self {
        AssistError::PasswordHash(e.to_string())
    }
}

impl From<tokio::task::JoinError> for AssistError {
    fn from(e: tokio::task::JoinError) -> Self {
        AssistError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(AssistError::validation("Pergunta vazia").is_client_error());
        assert!(AssistError::DuplicateUser("ana".into()).is_client_error());
        assert!(!AssistError::config("PORT").is_client_error());
    }

    #[test]
    fn test_duplicate_message_is_user_facing() {
        let err = AssistError::DuplicateUser("ana".into());
        assert_eq!(err.to_string(), "Usuário já existe");
    }
}
