use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `append` was called for a user whose transcript was never created.
    #[error("session not found: {user}")]
    NotFound { user: String },
}

pub type Result<T> = std::result::Result<T, SessionError>;
