use thiserror::Error;

#[derive(Debug, Error)]
pub enum FortecError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

impl FortecError {
    /// Short error code string for log correlation.
    pub fn code(&self) -> &'static str {
        match self {
            FortecError::Config(_) => "CONFIG_ERROR",
            FortecError::InvalidConfig { .. } => "INVALID_CONFIG",
        }
    }
}

pub type Result<T> = std::result::Result<T, FortecError>;
