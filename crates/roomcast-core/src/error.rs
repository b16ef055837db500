use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoomcastError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RoomcastError {
    /// Short error code string, suitable for client-facing error frames.
    pub fn code(&self) -> &'static str {
        match self {
            RoomcastError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, RoomcastError>;
