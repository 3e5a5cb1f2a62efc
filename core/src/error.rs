use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Audio read failed: {0}")]
    AudioRead(String),
}

pub type Result<T> = std::result::Result<T, ModemError>;
