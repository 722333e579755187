use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Invalid router configuration: {0}")]
    InvalidConfig(String),

    #[error("No retrieval strategy is enabled")]
    NoEnabledStrategy,

    #[error("Invalid routing pattern: {0}")]
    Pattern(#[from] regex_lite::Error),
}

pub type Result<T> = std::result::Result<T, RouterError>;
