use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Render tree error: {0}")]
    Dom(#[from] boardlens_dom::DomError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("{0}")]
    Other(String),
}
