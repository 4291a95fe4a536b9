use thiserror::Error;

pub type Result<T> = std::result::Result<T, WatcherError>;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Engine error: {0}")]
    Engine(#[from] boardlens_engine::EngineError),

    #[error("Render tree error: {0}")]
    Dom(#[from] boardlens_dom::DomError),

    #[error("Invalid watcher config: {0}")]
    InvalidConfig(String),

    #[error("Board container not found after {0} attempts")]
    ContainerNotFound(u32),

    #[error("{0}")]
    Other(String),
}
