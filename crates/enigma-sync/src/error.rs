use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("storage")]
    Storage,
    #[error("transport {0}")]
    Transport(String),
    #[error("feed {0}")]
    Feed(String),
    #[error("delivery {0}")]
    Delivery(String),
    #[error("config {0}")]
    Config(String),
    #[error("not found")]
    NotFound,
}
