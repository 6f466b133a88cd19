use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpotlightError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Ingestion run already in progress")]
    RunInProgress,

    #[error("No healthy API keys available")]
    NoHealthyCredentials,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
