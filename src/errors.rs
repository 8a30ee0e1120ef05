use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error produced by rule factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("An error occurred deserializing authorization settings: {0}")]
    Deserializing(#[from] serde_json::Error),

    #[error("Invalid authorization configuration: {0}")]
    Configuration(String),

    #[error("Unable to apply security to event of type {0}")]
    Classification(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Failed to build the authorization rule list")]
    ChainBuild(#[source] BoxError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Status code reported to the client for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Forbidden(_) => 403,
            Error::InvalidRequest(_) => 400,
            Error::Deserializing(_)
            | Error::Configuration(_)
            | Error::Classification(_)
            | Error::ChainBuild(_) => 500,
        }
    }
}
