use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscacheError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Translation API key not set")]
    MissingApiKey,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Translation task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl TranscacheError {
    /// Whether this failure means the provider has no usable credential.
    pub fn is_missing_credential(&self) -> bool {
        matches!(self, TranscacheError::MissingApiKey)
    }
}

pub type Result<T> = std::result::Result<T, TranscacheError>;
