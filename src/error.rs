use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Error: {status} - {message}")]
    RemoteApi { status: u16, message: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("Usage is empty.")]
    EmptyResult,

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

impl AppError {
    pub fn missing_credentials() -> Self {
        AppError::Validation("Please enter both Organization ID and API Key.".into())
    }

    /// Network or decode failures that never produced a usable response.
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Transport(_))
    }
}
