use thiserror::Error;

/// Top-level error type for Sagemate.
#[derive(Debug, Error)]
pub enum SagemateError {
    /// Error from the language-model provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from the social network client.
    #[error("channel error: {0}")]
    Channel(String),

    /// The remote service does not offer this capability to our credentials
    /// (e.g. direct messages with an app password lacking chat scope).
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Error while fetching a web page.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagemateError {
    /// Whether this error means the capability is absent rather than
    /// temporarily failing.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}
