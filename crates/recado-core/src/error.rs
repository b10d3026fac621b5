use thiserror::Error;

/// Top-level error type for Recado.
#[derive(Debug, Error)]
pub enum RecadoError {
    /// Error from the intent-extraction provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from a messaging channel.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Error from the external task store.
    #[error("task store error: {0}")]
    Store(String),

    /// Local persistence (sqlite) error.
    #[error("memory error: {0}")]
    Memory(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
