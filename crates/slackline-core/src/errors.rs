use crate::domain::ResourceKind;

/// Core error type for the bot.
///
/// Adapter crates should map their specific errors into this type so the
/// application core can handle failures consistently (fatal to the connect
/// attempt vs retryable vs fatal to the process).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// A configured resource name that the platform does not know about.
    /// Fatal to the current connect attempt, never to the process.
    #[error("could not resolve {kind} name: {name}")]
    Unresolved { kind: ResourceKind, name: String },

    #[error("not connected")]
    NotConnected,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
