use thiserror::Error;

/// Errors surfaced by the tablewire client.
#[derive(Debug, Error)]
pub enum Error {
    /// A column value (or value class) the codec cannot encode
    #[error("type error in column '{column}': unsupported value of type {found}")]
    Type { column: String, found: String },

    /// A malformed or unrecognized wire message
    #[error("message error: {0}")]
    Message(String),

    /// Encode-side failure while preparing a write
    #[error("write error: {0}")]
    Write(String),

    /// Decode-side or server-signaled failure while reading
    #[error("read error: {0}")]
    Read(String),

    /// gRPC status from the remote store
    #[error("transport error: {0}")]
    Transport(#[from] tonic::Status),

    /// Connection establishment failure
    #[error("connection error: {0}")]
    Connection(String),

    /// Configuration error (missing env vars, invalid URIs, bad credentials)
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether a retry can reasonably be expected to succeed. Only
    /// connection-level trouble qualifies; codec and server-logic errors
    /// fail immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(status) => matches!(
                status.code(),
                tonic::Code::Unavailable | tonic::Code::ResourceExhausted
            ),
            _ => false,
        }
    }
}

impl From<polars::error::PolarsError> for Error {
    fn from(err: polars::error::PolarsError) -> Self {
        Error::Message(err.to_string())
    }
}

/// Type alias for Results using tablewire's Error
pub type Result<T> = std::result::Result<T, Error>;
