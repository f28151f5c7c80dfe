use std::io;

/// Errors surfaced by the framing codec and the wire types built on top of it.
///
/// A [`ProtocolError`] always terminates the *current connection*, never the
/// process.
#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed")]
    Eof,

    #[error("frame length {0} exceeds maximum {1}")]
    FrameTooLarge(u32, u32),

    #[error("frame length is zero")]
    EmptyFrame,

    #[error("invalid UTF-8 in frame payload: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("read cancelled")]
    Cancelled,
}

impl ProtocolError {
    /// True for the transport-level conditions that amount to a clean
    /// per-connection disconnect rather than a loggable failure.
    pub fn is_clean_disconnect(&self) -> bool {
        match self {
            ProtocolError::Eof => true,
            ProtocolError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
