use crate::frames;

/// Errors raised by the transport
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Framing or I/O error
    #[error(transparent)]
    Frame(#[from] frames::Error),

    /// Nothing was received from the peer for longer than the idle timeout
    #[error("Idle timeout")]
    IdleTimeout,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Frame(frames::Error::Io(err))
    }
}
