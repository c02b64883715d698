//! Implements errors associated with the connection

use std::io;

use amqp091_types::{definitions::ReplyCode, methods::MethodId};
use tokio::task::JoinError;

use crate::{frames, transport};

/// Errors associated with a running [`crate::Connection`]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// The byte stream could not be framed or decoded
    #[error(transparent)]
    Framing(frames::Error),

    /// Nothing was heard from the server for twice the heartbeat interval
    #[error("Idle timeout")]
    IdleTimeout,

    /// This could occur only when the user attempts to close the connection
    #[error(transparent)]
    JoinError(JoinError),

    /// The connection was closed before
    #[error("Connection is already closed")]
    AlreadyClosed,

    /// The server closed the connection
    #[error("Connection closed by the server: {code} {text}")]
    Remote {
        /// Reply code sent by the server
        code: ReplyCode,

        /// Reply text sent by the server
        text: String,
    },

    /// The server broke the protocol and the connection was closed with the given code
    #[error("Protocol violation: {code} {text}")]
    Local {
        /// Reply code sent to the server
        code: ReplyCode,

        /// Reply text sent to the server
        text: String,
    },
}

impl From<transport::Error> for Error {
    fn from(err: transport::Error) -> Self {
        match err {
            transport::Error::Frame(frames::Error::Io(err)) => Self::Io(err),
            transport::Error::Frame(err) => Self::Framing(err),
            transport::Error::IdleTimeout => Self::IdleTimeout,
        }
    }
}

/// Error associated with opening a connection
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// Error parsing the url
    #[error(transparent)]
    UrlError(#[from] url::ParseError),

    /// Only "amqp" is supported by [`Builder::open`](super::Builder::open). TLS streams
    /// go through [`Builder::open_with_stream`](super::Builder::open_with_stream).
    #[error(r#"Invalid scheme. Only "amqp" is supported."#)]
    InvalidScheme,

    /// The server does not speak AMQP 0-9-1 and answered with its own protocol header
    #[error("Protocol header mismatch. Found {0:?}")]
    ProtocolHeaderMismatch([u8; 8]),

    /// The byte stream could not be framed or decoded
    #[error(transparent)]
    Framing(frames::Error),

    /// Nothing was heard from the server for too long
    #[error("Idle timeout")]
    IdleTimeout,

    /// The server does not offer the SASL mechanism of the profile
    #[error("SASL mechanism {mechanism} is not offered by the server (offered: {offered:?})")]
    MechanismNotSupported {
        /// Mechanism of the profile
        mechanism: &'static str,

        /// Mechanisms offered by the server
        offered: String,
    },

    /// The server sent a different method than the one the handshake expects
    #[error("Expected {expected} but found {found}")]
    UnexpectedMethod {
        /// The method the handshake was waiting for
        expected: MethodId,

        /// The method that arrived
        found: MethodId,
    },

    /// The server sent a content or heartbeat frame where a method was expected
    #[error("Unexpected frame of type {frame_type} on channel {channel}")]
    UnexpectedFrame {
        /// Channel of the frame
        channel: u16,

        /// Frame type
        frame_type: u8,
    },

    /// The server closed the connection during the handshake, eg. because of wrong
    /// credentials or an unknown virtual host
    #[error("Connection closed by the server: {code} {text}")]
    RemoteClosed {
        /// Reply code sent by the server
        code: ReplyCode,

        /// Reply text sent by the server
        text: String,
    },
}

impl From<transport::Error> for OpenError {
    fn from(err: transport::Error) -> Self {
        match err {
            transport::Error::Frame(frames::Error::Io(err)) => Self::Io(err),
            transport::Error::Frame(frames::Error::ProtocolHeaderMismatch(buf)) => {
                Self::ProtocolHeaderMismatch(buf)
            }
            transport::Error::Frame(err) => Self::Framing(err),
            transport::Error::IdleTimeout => Self::IdleTimeout,
        }
    }
}
