use amqp091_types::{definitions::ReplyCode, methods::MethodId};

use crate::frames;

use super::content::ContentError;

/// Errors of channel operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The server closed the channel while the call was waiting for its reply
    #[error("Channel closed by the server: {code} {text}")]
    ChannelClosed {
        /// Reply code sent by the server
        code: ReplyCode,

        /// Reply text sent by the server
        text: String,
    },

    /// The connection closed while the call was waiting for its reply
    #[error("Connection closed")]
    ConnectionClosed,

    /// The channel is not open. Nothing was sent.
    #[error("Operation on a closed channel")]
    OperationOnClosedChannel,

    /// The connection is not open. Nothing was sent.
    #[error("Operation on a closed connection")]
    OperationOnClosedConnection,

    /// The server replied with a different method than the one the call expects. The
    /// channel stays usable.
    #[error("Expected reply {expected} but found {found}")]
    UnexpectedReply {
        /// The reply the call was waiting for
        expected: MethodId,

        /// The reply that arrived
        found: MethodId,
    },

    /// Every channel number allowed by the negotiated channel-max is used up
    #[error("Channel max reached")]
    ChannelMaxReached,

    /// No consumer with this tag is registered on the channel
    #[error("Consumer {0:?} not found")]
    ConsumerNotFound(String),

    /// An argument cannot be put on the wire, eg. a short string longer than 255 bytes.
    /// Nothing was sent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(amqp091_types::Error),

    /// A method or content header frame would exceed the negotiated frame-max. Nothing
    /// was sent.
    #[error("Frame exceeds the negotiated frame max")]
    FrameTooLarge,
}

impl From<frames::Error> for Error {
    fn from(err: frames::Error) -> Self {
        match err {
            frames::Error::Codec(err) => Self::InvalidArgument(err),
            _ => Self::FrameTooLarge,
        }
    }
}

/// A frame that breaks the protocol badly enough that the connection has to be closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProtocolViolation {
    pub code: ReplyCode,
    pub text: String,
    pub method: Option<MethodId>,
}

impl ProtocolViolation {
    pub fn new(code: ReplyCode, text: impl Into<String>, method: Option<MethodId>) -> Self {
        Self {
            code,
            text: text.into(),
            method,
        }
    }

    /// A reply arrived while no call was waiting for one
    pub fn unsolicited(found: MethodId) -> Self {
        Self::new(
            ReplyCode::UnexpectedFrame,
            format!("UNEXPECTED_FRAME - no call is waiting for method {}", found),
            Some(found),
        )
    }
}

impl From<ContentError> for ProtocolViolation {
    fn from(err: ContentError) -> Self {
        Self::new(
            ReplyCode::UnexpectedFrame,
            format!("UNEXPECTED_FRAME - {}", err),
            None,
        )
    }
}
