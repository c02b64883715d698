use std::fmt::Display;

/// Reply codes carried by `Connection.Close` and `Channel.Close`
///
/// Codes below 300 indicate success, channel-level (soft) errors close only the
/// channel, connection-level (hard) errors close the whole connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyCode {
    /// 200, the method completed successfully
    Success,

    /// 311, the client tried to transfer content larger than the server could accept
    ContentTooLarge,

    /// 312, a mandatory message could not be routed
    NoRoute,

    /// 313, an immediate message had no consumer
    NoConsumers,

    /// 320, an operator intervened to close the connection
    ConnectionForced,

    /// 402, the client tried to work with an unknown virtual host
    InvalidPath,

    /// 403, the client tried to work with a resource it has no access to
    AccessRefused,

    /// 404, the client asked for a resource that does not exist
    NotFound,

    /// 405, the resource is locked by another client
    ResourceLocked,

    /// 406, the client requested a method that was not allowed because a precondition failed
    PreconditionFailed,

    /// 501, the sender sent a malformed frame
    FrameError,

    /// 502, the sender sent a frame with illegal values
    SyntaxError,

    /// 503, the client sent an invalid sequence of frames
    CommandInvalid,

    /// 504, the client attempted to work with a channel that had not been correctly opened
    ChannelError,

    /// 505, the peer sent a frame that was not expected
    UnexpectedFrame,

    /// 506, the server could not complete the method because it lacked resources
    ResourceError,

    /// 530, the client tried to work with some entity in a manner that is prohibited
    NotAllowed,

    /// 540, the client tried to use functionality that is not implemented
    NotImplemented,

    /// 541, the server could not complete the method because of an internal error
    InternalError,

    /// Any code not listed above
    Other(u16),
}

impl ReplyCode {
    /// The numeric value on the wire
    pub fn code(&self) -> u16 {
        match self {
            ReplyCode::Success => 200,
            ReplyCode::ContentTooLarge => 311,
            ReplyCode::NoRoute => 312,
            ReplyCode::NoConsumers => 313,
            ReplyCode::ConnectionForced => 320,
            ReplyCode::InvalidPath => 402,
            ReplyCode::AccessRefused => 403,
            ReplyCode::NotFound => 404,
            ReplyCode::ResourceLocked => 405,
            ReplyCode::PreconditionFailed => 406,
            ReplyCode::FrameError => 501,
            ReplyCode::SyntaxError => 502,
            ReplyCode::CommandInvalid => 503,
            ReplyCode::ChannelError => 504,
            ReplyCode::UnexpectedFrame => 505,
            ReplyCode::ResourceError => 506,
            ReplyCode::NotAllowed => 530,
            ReplyCode::NotImplemented => 540,
            ReplyCode::InternalError => 541,
            ReplyCode::Other(code) => *code,
        }
    }

    /// The upper-case name used as reply text by RabbitMQ
    pub fn name(&self) -> &'static str {
        match self {
            ReplyCode::Success => "SUCCESS",
            ReplyCode::ContentTooLarge => "CONTENT_TOO_LARGE",
            ReplyCode::NoRoute => "NO_ROUTE",
            ReplyCode::NoConsumers => "NO_CONSUMERS",
            ReplyCode::ConnectionForced => "CONNECTION_FORCED",
            ReplyCode::InvalidPath => "INVALID_PATH",
            ReplyCode::AccessRefused => "ACCESS_REFUSED",
            ReplyCode::NotFound => "NOT_FOUND",
            ReplyCode::ResourceLocked => "RESOURCE_LOCKED",
            ReplyCode::PreconditionFailed => "PRECONDITION_FAILED",
            ReplyCode::FrameError => "FRAME_ERROR",
            ReplyCode::SyntaxError => "SYNTAX_ERROR",
            ReplyCode::CommandInvalid => "COMMAND_INVALID",
            ReplyCode::ChannelError => "CHANNEL_ERROR",
            ReplyCode::UnexpectedFrame => "UNEXPECTED_FRAME",
            ReplyCode::ResourceError => "RESOURCE_ERROR",
            ReplyCode::NotAllowed => "NOT_ALLOWED",
            ReplyCode::NotImplemented => "NOT_IMPLEMENTED",
            ReplyCode::InternalError => "INTERNAL_ERROR",
            ReplyCode::Other(_) => "UNKNOWN",
        }
    }

    /// Whether the code closes the whole connection
    pub fn is_hard_error(&self) -> bool {
        matches!(
            self,
            ReplyCode::ConnectionForced
                | ReplyCode::InvalidPath
                | ReplyCode::FrameError
                | ReplyCode::SyntaxError
                | ReplyCode::CommandInvalid
                | ReplyCode::ChannelError
                | ReplyCode::UnexpectedFrame
                | ReplyCode::ResourceError
                | ReplyCode::NotAllowed
                | ReplyCode::NotImplemented
                | ReplyCode::InternalError
        )
    }
}

impl From<u16> for ReplyCode {
    fn from(code: u16) -> Self {
        match code {
            200 => ReplyCode::Success,
            311 => ReplyCode::ContentTooLarge,
            312 => ReplyCode::NoRoute,
            313 => ReplyCode::NoConsumers,
            320 => ReplyCode::ConnectionForced,
            402 => ReplyCode::InvalidPath,
            403 => ReplyCode::AccessRefused,
            404 => ReplyCode::NotFound,
            405 => ReplyCode::ResourceLocked,
            406 => ReplyCode::PreconditionFailed,
            501 => ReplyCode::FrameError,
            502 => ReplyCode::SyntaxError,
            503 => ReplyCode::CommandInvalid,
            504 => ReplyCode::ChannelError,
            505 => ReplyCode::UnexpectedFrame,
            506 => ReplyCode::ResourceError,
            530 => ReplyCode::NotAllowed,
            540 => ReplyCode::NotImplemented,
            541 => ReplyCode::InternalError,
            other => ReplyCode::Other(other),
        }
    }
}

impl From<ReplyCode> for u16 {
    fn from(code: ReplyCode) -> Self {
        code.code()
    }
}

impl Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.name())
    }
}
