use std::io;

/// Errors raised while encoding or decoding frames
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying I/O error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// Not enough bytes buffered to decode a whole frame
    #[error("Incomplete frame")]
    Incomplete,

    /// The octet following the payload is not the frame end marker
    #[error("Invalid frame end octet {0:#04x}")]
    FrameEnd(u8),

    /// The frame is larger than the negotiated frame-max
    #[error("Max frame size exceeded")]
    MaxFrameSizeExceeded,

    /// Unknown frame type octet
    #[error("Unknown frame type {0}")]
    UnknownFrameType(u8),

    /// The frame payload could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(#[from] amqp091_types::Error),

    /// The peer answered with a protocol header instead of a frame, which is how a server
    /// rejects the protocol version a client asked for
    #[error("Protocol header mismatch {0:?}")]
    ProtocolHeaderMismatch([u8; 8]),
}
