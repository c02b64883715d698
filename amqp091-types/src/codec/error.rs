/// Encoding and decoding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The buffer ended before the value was complete
    #[error("Unexpected end of buffer, {needed} byte(s) needed but only {remaining} left")]
    UnexpectedEnd {
        /// Number of bytes the read asked for
        needed: usize,

        /// Number of bytes left in the buffer
        remaining: usize,
    },

    /// A field value carried a type tag that is not part of the table grammar
    #[error("Unknown field value type {0:#04x}")]
    UnknownFieldType(u8),

    /// The (class-id, method-id) pair is not a known method
    #[error("Unknown method {class_id}.{method_id}")]
    UnknownMethod {
        /// Class id
        class_id: u16,
        /// Method id
        method_id: u16,
    },

    /// A content header carried a class without content
    #[error("Class {0} does not carry content")]
    UnknownContentClass(u16),

    /// A string was not valid UTF-8
    #[error("Invalid UTF-8 encoding")]
    InvalidUtf8,

    /// A short string cannot be longer than 255 bytes
    #[error("Short string of {0} bytes exceeds 255 bytes")]
    ShortStringTooLong(usize),

    /// A length does not fit in its length field
    #[error("Length {0} does not fit in a u32")]
    LengthOverflow(usize),

    /// Field tables or arrays are nested deeper than [`MAX_NESTING_DEPTH`](super::MAX_NESTING_DEPTH)
    #[error("Field tables nested deeper than {0} levels")]
    NestingTooDeep(usize),

    /// Bytes were left over after decoding a structure with a declared size
    #[error("{0} trailing byte(s) after value")]
    TrailingBytes(usize),
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Self::InvalidUtf8
    }
}
