//! The protocol header exchanged before the first frame

use amqp091_types::definitions::{MAJOR, MINOR, REVISION};

const PROTOCOL_NAME: &[u8; 4] = b"AMQP";

/// The eight octets a client sends before any frame
///
/// `"AMQP"` followed by a zero and the major, minor and revision numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolHeader {
    /// Major protocol version
    pub major: u8,

    /// Minor protocol version
    pub minor: u8,

    /// Protocol revision
    pub revision: u8,
}

impl Default for ProtocolHeader {
    fn default() -> Self {
        Self::amqp091()
    }
}

impl ProtocolHeader {
    /// Creates a protocol header
    pub fn new(major: u8, minor: u8, revision: u8) -> Self {
        Self {
            major,
            minor,
            revision,
        }
    }

    /// Header of AMQP 0-9-1
    pub fn amqp091() -> Self {
        Self::new(MAJOR, MINOR, REVISION)
    }
}

impl From<ProtocolHeader> for [u8; 8] {
    fn from(value: ProtocolHeader) -> Self {
        [
            PROTOCOL_NAME[0],
            PROTOCOL_NAME[1],
            PROTOCOL_NAME[2],
            PROTOCOL_NAME[3],
            0,
            value.major,
            value.minor,
            value.revision,
        ]
    }
}

impl TryFrom<[u8; 8]> for ProtocolHeader {
    type Error = [u8; 8];

    fn try_from(value: [u8; 8]) -> Result<Self, Self::Error> {
        if &value[..4] != PROTOCOL_NAME || value[4] != 0 {
            return Err(value);
        }
        Ok(Self::new(value[5], value[6], value[7]))
    }
}

impl std::fmt::Display for ProtocolHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AMQP {}-{}-{}", self.major, self.minor, self.revision)
    }
}
