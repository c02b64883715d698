//! Protocol constants of AMQP 0-9-1

mod reply_code;
pub use reply_code::ReplyCode;

/// The IANA assigned port number for AMQP
pub const PORT: u16 = 5672;

/// The IANA assigned port number for AMQP over TLS
pub const SECURE_PORT: u16 = 5671;

/// major protocol version
pub const MAJOR: u8 = 0;

/// minor protocol version
pub const MINOR: u8 = 9;

/// protocol revision
pub const REVISION: u8 = 1;

/// Protocol header sent by the client before anything else: "AMQP" 0 0 9 1
pub const PROTOCOL_HEADER: [u8; 8] = [b'A', b'M', b'Q', b'P', 0, MAJOR, MINOR, REVISION];

/// Frame type of a method frame
pub const FRAME_METHOD: u8 = 1;

/// Frame type of a content header frame
pub const FRAME_HEADER: u8 = 2;

/// Frame type of a content body frame
pub const FRAME_BODY: u8 = 3;

/// Frame type of a heartbeat frame
pub const FRAME_HEARTBEAT: u8 = 8;

/// Octet terminating every frame
pub const FRAME_END: u8 = 0xCE;

/// Size of the frame header: type (1), channel (2), payload size (4)
pub const FRAME_HEADER_SIZE: usize = 7;

/// Bytes a frame adds around its payload: header plus the end octet
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_SIZE + 1;

/// The smallest frame-max a peer may negotiate
pub const FRAME_MIN_SIZE: u32 = 4096;

/// Class id of the Connection class
pub const CLASS_CONNECTION: u16 = 10;

/// Class id of the Channel class
pub const CLASS_CHANNEL: u16 = 20;

/// Class id of the Exchange class
pub const CLASS_EXCHANGE: u16 = 40;

/// Class id of the Queue class
pub const CLASS_QUEUE: u16 = 50;

/// Class id of the Basic class
pub const CLASS_BASIC: u16 = 60;

/// Channel number reserved for connection level traffic
pub const CONTROL_CHANNEL: u16 = 0;

/// A delivery tag assigned by the broker per channel
pub type DeliveryTag = u64;
