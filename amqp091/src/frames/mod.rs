//! AMQP 0-9-1 frame type and corresponding encoder and decoder
//!
//! A frame on the wire is `[type: u8][channel: u16][size: u32][payload][0xCE]`.

use amqp091_types::{
    codec::{LengthPatch, Reader},
    definitions::{
        FRAME_BODY, FRAME_END, FRAME_HEADER, FRAME_HEADER_SIZE, FRAME_HEARTBEAT, FRAME_METHOD,
        FRAME_MIN_SIZE, FRAME_OVERHEAD,
    },
    methods::Method,
    properties::ContentHeader,
    Encode,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

mod error;
pub use error::Error;

/// Payload of a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    /// A method frame
    Method(Method),

    /// A content header frame
    Header(ContentHeader),

    /// A content body frame
    Body(Bytes),

    /// A heartbeat frame, which has no payload
    Heartbeat,
}

impl FrameBody {
    /// The frame type octet
    pub fn frame_type(&self) -> u8 {
        match self {
            FrameBody::Method(_) => FRAME_METHOD,
            FrameBody::Header(_) => FRAME_HEADER,
            FrameBody::Body(_) => FRAME_BODY,
            FrameBody::Heartbeat => FRAME_HEARTBEAT,
        }
    }
}

/// AMQP 0-9-1 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Channel number, zero for connection level frames
    pub channel: u16,

    /// Frame body
    pub body: FrameBody,
}

impl Frame {
    /// Creates a new frame
    pub fn new(channel: impl Into<u16>, body: FrameBody) -> Self {
        Self {
            channel: channel.into(),
            body,
        }
    }

    /// Creates a method frame
    pub fn method(channel: u16, method: impl Into<Method>) -> Self {
        Self::new(channel, FrameBody::Method(method.into()))
    }

    /// Creates a heartbeat frame, which always travels on channel zero
    pub fn heartbeat() -> Self {
        Self::new(0u16, FrameBody::Heartbeat)
    }

    /// Get the channel of the frame
    pub fn channel(&self) -> u16 {
        self.channel
    }

    /// Get the body of the frame
    pub fn body(&self) -> &FrameBody {
        &self.body
    }

    /// Consume the frame to get the frame body
    pub fn into_body(self) -> FrameBody {
        self.body
    }
}

/// Encoder and decoder of frames
///
/// A `max_frame_size` of zero means no limit.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: u32,
}

impl Default for FrameCodec {
    /// Prior to tuning, frames are limited to the protocol's minimum frame-max
    fn default() -> Self {
        Self::new(FRAME_MIN_SIZE)
    }
}

impl FrameCodec {
    /// Creates a codec limited to `max_frame_size` bytes per frame, header and end octet included
    pub fn new(max_frame_size: u32) -> Self {
        Self { max_frame_size }
    }

    /// The frame size limit
    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }

    /// Change the frame size limit, usually after tuning
    pub fn set_max_frame_size(&mut self, max_frame_size: u32) -> &mut Self {
        self.max_frame_size = max_frame_size;
        self
    }

    fn exceeds_limit(&self, payload_size: usize) -> bool {
        self.max_frame_size != 0 && payload_size + FRAME_OVERHEAD > self.max_frame_size as usize
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let start = dst.len();
        match self.encode_frame(&item, dst) {
            Ok(()) => Ok(()),
            Err(err) => {
                dst.truncate(start);
                Err(err)
            }
        }
    }
}

impl FrameCodec {
    fn encode_frame(&self, item: &Frame, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u8(item.body.frame_type());
        dst.put_u16(item.channel);

        let patch = LengthPatch::reserve(dst);
        encode_payload(&item.body, dst)?;
        let size = patch.patch(dst)? as usize;
        if self.exceeds_limit(size) {
            return Err(Error::MaxFrameSizeExceeded);
        }

        dst.put_u8(FRAME_END);
        Ok(())
    }

    /// Whether `frame` can be encoded within the frame size limit
    ///
    /// Method and header payloads are encoded into a scratch buffer, body payloads are
    /// only measured.
    pub fn check(&self, frame: &Frame) -> Result<(), Error> {
        let size = match &frame.body {
            FrameBody::Body(body) => body.len(),
            FrameBody::Heartbeat => 0,
            body => {
                let mut scratch = BytesMut::new();
                encode_payload(body, &mut scratch)?;
                scratch.len()
            }
        };
        if self.exceeds_limit(size) {
            return Err(Error::MaxFrameSizeExceeded);
        }
        Ok(())
    }
}

fn encode_payload(body: &FrameBody, dst: &mut BytesMut) -> Result<(), Error> {
    match body {
        FrameBody::Method(method) => method.encode(dst)?,
        FrameBody::Header(header) => header.encode(dst)?,
        FrameBody::Body(body) => dst.put_slice(body),
        FrameBody::Heartbeat => {}
    }
    Ok(())
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let (frame_type, channel, size) = match parse_header(&src[..], self.max_frame_size) {
            Ok(header) => header,
            Err(Error::Incomplete) => return Ok(None),
            Err(err) => return Err(err),
        };

        let total = FRAME_HEADER_SIZE + size + 1;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total).freeze();
        let end = frame[total - 1];
        if end != FRAME_END {
            return Err(Error::FrameEnd(end));
        }
        frame.advance(FRAME_HEADER_SIZE);
        let payload = frame.split_to(size);

        let body = decode_body(frame_type, payload)?;
        Ok(Some(Frame::new(channel, body)))
    }
}

/// Parse the frame type, channel and payload size from the start of `buf`
fn parse_header(buf: &[u8], max_frame_size: u32) -> Result<(u8, u16, usize), Error> {
    // A server that does not support the requested version replies with its own
    // protocol header and closes the socket
    if buf.first() == Some(&b'A') {
        if buf.len() < 8 {
            return Err(Error::Incomplete);
        }
        if &buf[..4] == b"AMQP" {
            let mut header = [0u8; 8];
            header.copy_from_slice(&buf[..8]);
            return Err(Error::ProtocolHeaderMismatch(header));
        }
    }

    if buf.len() < FRAME_HEADER_SIZE {
        return Err(Error::Incomplete);
    }
    let frame_type = buf[0];
    let channel = u16::from_be_bytes([buf[1], buf[2]]);
    let size = u32::from_be_bytes([buf[3], buf[4], buf[5], buf[6]]) as usize;

    if max_frame_size != 0 && size + FRAME_OVERHEAD > max_frame_size as usize {
        return Err(Error::MaxFrameSizeExceeded);
    }
    Ok((frame_type, channel, size))
}

fn decode_body(frame_type: u8, payload: Bytes) -> Result<FrameBody, Error> {
    match frame_type {
        FRAME_BODY => return Ok(FrameBody::Body(payload)),
        FRAME_HEARTBEAT => return Ok(FrameBody::Heartbeat),
        _ => {}
    }

    let mut reader = Reader::new(&payload);
    let body = match frame_type {
        FRAME_METHOD => FrameBody::Method(reader.read()?),
        FRAME_HEADER => FrameBody::Header(reader.read()?),
        other => return Err(Error::UnknownFrameType(other)),
    };

    match reader.remaining() {
        0 => Ok(body),
        n => Err(amqp091_types::Error::TrailingBytes(n).into()),
    }
}

/// Decode one frame from the start of `buf`
///
/// Returns the frame together with the number of bytes it occupied. Fails with
/// [`Error::Incomplete`] if `buf` does not yet hold a whole frame, in which case the
/// caller should retry once more bytes have arrived.
pub fn parse_frame(buf: &[u8], max_frame_size: u32) -> Result<(Frame, usize), Error> {
    let (frame_type, channel, size) = parse_header(buf, max_frame_size)?;
    let total = FRAME_HEADER_SIZE + size + 1;
    if buf.len() < total {
        return Err(Error::Incomplete);
    }

    let end = buf[total - 1];
    if end != FRAME_END {
        return Err(Error::FrameEnd(end));
    }

    let payload = Bytes::copy_from_slice(&buf[FRAME_HEADER_SIZE..total - 1]);
    let body = decode_body(frame_type, payload)?;
    Ok((Frame::new(channel, body), total))
}
