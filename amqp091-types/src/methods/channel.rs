//! Channel class (20): opening, flow control and closing of channels

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    codec::{put_long_str, put_short_str, Decode, Encode, Error, Reader},
    definitions::{ReplyCode, CLASS_CHANNEL},
};

use super::MethodId;

class_methods! {
    /// Methods of the Channel class
    pub enum ChannelMethod in Channel = CLASS_CHANNEL {
        /// Channel.Open
        Open = 10,
        /// Channel.OpenOk
        OpenOk = 11,
        /// Channel.Flow
        Flow = 20,
        /// Channel.FlowOk
        FlowOk = 21,
        /// Channel.Close
        Close = 40,
        /// Channel.CloseOk
        CloseOk = 41,
    }
}

/// Open a channel for use
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Open {
    /// Reserved short string (formerly out-of-band)
    pub reserved_1: String,
}

impl Encode for Open {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        put_short_str(dst, &self.reserved_1)
    }
}

impl Decode for Open {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            reserved_1: src.get_short_str()?,
        })
    }
}

/// Signal that the channel is ready
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOk {
    /// Reserved long string (formerly channel-id)
    pub reserved_1: Bytes,
}

impl Encode for OpenOk {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        put_long_str(dst, &self.reserved_1)
    }
}

impl Decode for OpenOk {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            reserved_1: src.get_long_bytes()?,
        })
    }
}

/// Ask the peer to pause or restart the flow of content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flow {
    /// Start (true) or stop (false) sending content
    pub active: bool,
}

impl Encode for Flow {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u8(self.active as u8);
        Ok(())
    }
}

impl Decode for Flow {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            active: src.get_u8()? & 1 != 0,
        })
    }
}

/// Confirm a flow method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowOk {
    /// Current flow setting
    pub active: bool,
}

impl Encode for FlowOk {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u8(self.active as u8);
        Ok(())
    }
}

impl Decode for FlowOk {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            active: src.get_u8()? & 1 != 0,
        })
    }
}

/// Request a channel close
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Close {
    /// Reply code
    pub reply_code: u16,

    /// Localised reply text
    pub reply_text: String,

    /// Class of the method that caused the close, zero if none
    pub class_id: u16,

    /// Method that caused the close, zero if none
    pub method_id: u16,
}

impl Close {
    /// Creates a close request, optionally naming the method that caused it
    pub fn new(
        reply_code: impl Into<u16>,
        reply_text: impl Into<String>,
        failing_method: Option<MethodId>,
    ) -> Self {
        let failing_method = failing_method.unwrap_or(MethodId::new(0, 0));
        Self {
            reply_code: reply_code.into(),
            reply_text: reply_text.into(),
            class_id: failing_method.class_id,
            method_id: failing_method.method_id,
        }
    }

    /// Typed reply code
    pub fn code(&self) -> ReplyCode {
        ReplyCode::from(self.reply_code)
    }

    /// The method that caused the close, if the peer named one
    pub fn failing_method(&self) -> Option<MethodId> {
        match (self.class_id, self.method_id) {
            (0, 0) => None,
            (class_id, method_id) => Some(MethodId::new(class_id, method_id)),
        }
    }
}

impl Encode for Close {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.reply_code);
        put_short_str(dst, &self.reply_text)?;
        dst.put_u16(self.class_id);
        dst.put_u16(self.method_id);
        Ok(())
    }
}

impl Decode for Close {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            reply_code: src.get_u16()?,
            reply_text: src.get_short_str()?,
            class_id: src.get_u16()?,
            method_id: src.get_u16()?,
        })
    }
}

/// Confirm a channel close
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseOk;

no_arguments!(CloseOk);

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use crate::codec::{Encode, Reader};

    use super::*;

    #[test]
    fn open_is_a_single_empty_short_string() {
        let mut dst = BytesMut::new();
        Open::default().encode(&mut dst).unwrap();
        assert_eq!(&dst[..], &[0]);
    }

    #[test]
    fn open_ok_reads_reserved_long_string() {
        let buf = [0, 0, 0, 0];
        let open_ok = Reader::new(&buf).read::<OpenOk>().unwrap();
        assert!(open_ok.reserved_1.is_empty());
    }

    #[test]
    fn close_layout() {
        let mut dst = BytesMut::new();
        Close::new(ReplyCode::NotFound, "NOT_FOUND", Some(MethodId::new(50, 10)))
            .encode(&mut dst)
            .unwrap();
        let mut expected = vec![0x01, 0x94, 9];
        expected.extend_from_slice(b"NOT_FOUND");
        expected.extend_from_slice(&[0, 50, 0, 10]);
        assert_eq!(&dst[..], &expected[..]);
    }
}
