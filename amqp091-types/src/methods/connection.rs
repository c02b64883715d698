//! Connection class (10): connection negotiation and shutdown

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    codec::{put_long_str, put_short_str, Decode, Encode, Error, Reader},
    definitions::{ReplyCode, CLASS_CONNECTION},
    primitives::FieldTable,
};

use super::MethodId;

class_methods! {
    /// Methods of the Connection class
    pub enum ConnectionMethod in Connection = CLASS_CONNECTION {
        /// Connection.Start
        Start = 10,
        /// Connection.StartOk
        StartOk = 11,
        /// Connection.Tune
        Tune = 30,
        /// Connection.TuneOk
        TuneOk = 31,
        /// Connection.Open
        Open = 40,
        /// Connection.OpenOk
        OpenOk = 41,
        /// Connection.Close
        Close = 50,
        /// Connection.CloseOk
        CloseOk = 51,
    }
}

/// Start connection negotiation (server to client)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Start {
    /// Protocol major version
    pub version_major: u8,

    /// Protocol minor version
    pub version_minor: u8,

    /// Server properties
    pub server_properties: FieldTable,

    /// Space separated list of security mechanisms
    pub mechanisms: String,

    /// Space separated list of message locales
    pub locales: String,
}

impl Start {
    /// Whether `mechanism` appears in the offered list
    pub fn offers_mechanism(&self, mechanism: &str) -> bool {
        self.mechanisms.split(' ').any(|m| m == mechanism)
    }

    /// Whether `locale` appears in the offered list
    pub fn offers_locale(&self, locale: &str) -> bool {
        self.locales.split(' ').any(|l| l == locale)
    }
}

impl Encode for Start {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u8(self.version_major);
        dst.put_u8(self.version_minor);
        self.server_properties.encode(dst)?;
        put_long_str(dst, self.mechanisms.as_bytes())?;
        put_long_str(dst, self.locales.as_bytes())
    }
}

impl Decode for Start {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            version_major: src.get_u8()?,
            version_minor: src.get_u8()?,
            server_properties: src.read()?,
            mechanisms: src.get_long_str()?,
            locales: src.get_long_str()?,
        })
    }
}

/// Select security mechanism and locale (client to server)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOk {
    /// Client properties
    pub client_properties: FieldTable,

    /// Selected security mechanism
    pub mechanism: String,

    /// Security response data, opaque to the protocol
    pub response: Bytes,

    /// Selected message locale
    pub locale: String,
}

impl Encode for StartOk {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        self.client_properties.encode(dst)?;
        put_short_str(dst, &self.mechanism)?;
        put_long_str(dst, &self.response)?;
        put_short_str(dst, &self.locale)
    }
}

impl Decode for StartOk {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            client_properties: src.read()?,
            mechanism: src.get_short_str()?,
            response: src.get_long_bytes()?,
            locale: src.get_short_str()?,
        })
    }
}

/// Proposed connection tuning parameters (server to client)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tune {
    /// Highest channel number the server permits, zero means no limit
    pub channel_max: u16,

    /// Largest frame size the server accepts, zero means no limit
    pub frame_max: u32,

    /// Heartbeat delay in seconds the server wants, zero means none
    pub heartbeat: u16,
}

impl Tune {
    /// Creates tuning parameters
    pub fn new(channel_max: u16, frame_max: u32, heartbeat: u16) -> Self {
        Self {
            channel_max,
            frame_max,
            heartbeat,
        }
    }
}

impl Encode for Tune {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.channel_max);
        dst.put_u32(self.frame_max);
        dst.put_u16(self.heartbeat);
        Ok(())
    }
}

impl Decode for Tune {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            channel_max: src.get_u16()?,
            frame_max: src.get_u32()?,
            heartbeat: src.get_u16()?,
        })
    }
}

/// Negotiated connection tuning parameters (client to server)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TuneOk {
    /// Negotiated maximum channel number
    pub channel_max: u16,

    /// Negotiated maximum frame size
    pub frame_max: u32,

    /// Negotiated heartbeat delay in seconds
    pub heartbeat: u16,
}

impl From<Tune> for TuneOk {
    fn from(tune: Tune) -> Self {
        Self {
            channel_max: tune.channel_max,
            frame_max: tune.frame_max,
            heartbeat: tune.heartbeat,
        }
    }
}

impl Encode for TuneOk {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.channel_max);
        dst.put_u32(self.frame_max);
        dst.put_u16(self.heartbeat);
        Ok(())
    }
}

impl Decode for TuneOk {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            channel_max: src.get_u16()?,
            frame_max: src.get_u32()?,
            heartbeat: src.get_u16()?,
        })
    }
}

/// Open connection to a virtual host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Open {
    /// Virtual host name
    pub virtual_host: String,

    /// Reserved short string (formerly capabilities)
    pub reserved_1: String,

    /// Reserved bit (formerly insist)
    pub reserved_2: bool,
}

impl Open {
    /// Open the given virtual host
    pub fn new(virtual_host: impl Into<String>) -> Self {
        Self {
            virtual_host: virtual_host.into(),
            ..Default::default()
        }
    }
}

impl Encode for Open {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        put_short_str(dst, &self.virtual_host)?;
        put_short_str(dst, &self.reserved_1)?;
        dst.put_u8(self.reserved_2 as u8);
        Ok(())
    }
}

impl Decode for Open {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            virtual_host: src.get_short_str()?,
            reserved_1: src.get_short_str()?,
            reserved_2: src.get_u8()? & 1 != 0,
        })
    }
}

/// Signal that the connection is ready
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOk {
    /// Reserved short string (formerly known-hosts)
    pub reserved_1: String,
}

impl Encode for OpenOk {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        put_short_str(dst, &self.reserved_1)
    }
}

impl Decode for OpenOk {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            reserved_1: src.get_short_str()?,
        })
    }
}

/// Request a connection close
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

/// Confirm a connection close
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseOk;

no_arguments!(CloseOk);

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use crate::{
        codec::{Encode, Reader},
        primitives::FieldTable,
    };

    use super::*;

    #[test]
    fn tune_ok_layout() {
        let mut dst = BytesMut::new();
        TuneOk::from(Tune::new(2047, 131_072, 60))
            .encode(&mut dst)
            .unwrap();
        assert_eq!(&dst[..], &[0x07, 0xFF, 0x00, 0x02, 0x00, 0x00, 0x00, 0x3C]);
    }

    #[test]
    fn start_ok_carries_plain_response() {
        let start_ok = StartOk {
            client_properties: FieldTable::new(),
            mechanism: "PLAIN".into(),
            response: Bytes::from_static(b"\0guest\0guest"),
            locale: "en_US".into(),
        };
        let mut dst = BytesMut::new();
        start_ok.encode(&mut dst).unwrap();

        let expected: &[u8] = b"\0\0\0\0\x05PLAIN\0\0\0\x0c\0guest\0guest\x05en_US";
        assert_eq!(&dst[..], expected);
        assert_eq!(Reader::new(&dst).read::<StartOk>().unwrap(), start_ok);
    }

    #[test]
    fn open_has_reserved_fields() {
        let mut dst = BytesMut::new();
        Open::new("/").encode(&mut dst).unwrap();
        assert_eq!(&dst[..], &[1, b'/', 0, 0]);
    }

    #[test]
    fn close_names_failing_method() {
        let close = Close::new(ReplyCode::UnexpectedFrame, "UNEXPECTED_FRAME", Some(MethodId::new(50, 11)));
        assert_eq!(close.code(), ReplyCode::UnexpectedFrame);
        assert_eq!(close.failing_method(), Some(MethodId::new(50, 11)));
        assert_eq!(Close::new(200u16, "bye", None).failing_method(), None);
    }

    #[test]
    fn mechanisms_are_space_separated() {
        let start = Start {
            mechanisms: "AMQPLAIN PLAIN".into(),
            locales: "en_US".into(),
            ..Default::default()
        };
        assert!(start.offers_mechanism("PLAIN"));
        assert!(!start.offers_mechanism("EXTERNAL"));
        assert!(start.offers_locale("en_US"));
    }
}
