//! Content header and the properties of the Basic class

use bytes::{BufMut, BytesMut};

use crate::{
    codec::{put_short_str, Decode, Encode, Error, Reader},
    definitions::CLASS_BASIC,
    primitives::{FieldTable, Timestamp},
};

const FLAG_CONTENT_TYPE: u16 = 1 << 15;
const FLAG_CONTENT_ENCODING: u16 = 1 << 14;
const FLAG_HEADERS: u16 = 1 << 13;
const FLAG_DELIVERY_MODE: u16 = 1 << 12;
const FLAG_PRIORITY: u16 = 1 << 11;
const FLAG_CORRELATION_ID: u16 = 1 << 10;
const FLAG_REPLY_TO: u16 = 1 << 9;
const FLAG_EXPIRATION: u16 = 1 << 8;
const FLAG_MESSAGE_ID: u16 = 1 << 7;
const FLAG_TIMESTAMP: u16 = 1 << 6;
const FLAG_TYPE: u16 = 1 << 5;
const FLAG_USER_ID: u16 = 1 << 4;
const FLAG_APP_ID: u16 = 1 << 3;
const FLAG_CLUSTER_ID: u16 = 1 << 2;

/// Another property flags word follows
const FLAG_CONTINUATION: u16 = 1;

/// Delivery mode of a message that is lost on broker restart
pub const DELIVERY_MODE_TRANSIENT: u8 = 1;

/// Delivery mode of a message that survives a broker restart
pub const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// Properties carried in the content header of a Basic message
///
/// Each property is optional. Presence is signalled on the wire by a flags word, absent
/// properties occupy no bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicProperties {
    /// MIME content type
    pub content_type: Option<String>,

    /// MIME content encoding
    pub content_encoding: Option<String>,

    /// Application headers
    pub headers: Option<FieldTable>,

    /// Transient (1) or persistent (2)
    pub delivery_mode: Option<u8>,

    /// Priority, 0 to 9
    pub priority: Option<u8>,

    /// Application correlation identifier
    pub correlation_id: Option<String>,

    /// Address to reply to
    pub reply_to: Option<String>,

    /// Expiration specification
    pub expiration: Option<String>,

    /// Application message identifier
    pub message_id: Option<String>,

    /// Message timestamp
    pub timestamp: Option<Timestamp>,

    /// Message type name
    pub kind: Option<String>,

    /// Creating user id
    pub user_id: Option<String>,

    /// Creating application id
    pub app_id: Option<String>,

    /// Reserved, must be empty
    pub cluster_id: Option<String>,
}

macro_rules! property_setters {
    ($($setter:ident => $field:ident: $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Builder style setter of `", stringify!($field), "`")]
            pub fn $setter(mut self, value: impl Into<$ty>) -> Self {
                self.$field = Some(value.into());
                self
            }
        )*
    };
}

impl BasicProperties {
    property_setters! {
        with_content_type => content_type: String,
        with_content_encoding => content_encoding: String,
        with_headers => headers: FieldTable,
        with_delivery_mode => delivery_mode: u8,
        with_priority => priority: u8,
        with_correlation_id => correlation_id: String,
        with_reply_to => reply_to: String,
        with_expiration => expiration: String,
        with_message_id => message_id: String,
        with_timestamp => timestamp: Timestamp,
        with_kind => kind: String,
        with_user_id => user_id: String,
        with_app_id => app_id: String,
    }

    /// Mark the message as persistent
    pub fn persistent(self) -> Self {
        self.with_delivery_mode(DELIVERY_MODE_PERSISTENT)
    }

    /// The property flags word
    pub fn flags(&self) -> u16 {
        let mut flags = 0;
        let mut set = |present: bool, flag: u16| {
            if present {
                flags |= flag
            }
        };
        set(self.content_type.is_some(), FLAG_CONTENT_TYPE);
        set(self.content_encoding.is_some(), FLAG_CONTENT_ENCODING);
        set(self.headers.is_some(), FLAG_HEADERS);
        set(self.delivery_mode.is_some(), FLAG_DELIVERY_MODE);
        set(self.priority.is_some(), FLAG_PRIORITY);
        set(self.correlation_id.is_some(), FLAG_CORRELATION_ID);
        set(self.reply_to.is_some(), FLAG_REPLY_TO);
        set(self.expiration.is_some(), FLAG_EXPIRATION);
        set(self.message_id.is_some(), FLAG_MESSAGE_ID);
        set(self.timestamp.is_some(), FLAG_TIMESTAMP);
        set(self.kind.is_some(), FLAG_TYPE);
        set(self.user_id.is_some(), FLAG_USER_ID);
        set(self.app_id.is_some(), FLAG_APP_ID);
        set(self.cluster_id.is_some(), FLAG_CLUSTER_ID);
        flags
    }
}

fn put_opt_short_str(dst: &mut BytesMut, value: &Option<String>) -> Result<(), Error> {
    match value {
        Some(value) => put_short_str(dst, value),
        None => Ok(()),
    }
}

impl Encode for BasicProperties {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.flags());
        put_opt_short_str(dst, &self.content_type)?;
        put_opt_short_str(dst, &self.content_encoding)?;
        if let Some(headers) = &self.headers {
            headers.encode(dst)?;
        }
        if let Some(delivery_mode) = self.delivery_mode {
            dst.put_u8(delivery_mode);
        }
        if let Some(priority) = self.priority {
            dst.put_u8(priority);
        }
        put_opt_short_str(dst, &self.correlation_id)?;
        put_opt_short_str(dst, &self.reply_to)?;
        put_opt_short_str(dst, &self.expiration)?;
        put_opt_short_str(dst, &self.message_id)?;
        if let Some(timestamp) = &self.timestamp {
            timestamp.encode(dst)?;
        }
        put_opt_short_str(dst, &self.kind)?;
        put_opt_short_str(dst, &self.user_id)?;
        put_opt_short_str(dst, &self.app_id)?;
        put_opt_short_str(dst, &self.cluster_id)
    }
}

impl Decode for BasicProperties {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        let flags = src.get_u16()?;
        // The Basic class defines no properties past the first flags word
        let mut more = flags & FLAG_CONTINUATION != 0;
        while more {
            more = src.get_u16()? & FLAG_CONTINUATION != 0;
        }

        let short_str = |src: &mut Reader<'_>, flag: u16| -> Result<Option<String>, Error> {
            match flags & flag {
                0 => Ok(None),
                _ => src.get_short_str().map(Some),
            }
        };
        let octet = |src: &mut Reader<'_>, flag: u16| -> Result<Option<u8>, Error> {
            match flags & flag {
                0 => Ok(None),
                _ => src.get_u8().map(Some),
            }
        };

        Ok(Self {
            content_type: short_str(src, FLAG_CONTENT_TYPE)?,
            content_encoding: short_str(src, FLAG_CONTENT_ENCODING)?,
            headers: match flags & FLAG_HEADERS {
                0 => None,
                _ => Some(src.read()?),
            },
            delivery_mode: octet(src, FLAG_DELIVERY_MODE)?,
            priority: octet(src, FLAG_PRIORITY)?,
            correlation_id: short_str(src, FLAG_CORRELATION_ID)?,
            reply_to: short_str(src, FLAG_REPLY_TO)?,
            expiration: short_str(src, FLAG_EXPIRATION)?,
            message_id: short_str(src, FLAG_MESSAGE_ID)?,
            timestamp: match flags & FLAG_TIMESTAMP {
                0 => None,
                _ => Some(src.read()?),
            },
            kind: short_str(src, FLAG_TYPE)?,
            user_id: short_str(src, FLAG_USER_ID)?,
            app_id: short_str(src, FLAG_APP_ID)?,
            cluster_id: short_str(src, FLAG_CLUSTER_ID)?,
        })
    }
}

/// Payload of a content header frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHeader {
    /// Class of the content, always Basic (60)
    pub class_id: u16,

    /// Unused, must be zero
    pub weight: u16,

    /// Total size of the content body in bytes
    pub body_size: u64,

    /// Content properties
    pub properties: BasicProperties,
}

impl ContentHeader {
    /// Header of a Basic message with `body_size` bytes of content
    pub fn new(body_size: u64, properties: BasicProperties) -> Self {
        Self {
            class_id: CLASS_BASIC,
            weight: 0,
            body_size,
            properties,
        }
    }
}

impl Default for ContentHeader {
    /// An empty Basic message
    fn default() -> Self {
        Self::new(0, BasicProperties::default())
    }
}

impl Encode for ContentHeader {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.class_id);
        dst.put_u16(self.weight);
        dst.put_u64(self.body_size);
        self.properties.encode(dst)
    }
}

impl Decode for ContentHeader {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        let class_id = src.get_u16()?;
        if class_id != CLASS_BASIC {
            return Err(Error::UnknownContentClass(class_id));
        }
        Ok(Self {
            class_id,
            weight: src.get_u16()?,
            body_size: src.get_u64()?,
            properties: src.read()?,
        })
    }
}
