//! Basic class (60): publishing, consuming and acknowledging messages

use bytes::{BufMut, BytesMut};

use crate::{
    codec::{bit_at, pack_bits, put_short_str, Decode, Encode, Error, Reader},
    definitions::{DeliveryTag, ReplyCode, CLASS_BASIC},
    primitives::FieldTable,
};

class_methods! {
    /// Methods of the Basic class
    pub enum BasicMethod in Basic = CLASS_BASIC {
        /// Basic.Qos
        Qos = 10,
        /// Basic.QosOk
        QosOk = 11,
        /// Basic.Consume
        Consume = 20,
        /// Basic.ConsumeOk
        ConsumeOk = 21,
        /// Basic.Cancel
        Cancel = 30,
        /// Basic.CancelOk
        CancelOk = 31,
        /// Basic.Publish
        Publish = 40,
        /// Basic.Return
        Return = 50,
        /// Basic.Deliver
        Deliver = 60,
        /// Basic.Ack
        Ack = 80,
        /// Basic.Reject
        Reject = 90,
        /// Basic.Recover
        Recover = 110,
        /// Basic.RecoverOk
        RecoverOk = 111,
    }
}

/// Specify quality of service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Qos {
    /// Prefetch window in octets, zero means no limit
    pub prefetch_size: u32,

    /// Prefetch window in whole messages, zero means no limit
    pub prefetch_count: u16,

    /// Apply to the whole connection instead of this channel
    pub global: bool,
}

impl Qos {
    /// Creates a Qos request
    pub fn new(prefetch_size: u32, prefetch_count: u16, global: bool) -> Self {
        Self {
            prefetch_size,
            prefetch_count,
            global,
        }
    }
}

impl Encode for Qos {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u32(self.prefetch_size);
        dst.put_u16(self.prefetch_count);
        dst.put_u8(pack_bits(&[self.global]));
        Ok(())
    }
}

impl Decode for Qos {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            prefetch_size: src.get_u32()?,
            prefetch_count: src.get_u16()?,
            global: bit_at(src.get_u8()?, 0),
        })
    }
}

/// Confirm the requested qos
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QosOk;

/// Start a queue consumer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Consume {
    /// Reserved (formerly ticket)
    pub reserved_1: u16,

    /// Queue name
    pub queue: String,

    /// Consumer tag, empty to let the server pick one
    pub consumer_tag: String,

    /// Do not deliver messages published on this connection
    pub no_local: bool,

    /// Messages are considered acknowledged once delivered
    pub no_ack: bool,

    /// Request exclusive consumer access
    pub exclusive: bool,

    /// Do not send a reply
    pub no_wait: bool,

    /// Extra arguments
    pub arguments: FieldTable,
}

impl Encode for Consume {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.reserved_1);
        put_short_str(dst, &self.queue)?;
        put_short_str(dst, &self.consumer_tag)?;
        dst.put_u8(pack_bits(&[
            self.no_local,
            self.no_ack,
            self.exclusive,
            self.no_wait,
        ]));
        self.arguments.encode(dst)
    }
}

impl Decode for Consume {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        let reserved_1 = src.get_u16()?;
        let queue = src.get_short_str()?;
        let consumer_tag = src.get_short_str()?;
        let bits = src.get_u8()?;
        Ok(Self {
            reserved_1,
            queue,
            consumer_tag,
            no_local: bit_at(bits, 0),
            no_ack: bit_at(bits, 1),
            exclusive: bit_at(bits, 2),
            no_wait: bit_at(bits, 3),
            arguments: src.read()?,
        })
    }
}

/// Confirm a new consumer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumeOk {
    /// Consumer tag
    pub consumer_tag: String,
}

/// End a queue consumer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cancel {
    /// Consumer tag
    pub consumer_tag: String,

    /// Do not send a reply
    pub no_wait: bool,
}

impl Encode for Cancel {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        put_short_str(dst, &self.consumer_tag)?;
        dst.put_u8(pack_bits(&[self.no_wait]));
        Ok(())
    }
}

impl Decode for Cancel {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            consumer_tag: src.get_short_str()?,
            no_wait: bit_at(src.get_u8()?, 0),
        })
    }
}

/// Confirm a cancelled consumer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelOk {
    /// Consumer tag
    pub consumer_tag: String,
}

macro_rules! consumer_tag_only {
    ($($ty:ident),*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
                    put_short_str(dst, &self.consumer_tag)
                }
            }

            impl Decode for $ty {
                fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
                    Ok(Self {
                        consumer_tag: src.get_short_str()?,
                    })
                }
            }
        )*
    };
}

consumer_tag_only!(ConsumeOk, CancelOk);

/// Publish a message, followed by a content header and body frames
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Publish {
    /// Reserved (formerly ticket)
    pub reserved_1: u16,

    /// Exchange name, empty for the default exchange
    pub exchange: String,

    /// Routing key
    pub routing_key: String,

    /// Return the message if it cannot be routed to a queue
    pub mandatory: bool,

    /// Return the message if it cannot be delivered to a consumer immediately
    pub immediate: bool,
}

impl Encode for Publish {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.reserved_1);
        put_short_str(dst, &self.exchange)?;
        put_short_str(dst, &self.routing_key)?;
        dst.put_u8(pack_bits(&[self.mandatory, self.immediate]));
        Ok(())
    }
}

impl Decode for Publish {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        let reserved_1 = src.get_u16()?;
        let exchange = src.get_short_str()?;
        let routing_key = src.get_short_str()?;
        let bits = src.get_u8()?;
        Ok(Self {
            reserved_1,
            exchange,
            routing_key,
            mandatory: bit_at(bits, 0),
            immediate: bit_at(bits, 1),
        })
    }
}

/// Return an undeliverable message, followed by a content header and body frames
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Return {
    /// Reply code
    pub reply_code: u16,

    /// Localised reply text
    pub reply_text: String,

    /// Exchange the message was published to
    pub exchange: String,

    /// Routing key the message was published with
    pub routing_key: String,
}

impl Return {
    /// Typed reply code
    pub fn code(&self) -> ReplyCode {
        ReplyCode::from(self.reply_code)
    }
}

impl Encode for Return {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.reply_code);
        put_short_str(dst, &self.reply_text)?;
        put_short_str(dst, &self.exchange)?;
        put_short_str(dst, &self.routing_key)
    }
}

impl Decode for Return {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            reply_code: src.get_u16()?,
            reply_text: src.get_short_str()?,
            exchange: src.get_short_str()?,
            routing_key: src.get_short_str()?,
        })
    }
}

/// Deliver a message to a consumer, followed by a content header and body frames
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deliver {
    /// Consumer tag
    pub consumer_tag: String,

    /// Server assigned delivery tag
    pub delivery_tag: DeliveryTag,

    /// The message was delivered before
    pub redelivered: bool,

    /// Exchange the message was published to
    pub exchange: String,

    /// Routing key the message was published with
    pub routing_key: String,
}

impl Encode for Deliver {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        put_short_str(dst, &self.consumer_tag)?;
        dst.put_u64(self.delivery_tag);
        dst.put_u8(pack_bits(&[self.redelivered]));
        put_short_str(dst, &self.exchange)?;
        put_short_str(dst, &self.routing_key)
    }
}

impl Decode for Deliver {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            consumer_tag: src.get_short_str()?,
            delivery_tag: src.get_u64()?,
            redelivered: bit_at(src.get_u8()?, 0),
            exchange: src.get_short_str()?,
            routing_key: src.get_short_str()?,
        })
    }
}

/// Acknowledge one or more messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ack {
    /// Delivery tag
    pub delivery_tag: DeliveryTag,

    /// Acknowledge every message up to and including the tag
    pub multiple: bool,
}

impl Encode for Ack {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u64(self.delivery_tag);
        dst.put_u8(pack_bits(&[self.multiple]));
        Ok(())
    }
}

impl Decode for Ack {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            delivery_tag: src.get_u64()?,
            multiple: bit_at(src.get_u8()?, 0),
        })
    }
}

/// Reject a single message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reject {
    /// Delivery tag
    pub delivery_tag: DeliveryTag,

    /// Put the message back on the queue instead of discarding it
    pub requeue: bool,
}

impl Encode for Reject {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u64(self.delivery_tag);
        dst.put_u8(pack_bits(&[self.requeue]));
        Ok(())
    }
}

impl Decode for Reject {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            delivery_tag: src.get_u64()?,
            requeue: bit_at(src.get_u8()?, 0),
        })
    }
}

/// Redeliver unacknowledged messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recover {
    /// Requeue the messages instead of redelivering to the original consumer
    pub requeue: bool,
}

impl Encode for Recover {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u8(pack_bits(&[self.requeue]));
        Ok(())
    }
}

impl Decode for Recover {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            requeue: bit_at(src.get_u8()?, 0),
        })
    }
}

/// Confirm recovery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoverOk;

no_arguments!(QosOk, RecoverOk);
