//! Queue class (50)

use bytes::{BufMut, BytesMut};

use crate::{
    codec::{bit_at, pack_bits, put_short_str, Decode, Encode, Error, Reader},
    definitions::CLASS_QUEUE,
    primitives::FieldTable,
};

class_methods! {
    /// Methods of the Queue class
    pub enum QueueMethod in Queue = CLASS_QUEUE {
        /// Queue.Declare
        Declare = 10,
        /// Queue.DeclareOk
        DeclareOk = 11,
        /// Queue.Bind
        Bind = 20,
        /// Queue.BindOk
        BindOk = 21,
        /// Queue.Purge
        Purge = 30,
        /// Queue.PurgeOk
        PurgeOk = 31,
        /// Queue.Delete
        Delete = 40,
        /// Queue.DeleteOk
        DeleteOk = 41,
        /// Queue.Unbind
        Unbind = 50,
        /// Queue.UnbindOk
        UnbindOk = 51,
    }
}

/// Declare a queue, create it if needed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declare {
    /// Reserved (formerly ticket)
    pub reserved_1: u16,

    /// Queue name, empty to let the server pick one
    pub queue: String,

    /// Only check whether the queue exists
    pub passive: bool,

    /// Survive a broker restart
    pub durable: bool,

    /// Only accessible by this connection
    pub exclusive: bool,

    /// Delete when the last consumer is cancelled
    pub auto_delete: bool,

    /// Do not send a reply
    pub no_wait: bool,

    /// Extra arguments
    pub arguments: FieldTable,
}

impl Encode for Declare {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.reserved_1);
        put_short_str(dst, &self.queue)?;
        dst.put_u8(pack_bits(&[
            self.passive,
            self.durable,
            self.exclusive,
            self.auto_delete,
            self.no_wait,
        ]));
        self.arguments.encode(dst)
    }
}

impl Decode for Declare {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        let reserved_1 = src.get_u16()?;
        let queue = src.get_short_str()?;
        let bits = src.get_u8()?;
        Ok(Self {
            reserved_1,
            queue,
            passive: bit_at(bits, 0),
            durable: bit_at(bits, 1),
            exclusive: bit_at(bits, 2),
            auto_delete: bit_at(bits, 3),
            no_wait: bit_at(bits, 4),
            arguments: src.read()?,
        })
    }
}

/// Confirm a queue declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclareOk {
    /// Name of the queue, as chosen by the server if the client left it empty
    pub queue: String,

    /// Number of messages ready in the queue
    pub message_count: u32,

    /// Number of active consumers
    pub consumer_count: u32,
}

impl Encode for DeclareOk {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        put_short_str(dst, &self.queue)?;
        dst.put_u32(self.message_count);
        dst.put_u32(self.consumer_count);
        Ok(())
    }
}

impl Decode for DeclareOk {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            queue: src.get_short_str()?,
            message_count: src.get_u32()?,
            consumer_count: src.get_u32()?,
        })
    }
}

/// Bind a queue to an exchange
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bind {
    /// Reserved (formerly ticket)
    pub reserved_1: u16,

    /// Queue name
    pub queue: String,

    /// Exchange name
    pub exchange: String,

    /// Routing key of the binding
    pub routing_key: String,

    /// Do not send a reply
    pub no_wait: bool,

    /// Extra arguments
    pub arguments: FieldTable,
}

impl Encode for Bind {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.reserved_1);
        put_short_str(dst, &self.queue)?;
        put_short_str(dst, &self.exchange)?;
        put_short_str(dst, &self.routing_key)?;
        dst.put_u8(pack_bits(&[self.no_wait]));
        self.arguments.encode(dst)
    }
}

impl Decode for Bind {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            reserved_1: src.get_u16()?,
            queue: src.get_short_str()?,
            exchange: src.get_short_str()?,
            routing_key: src.get_short_str()?,
            no_wait: bit_at(src.get_u8()?, 0),
            arguments: src.read()?,
        })
    }
}

/// Confirm a queue binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindOk;

/// Remove all ready messages from a queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Purge {
    /// Reserved (formerly ticket)
    pub reserved_1: u16,

    /// Queue name
    pub queue: String,

    /// Do not send a reply
    pub no_wait: bool,
}

impl Encode for Purge {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.reserved_1);
        put_short_str(dst, &self.queue)?;
        dst.put_u8(pack_bits(&[self.no_wait]));
        Ok(())
    }
}

impl Decode for Purge {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            reserved_1: src.get_u16()?,
            queue: src.get_short_str()?,
            no_wait: bit_at(src.get_u8()?, 0),
        })
    }
}

/// Confirm a queue purge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeOk {
    /// Number of messages purged
    pub message_count: u32,
}

/// Delete a queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delete {
    /// Reserved (formerly ticket)
    pub reserved_1: u16,

    /// Queue name
    pub queue: String,

    /// Only delete if the queue has no consumers
    pub if_unused: bool,

    /// Only delete if the queue has no messages
    pub if_empty: bool,

    /// Do not send a reply
    pub no_wait: bool,
}

impl Encode for Delete {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.reserved_1);
        put_short_str(dst, &self.queue)?;
        dst.put_u8(pack_bits(&[self.if_unused, self.if_empty, self.no_wait]));
        Ok(())
    }
}

impl Decode for Delete {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        let reserved_1 = src.get_u16()?;
        let queue = src.get_short_str()?;
        let bits = src.get_u8()?;
        Ok(Self {
            reserved_1,
            queue,
            if_unused: bit_at(bits, 0),
            if_empty: bit_at(bits, 1),
            no_wait: bit_at(bits, 2),
        })
    }
}

/// Confirm a queue deletion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOk {
    /// Number of messages deleted along with the queue
    pub message_count: u32,
}

macro_rules! message_count {
    ($($ty:ident),*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
                    dst.put_u32(self.message_count);
                    Ok(())
                }
            }

            impl Decode for $ty {
                fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
                    Ok(Self {
                        message_count: src.get_u32()?,
                    })
                }
            }
        )*
    };
}

message_count!(PurgeOk, DeleteOk);

/// Unbind a queue from an exchange
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unbind {
    /// Reserved (formerly ticket)
    pub reserved_1: u16,

    /// Queue name
    pub queue: String,

    /// Exchange name
    pub exchange: String,

    /// Routing key of the binding
    pub routing_key: String,

    /// Extra arguments
    pub arguments: FieldTable,
}

impl Encode for Unbind {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.reserved_1);
        put_short_str(dst, &self.queue)?;
        put_short_str(dst, &self.exchange)?;
        put_short_str(dst, &self.routing_key)?;
        self.arguments.encode(dst)
    }
}

impl Decode for Unbind {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            reserved_1: src.get_u16()?,
            queue: src.get_short_str()?,
            exchange: src.get_short_str()?,
            routing_key: src.get_short_str()?,
            arguments: src.read()?,
        })
    }
}

/// Confirm removal of a queue binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnbindOk;

no_arguments!(BindOk, UnbindOk);
