//! Exchange class (40)

use bytes::{BufMut, BytesMut};

use crate::{
    codec::{bit_at, pack_bits, put_short_str, Decode, Encode, Error, Reader},
    definitions::CLASS_EXCHANGE,
    primitives::FieldTable,
};

class_methods! {
    /// Methods of the Exchange class
    pub enum ExchangeMethod in Exchange = CLASS_EXCHANGE {
        /// Exchange.Declare
        Declare = 10,
        /// Exchange.DeclareOk
        DeclareOk = 11,
        /// Exchange.Delete
        Delete = 20,
        /// Exchange.DeleteOk
        DeleteOk = 21,
        /// Exchange.Bind
        Bind = 30,
        /// Exchange.BindOk
        BindOk = 31,
        /// Exchange.Unbind
        Unbind = 40,
        /// Exchange.UnbindOk
        ///
        /// RabbitMQ assigns 51 rather than the 41 found in some copies of the protocol
        /// definition.
        UnbindOk = 51,
    }
}

/// Verify an exchange exists, create it if needed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declare {
    /// Reserved (formerly ticket)
    pub reserved_1: u16,

    /// Exchange name
    pub exchange: String,

    /// Exchange type, eg. "direct"
    pub kind: String,

    /// Only check whether the exchange exists
    pub passive: bool,

    /// Survive a broker restart
    pub durable: bool,

    /// Delete when the last binding is removed
    pub auto_delete: bool,

    /// Not directly publishable by clients
    pub internal: bool,

    /// Do not send a reply
    pub no_wait: bool,

    /// Extra arguments
    pub arguments: FieldTable,
}

impl Encode for Declare {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.reserved_1);
        put_short_str(dst, &self.exchange)?;
        put_short_str(dst, &self.kind)?;
        dst.put_u8(pack_bits(&[
            self.passive,
            self.durable,
            self.auto_delete,
            self.internal,
            self.no_wait,
        ]));
        self.arguments.encode(dst)
    }
}

impl Decode for Declare {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        let reserved_1 = src.get_u16()?;
        let exchange = src.get_short_str()?;
        let kind = src.get_short_str()?;
        let bits = src.get_u8()?;
        Ok(Self {
            reserved_1,
            exchange,
            kind,
            passive: bit_at(bits, 0),
            durable: bit_at(bits, 1),
            auto_delete: bit_at(bits, 2),
            internal: bit_at(bits, 3),
            no_wait: bit_at(bits, 4),
            arguments: src.read()?,
        })
    }
}

/// Confirm an exchange declaration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeclareOk;

/// Delete an exchange
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delete {
    /// Reserved (formerly ticket)
    pub reserved_1: u16,

    /// Exchange name
    pub exchange: String,

    /// Only delete if the exchange has no bindings
    pub if_unused: bool,

    /// Do not send a reply
    pub no_wait: bool,
}

impl Encode for Delete {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.reserved_1);
        put_short_str(dst, &self.exchange)?;
        dst.put_u8(pack_bits(&[self.if_unused, self.no_wait]));
        Ok(())
    }
}

impl Decode for Delete {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        let reserved_1 = src.get_u16()?;
        let exchange = src.get_short_str()?;
        let bits = src.get_u8()?;
        Ok(Self {
            reserved_1,
            exchange,
            if_unused: bit_at(bits, 0),
            no_wait: bit_at(bits, 1),
        })
    }
}

/// Confirm an exchange deletion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOk;

/// Bind an exchange to another exchange
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bind {
    /// Reserved (formerly ticket)
    pub reserved_1: u16,

    /// Exchange receiving the routed messages
    pub destination: String,

    /// Exchange the messages are routed from
    pub source: String,

    /// Routing key of the binding
    pub routing_key: String,

    /// Do not send a reply
    pub no_wait: bool,

    /// Extra arguments
    pub arguments: FieldTable,
}

/// Remove an exchange to exchange binding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unbind {
    /// Reserved (formerly ticket)
    pub reserved_1: u16,

    /// Exchange receiving the routed messages
    pub destination: String,

    /// Exchange the messages are routed from
    pub source: String,

    /// Routing key of the binding
    pub routing_key: String,

    /// Do not send a reply
    pub no_wait: bool,

    /// Extra arguments
    pub arguments: FieldTable,
}

macro_rules! binding_arguments {
    ($($ty:ident),*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
                    dst.put_u16(self.reserved_1);
                    put_short_str(dst, &self.destination)?;
                    put_short_str(dst, &self.source)?;
                    put_short_str(dst, &self.routing_key)?;
                    dst.put_u8(pack_bits(&[self.no_wait]));
                    self.arguments.encode(dst)
                }
            }

            impl Decode for $ty {
                fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
                    Ok(Self {
                        reserved_1: src.get_u16()?,
                        destination: src.get_short_str()?,
                        source: src.get_short_str()?,
                        routing_key: src.get_short_str()?,
                        no_wait: bit_at(src.get_u8()?, 0),
                        arguments: src.read()?,
                    })
                }
            }
        )*
    };
}

binding_arguments!(Bind, Unbind);

/// Confirm an exchange binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindOk;

/// Confirm removal of an exchange binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnbindOk;

no_arguments!(DeclareOk, DeleteOk, BindOk, UnbindOk);
