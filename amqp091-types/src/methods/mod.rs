//! Methods of the Connection, Channel, Exchange, Queue and Basic classes
//!
//! A method payload is `[class-id: u16][method-id: u16][arguments]`. Decoding yields a
//! [`Method`], a tagged enum with one nested enum per class, so that dispatch is an
//! explicit `match`.

use std::fmt::Display;

use bytes::{BufMut, BytesMut};

use crate::{
    codec::{Decode, Encode, Error, Reader},
    definitions::{CLASS_BASIC, CLASS_CHANNEL, CLASS_CONNECTION, CLASS_EXCHANGE, CLASS_QUEUE},
};

/// Generates the per-class method enum together with the [`AmqpMethod`] impls and the
/// conversions between each method struct and [`Method`]
macro_rules! class_methods {
    (
        $(#[$enum_meta:meta])*
        pub enum $name:ident in $outer:ident = $class_id:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $method_id:literal
            ),* $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                $variant($variant),
            )*
        }

        impl $name {
            /// Method id within the class
            pub fn method_id(&self) -> u16 {
                match self {
                    $( Self::$variant(_) => $method_id, )*
                }
            }

            /// Name of the method, eg. "Queue.DeclareOk"
            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$variant(_) => <$variant as $crate::methods::AmqpMethod>::NAME, )*
                }
            }

            pub(crate) fn encode_arguments(
                &self,
                dst: &mut bytes::BytesMut,
            ) -> Result<(), $crate::codec::Error> {
                match self {
                    $( Self::$variant(m) => $crate::codec::Encode::encode(m, dst), )*
                }
            }

            pub(crate) fn decode_arguments(
                method_id: u16,
                src: &mut $crate::codec::Reader<'_>,
            ) -> Result<Self, $crate::codec::Error> {
                match method_id {
                    $( $method_id => <$variant as $crate::codec::Decode>::decode(src).map(Self::$variant), )*
                    _ => Err($crate::codec::Error::UnknownMethod {
                        class_id: $class_id,
                        method_id,
                    }),
                }
            }
        }

        $(
            impl $crate::methods::AmqpMethod for $variant {
                const ID: $crate::methods::MethodId =
                    $crate::methods::MethodId::new($class_id, $method_id);
                const NAME: &'static str = concat!(stringify!($outer), ".", stringify!($variant));
            }

            impl From<$variant> for $crate::methods::Method {
                fn from(method: $variant) -> Self {
                    $crate::methods::Method::$outer($name::$variant(method))
                }
            }

            impl TryFrom<$crate::methods::Method> for $variant {
                type Error = $crate::methods::Method;

                fn try_from(method: $crate::methods::Method) -> Result<Self, Self::Error> {
                    match method {
                        $crate::methods::Method::$outer($name::$variant(m)) => Ok(m),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

/// Implements `Encode` and `Decode` for methods without arguments
macro_rules! no_arguments {
    ($($ty:ident),* $(,)?) => {
        $(
            impl $crate::codec::Encode for $ty {
                fn encode(&self, _: &mut bytes::BytesMut) -> Result<(), $crate::codec::Error> {
                    Ok(())
                }
            }

            impl $crate::codec::Decode for $ty {
                fn decode(_: &mut $crate::codec::Reader<'_>) -> Result<Self, $crate::codec::Error> {
                    Ok(Self)
                }
            }
        )*
    };
}

pub mod basic;
pub mod channel;
pub mod connection;
pub mod exchange;
pub mod queue;

use self::{
    basic::BasicMethod, channel::ChannelMethod, connection::ConnectionMethod,
    exchange::ExchangeMethod, queue::QueueMethod,
};

/// Global identifier of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodId {
    /// Class id
    pub class_id: u16,

    /// Method id within the class
    pub method_id: u16,
}

impl MethodId {
    /// Creates a new method id
    pub const fn new(class_id: u16, method_id: u16) -> Self {
        Self {
            class_id,
            method_id,
        }
    }
}

impl Display for MethodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.class_id, self.method_id)
    }
}

/// A method struct with a statically known id
pub trait AmqpMethod:
    Encode + Decode + Into<Method> + TryFrom<Method, Error = Method> + Send + 'static
{
    /// The (class-id, method-id) pair
    const ID: MethodId;

    /// Name of the method, eg. "Basic.Qos"
    const NAME: &'static str;
}

/// A decoded method frame payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// Connection class (10)
    Connection(ConnectionMethod),

    /// Channel class (20)
    Channel(ChannelMethod),

    /// Exchange class (40)
    Exchange(ExchangeMethod),

    /// Queue class (50)
    Queue(QueueMethod),

    /// Basic class (60)
    Basic(BasicMethod),
}

impl Method {
    /// Class id of the method
    pub fn class_id(&self) -> u16 {
        match self {
            Method::Connection(_) => CLASS_CONNECTION,
            Method::Channel(_) => CLASS_CHANNEL,
            Method::Exchange(_) => CLASS_EXCHANGE,
            Method::Queue(_) => CLASS_QUEUE,
            Method::Basic(_) => CLASS_BASIC,
        }
    }

    /// Method id within the class
    pub fn method_id(&self) -> u16 {
        match self {
            Method::Connection(m) => m.method_id(),
            Method::Channel(m) => m.method_id(),
            Method::Exchange(m) => m.method_id(),
            Method::Queue(m) => m.method_id(),
            Method::Basic(m) => m.method_id(),
        }
    }

    /// The (class-id, method-id) pair
    pub fn id(&self) -> MethodId {
        MethodId::new(self.class_id(), self.method_id())
    }

    /// Name of the method, eg. "Channel.OpenOk"
    pub fn name(&self) -> &'static str {
        match self {
            Method::Connection(m) => m.name(),
            Method::Channel(m) => m.name(),
            Method::Exchange(m) => m.name(),
            Method::Queue(m) => m.name(),
            Method::Basic(m) => m.name(),
        }
    }

    /// Whether a content header and body frames follow the method
    pub fn has_content(&self) -> bool {
        matches!(
            self,
            Method::Basic(BasicMethod::Publish(_))
                | Method::Basic(BasicMethod::Deliver(_))
                | Method::Basic(BasicMethod::Return(_))
        )
    }
}

impl Encode for Method {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.class_id());
        dst.put_u16(self.method_id());
        match self {
            Method::Connection(m) => m.encode_arguments(dst),
            Method::Channel(m) => m.encode_arguments(dst),
            Method::Exchange(m) => m.encode_arguments(dst),
            Method::Queue(m) => m.encode_arguments(dst),
            Method::Basic(m) => m.encode_arguments(dst),
        }
    }
}

impl Decode for Method {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        let class_id = src.get_u16()?;
        let method_id = src.get_u16()?;
        match class_id {
            CLASS_CONNECTION => ConnectionMethod::decode_arguments(method_id, src).map(Method::Connection),
            CLASS_CHANNEL => ChannelMethod::decode_arguments(method_id, src).map(Method::Channel),
            CLASS_EXCHANGE => ExchangeMethod::decode_arguments(method_id, src).map(Method::Exchange),
            CLASS_QUEUE => QueueMethod::decode_arguments(method_id, src).map(Method::Queue),
            CLASS_BASIC => BasicMethod::decode_arguments(method_id, src).map(Method::Basic),
            _ => Err(Error::UnknownMethod {
                class_id,
                method_id,
            }),
        }
    }
}
