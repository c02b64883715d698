use bytes::{BufMut, Bytes, BytesMut};
use ordered_float::OrderedFloat;

use crate::codec::{put_long_str, Decode, Encode, Error, Reader};

use super::{Decimal, FieldArray, FieldTable, Timestamp};

const TAG_BOOL: u8 = b't';
const TAG_BYTE: u8 = b'b';
const TAG_UBYTE: u8 = b'B';
const TAG_SHORT: u8 = b's';
const TAG_USHORT: u8 = b'u';
const TAG_INT: u8 = b'I';
const TAG_UINT: u8 = b'i';
const TAG_LONG: u8 = b'l';
const TAG_ULONG: u8 = b'L';
const TAG_FLOAT: u8 = b'f';
const TAG_DOUBLE: u8 = b'd';
const TAG_DECIMAL: u8 = b'D';
const TAG_LONG_STRING: u8 = b'S';
const TAG_BINARY: u8 = b'x';
const TAG_ARRAY: u8 = b'A';
const TAG_TIMESTAMP: u8 = b'T';
const TAG_TABLE: u8 = b'F';
const TAG_VOID: u8 = b'V';

/// A self-describing value found in field tables and field arrays
///
/// The type tags follow the grammar RabbitMQ uses on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// encoding code = 't', one octet, zero is false
    Bool(bool),

    /// encoding code = 'b', 8-bit two's-complement integer
    Byte(i8),

    /// encoding code = 'B', 8-bit unsigned integer
    UByte(u8),

    /// encoding code = 's', 16-bit two's-complement integer
    Short(i16),

    /// encoding code = 'u', 16-bit unsigned integer
    UShort(u16),

    /// encoding code = 'I', 32-bit two's-complement integer
    Int(i32),

    /// encoding code = 'i', 32-bit unsigned integer
    UInt(u32),

    /// encoding code = 'l', 64-bit two's-complement integer
    Long(i64),

    /// encoding code = 'L', 64-bit unsigned integer
    ULong(u64),

    /// encoding code = 'f', IEEE 754 binary32
    Float(OrderedFloat<f32>),

    /// encoding code = 'd', IEEE 754 binary64
    Double(OrderedFloat<f64>),

    /// encoding code = 'D', scale octet and 32-bit unscaled value
    Decimal(Decimal),

    /// encoding code = 'S', UTF-8 text with a 32-bit length prefix
    LongString(String),

    /// encoding code = 'x', opaque bytes with a 32-bit length prefix
    Binary(Bytes),

    /// encoding code = 'A', nested array with a 32-bit byte length prefix
    Array(FieldArray),

    /// encoding code = 'T', seconds since the unix epoch
    Timestamp(Timestamp),

    /// encoding code = 'F', nested table with a 32-bit byte length prefix
    Table(FieldTable),

    /// encoding code = 'V', no payload
    Void,
}

impl FieldValue {
    /// The type tag written before the value
    pub fn tag(&self) -> u8 {
        match self {
            FieldValue::Bool(_) => TAG_BOOL,
            FieldValue::Byte(_) => TAG_BYTE,
            FieldValue::UByte(_) => TAG_UBYTE,
            FieldValue::Short(_) => TAG_SHORT,
            FieldValue::UShort(_) => TAG_USHORT,
            FieldValue::Int(_) => TAG_INT,
            FieldValue::UInt(_) => TAG_UINT,
            FieldValue::Long(_) => TAG_LONG,
            FieldValue::ULong(_) => TAG_ULONG,
            FieldValue::Float(_) => TAG_FLOAT,
            FieldValue::Double(_) => TAG_DOUBLE,
            FieldValue::Decimal(_) => TAG_DECIMAL,
            FieldValue::LongString(_) => TAG_LONG_STRING,
            FieldValue::Binary(_) => TAG_BINARY,
            FieldValue::Array(_) => TAG_ARRAY,
            FieldValue::Timestamp(_) => TAG_TIMESTAMP,
            FieldValue::Table(_) => TAG_TABLE,
            FieldValue::Void => TAG_VOID,
        }
    }

    /// Returns the text if the value is a long string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::LongString(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean if the value is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the nested table if the value is a table
    pub fn as_table(&self) -> Option<&FieldTable> {
        match self {
            FieldValue::Table(t) => Some(t),
            _ => None,
        }
    }
}

impl Encode for FieldValue {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u8(self.tag());
        match self {
            FieldValue::Bool(v) => dst.put_u8(*v as u8),
            FieldValue::Byte(v) => dst.put_i8(*v),
            FieldValue::UByte(v) => dst.put_u8(*v),
            FieldValue::Short(v) => dst.put_i16(*v),
            FieldValue::UShort(v) => dst.put_u16(*v),
            FieldValue::Int(v) => dst.put_i32(*v),
            FieldValue::UInt(v) => dst.put_u32(*v),
            FieldValue::Long(v) => dst.put_i64(*v),
            FieldValue::ULong(v) => dst.put_u64(*v),
            FieldValue::Float(v) => dst.put_f32(v.into_inner()),
            FieldValue::Double(v) => dst.put_f64(v.into_inner()),
            FieldValue::Decimal(v) => v.encode(dst)?,
            FieldValue::LongString(v) => put_long_str(dst, v.as_bytes())?,
            FieldValue::Binary(v) => put_long_str(dst, v)?,
            FieldValue::Array(v) => v.encode(dst)?,
            FieldValue::Timestamp(v) => v.encode(dst)?,
            FieldValue::Table(v) => v.encode(dst)?,
            FieldValue::Void => {}
        }
        Ok(())
    }
}

impl Decode for FieldValue {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        let value = match src.get_u8()? {
            TAG_BOOL => FieldValue::Bool(src.get_u8()? != 0),
            TAG_BYTE => FieldValue::Byte(src.get_i8()?),
            TAG_UBYTE => FieldValue::UByte(src.get_u8()?),
            TAG_SHORT => FieldValue::Short(src.get_i16()?),
            TAG_USHORT => FieldValue::UShort(src.get_u16()?),
            TAG_INT => FieldValue::Int(src.get_i32()?),
            TAG_UINT => FieldValue::UInt(src.get_u32()?),
            TAG_LONG => FieldValue::Long(src.get_i64()?),
            TAG_ULONG => FieldValue::ULong(src.get_u64()?),
            TAG_FLOAT => FieldValue::Float(OrderedFloat(src.get_f32()?)),
            TAG_DOUBLE => FieldValue::Double(OrderedFloat(src.get_f64()?)),
            TAG_DECIMAL => FieldValue::Decimal(src.read()?),
            TAG_LONG_STRING => FieldValue::LongString(src.get_long_str()?),
            TAG_BINARY => FieldValue::Binary(src.get_long_bytes()?),
            TAG_ARRAY => FieldValue::Array(src.read()?),
            TAG_TIMESTAMP => FieldValue::Timestamp(src.read()?),
            TAG_TABLE => FieldValue::Table(src.read()?),
            TAG_VOID => FieldValue::Void,
            tag => return Err(Error::UnknownFieldType(tag)),
        };
        Ok(value)
    }
}

macro_rules! impl_from_for_field_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_for_field_value! {
    bool => Bool,
    i8 => Byte,
    u8 => UByte,
    i16 => Short,
    u16 => UShort,
    i32 => Int,
    u32 => UInt,
    i64 => Long,
    u64 => ULong,
    f32 => Float,
    f64 => Double,
    Decimal => Decimal,
    String => LongString,
    &str => LongString,
    Bytes => Binary,
    FieldArray => Array,
    Timestamp => Timestamp,
    FieldTable => Table,
}
