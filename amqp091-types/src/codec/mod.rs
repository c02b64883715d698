//! Binary encoding of the AMQP 0-9-1 type system
//!
//! All multi-byte integers and floats are written in network byte order. Variable length
//! structures (field tables, field arrays, frames) are written with a reserved length field
//! that is patched once the content is known, see [`LengthPatch`].

use bytes::{BufMut, BytesMut};

mod error;
mod reader;

pub use error::Error;
pub use reader::Reader;

/// Maximum length in bytes of a short string
pub const SHORT_STR_MAX_LEN: usize = u8::MAX as usize;

/// How deep field tables and arrays may be nested in decoded input
pub const MAX_NESTING_DEPTH: usize = 64;

/// Types that can be written onto the wire
pub trait Encode {
    /// Append the wire representation of `self` to `dst`
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error>;
}

/// Types that can be read from the wire
pub trait Decode: Sized {
    /// Read one value from the cursor, advancing it past the consumed bytes
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error>;
}

/// A reserved big-endian `u32` length field.
///
/// The length of a field table (or a frame payload) must precede its content. The
/// writer reserves four bytes, writes the content and then patches the number of bytes
/// written since the reservation back into the reserved slot.
#[derive(Debug)]
#[must_use = "the reserved length must be patched"]
pub struct LengthPatch {
    offset: usize,
}

impl LengthPatch {
    /// Reserve four bytes at the current end of `dst`
    pub fn reserve(dst: &mut BytesMut) -> Self {
        let offset = dst.len();
        dst.put_u32(0);
        Self { offset }
    }

    /// Write the number of bytes appended after the reservation into the reserved slot
    pub fn patch(self, dst: &mut BytesMut) -> Result<u32, Error> {
        let start = self.offset + 4;
        let len = dst.len() - start;
        let len = u32::try_from(len).map_err(|_| Error::LengthOverflow(len))?;
        dst[self.offset..start].copy_from_slice(&len.to_be_bytes());
        Ok(len)
    }
}

/// Write a short string (one length octet followed by at most 255 bytes)
pub fn put_short_str(dst: &mut BytesMut, value: &str) -> Result<(), Error> {
    let len = value.len();
    if len > SHORT_STR_MAX_LEN {
        return Err(Error::ShortStringTooLong(len));
    }
    dst.put_u8(len as u8);
    dst.put_slice(value.as_bytes());
    Ok(())
}

/// Write a long string (a `u32` length followed by the raw bytes)
pub fn put_long_str(dst: &mut BytesMut, value: &[u8]) -> Result<(), Error> {
    let len = u32::try_from(value.len()).map_err(|_| Error::LengthOverflow(value.len()))?;
    dst.put_u32(len);
    dst.put_slice(value);
    Ok(())
}

/// Pack consecutive boolean arguments into one octet. The first boolean occupies bit 0.
///
/// At most eight booleans fit in an octet; the unused high bits stay zero.
pub fn pack_bits(bits: &[bool]) -> u8 {
    debug_assert!(bits.len() <= 8);
    bits.iter()
        .enumerate()
        .fold(0u8, |acc, (i, &bit)| acc | ((bit as u8) << i))
}

/// Get the boolean at position `index` of a packed octet
pub fn bit_at(octet: u8, index: u8) -> bool {
    octet & (1 << index) != 0
}
