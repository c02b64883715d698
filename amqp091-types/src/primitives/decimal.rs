use bytes::{BufMut, BytesMut};

use crate::codec::{Decode, Encode, Error, Reader};

/// A decimal number: `value * 10^-scale`
///
/// encoding = scale octet followed by a 32-bit two's-complement unscaled value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Decimal {
    /// Number of decimal digits after the point
    pub scale: u8,

    /// The unscaled value
    pub value: i32,
}

impl Decimal {
    /// Creates a new decimal
    pub fn new(scale: u8, value: i32) -> Self {
        Self { scale, value }
    }

    /// Lossy conversion into a binary float
    pub fn to_f64(&self) -> f64 {
        self.value as f64 / 10f64.powi(self.scale as i32)
    }
}

impl Encode for Decimal {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u8(self.scale);
        dst.put_i32(self.value);
        Ok(())
    }
}

impl Decode for Decimal {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        let scale = src.get_u8()?;
        let value = src.get_i32()?;
        Ok(Self { scale, value })
    }
}
