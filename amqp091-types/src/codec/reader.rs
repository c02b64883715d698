use bytes::Bytes;

use super::{Decode, Error, MAX_NESTING_DEPTH};

/// A read cursor over an immutable byte window
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,

    /// Number of field tables and arrays enclosing the cursor
    depth: usize,
}

impl<'a> Reader<'a> {
    /// Creates a cursor positioned at the start of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            depth: 0,
        }
    }

    /// Number of bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whether every byte has been consumed
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The bytes not yet consumed
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Consume exactly `n` bytes
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let remaining = self.remaining();
        if remaining < n {
            return Err(Error::UnexpectedEnd {
                needed: n,
                remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Consume `n` bytes and return a cursor limited to them
    pub fn sub_reader(&mut self, n: usize) -> Result<Reader<'a>, Error> {
        let depth = self.depth;
        self.take(n).map(|buf| Reader { buf, pos: 0, depth })
    }

    /// Like [`sub_reader`](Self::sub_reader) for the content of a field table or array,
    /// which sits one nesting level deeper
    pub fn nested(&mut self, n: usize) -> Result<Reader<'a>, Error> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(Error::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        let mut nested = self.sub_reader(n)?;
        nested.depth = self.depth + 1;
        Ok(nested)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    /// Read one octet
    pub fn get_u8(&mut self) -> Result<u8, Error> {
        self.take_array::<1>().map(|b| b[0])
    }

    /// Read one signed octet
    pub fn get_i8(&mut self) -> Result<i8, Error> {
        self.take_array().map(i8::from_be_bytes)
    }

    /// Read a big-endian `u16`
    pub fn get_u16(&mut self) -> Result<u16, Error> {
        self.take_array().map(u16::from_be_bytes)
    }

    /// Read a big-endian `i16`
    pub fn get_i16(&mut self) -> Result<i16, Error> {
        self.take_array().map(i16::from_be_bytes)
    }

    /// Read a big-endian `u32`
    pub fn get_u32(&mut self) -> Result<u32, Error> {
        self.take_array().map(u32::from_be_bytes)
    }

    /// Read a big-endian `i32`
    pub fn get_i32(&mut self) -> Result<i32, Error> {
        self.take_array().map(i32::from_be_bytes)
    }

    /// Read a big-endian `u64`
    pub fn get_u64(&mut self) -> Result<u64, Error> {
        self.take_array().map(u64::from_be_bytes)
    }

    /// Read a big-endian `i64`
    pub fn get_i64(&mut self) -> Result<i64, Error> {
        self.take_array().map(i64::from_be_bytes)
    }

    /// Read a big-endian IEEE 754 binary32
    pub fn get_f32(&mut self) -> Result<f32, Error> {
        self.take_array().map(f32::from_be_bytes)
    }

    /// Read a big-endian IEEE 754 binary64
    pub fn get_f64(&mut self) -> Result<f64, Error> {
        self.take_array().map(f64::from_be_bytes)
    }

    /// Read a short string
    pub fn get_short_str(&mut self) -> Result<String, Error> {
        let len = self.get_u8()? as usize;
        let bytes = self.take(len)?;
        Ok(std::str::from_utf8(bytes)?.to_owned())
    }

    /// Read a long string that must be valid UTF-8
    pub fn get_long_str(&mut self) -> Result<String, Error> {
        let len = self.get_u32()? as usize;
        let bytes = self.take(len)?;
        Ok(std::str::from_utf8(bytes)?.to_owned())
    }

    /// Read a long string as raw bytes
    pub fn get_long_bytes(&mut self) -> Result<Bytes, Error> {
        let len = self.get_u32()? as usize;
        self.take(len).map(Bytes::copy_from_slice)
    }

    /// Decode a value of type `T`
    pub fn read<T: Decode>(&mut self) -> Result<T, Error> {
        T::decode(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_numbers() {
        let buf = [0x01, 0x02, 0x00, 0x00, 0x01, 0x00, 0xFF];
        let mut reader = Reader::new(&buf);
        assert_eq!(reader.get_u16().unwrap(), 0x0102);
        assert_eq!(reader.get_u32().unwrap(), 0x100);
        assert_eq!(reader.get_i8().unwrap(), -1);
        assert!(reader.is_empty());
    }

    #[test]
    fn short_read_reports_missing_bytes() {
        let buf = [0x00, 0x00, 0x01];
        let mut reader = Reader::new(&buf);
        assert_eq!(
            reader.get_u64(),
            Err(Error::UnexpectedEnd {
                needed: 8,
                remaining: 3
            })
        );
        // a failed read does not move the cursor
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn sub_reader_is_bounded() {
        let buf = [3, b'a', b'b', b'c', 9];
        let mut reader = Reader::new(&buf);
        let mut sub = reader.sub_reader(4).unwrap();
        assert_eq!(sub.get_short_str().unwrap(), "abc");
        assert!(sub.is_empty());
        assert_eq!(reader.get_u8().unwrap(), 9);
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let buf = [2, 0xC3, 0x28];
        let mut reader = Reader::new(&buf);
        assert_eq!(reader.get_short_str(), Err(Error::InvalidUtf8));
    }
}
