use std::ops::{Deref, DerefMut};

use bytes::BytesMut;
use indexmap::IndexMap;

use crate::codec::{put_short_str, Decode, Encode, Error, LengthPatch, Reader};

use super::FieldValue;

/// A map from short-string names to [`FieldValue`]s
///
/// Lookups and equality ignore the order of entries. Insertion order is kept so that a
/// decoded table encodes back to the same bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTable(IndexMap<String, FieldValue>);

impl FieldTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Insert an entry, returning the previous value stored under `name`
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.0.insert(name.into(), value.into())
    }

    /// Builder style insertion
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Consume the wrapper into the inner map
    pub fn into_inner(self) -> IndexMap<String, FieldValue> {
        self.0
    }
}

impl Deref for FieldTable {
    type Target = IndexMap<String, FieldValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for FieldTable {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<IndexMap<String, FieldValue>> for FieldTable {
    fn from(map: IndexMap<String, FieldValue>) -> Self {
        Self(map)
    }
}

impl<K, V> FromIterator<(K, V)> for FieldTable
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Encode for FieldTable {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        let patch = LengthPatch::reserve(dst);
        for (name, value) in self.0.iter() {
            put_short_str(dst, name)?;
            value.encode(dst)?;
        }
        patch.patch(dst)?;
        Ok(())
    }
}

impl Decode for FieldTable {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        let len = src.get_u32()? as usize;
        let mut entries = src.nested(len)?;
        let mut map = IndexMap::new();
        while !entries.is_empty() {
            let name = entries.get_short_str()?;
            let value = entries.read()?;
            map.insert(name, value);
        }
        Ok(Self(map))
    }
}

/// A list of [`FieldValue`]s
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldArray(pub Vec<FieldValue>);

impl FieldArray {
    /// Creates an empty array
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Consume the wrapper into the inner vector
    pub fn into_inner(self) -> Vec<FieldValue> {
        self.0
    }
}

impl Deref for FieldArray {
    type Target = Vec<FieldValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for FieldArray {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<FieldValue>> for FieldArray {
    fn from(values: Vec<FieldValue>) -> Self {
        Self(values)
    }
}

impl<V: Into<FieldValue>> FromIterator<V> for FieldArray {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl Encode for FieldArray {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        let patch = LengthPatch::reserve(dst);
        for value in self.0.iter() {
            value.encode(dst)?;
        }
        patch.patch(dst)?;
        Ok(())
    }
}

impl Decode for FieldArray {
    fn decode(src: &mut Reader<'_>) -> Result<Self, Error> {
        let len = src.get_u32()? as usize;
        let mut items = src.nested(len)?;
        let mut values = Vec::new();
        while !items.is_empty() {
            values.push(items.read()?);
        }
        Ok(Self(values))
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use crate::{
        codec::MAX_NESTING_DEPTH,
        primitives::{Decimal, OrderedFloat, Timestamp},
    };

    use super::*;

    fn every_variant() -> FieldTable {
        let nested = FieldTable::new()
            .with("publisher_confirms", true)
            .with("depth", 2u8);
        let array: FieldArray = vec![
            FieldValue::from(1i32),
            FieldValue::from("two"),
            FieldValue::Void,
            FieldValue::Table(FieldTable::new().with("k", "v")),
        ]
        .into();

        FieldTable::new()
            .with("bool", false)
            .with("i8", -8i8)
            .with("u8", 8u8)
            .with("i16", -16i16)
            .with("u16", 16u16)
            .with("i32", -32i32)
            .with("u32", 32u32)
            .with("i64", i64::MIN)
            .with("u64", u64::MAX)
            .with("f32", FieldValue::Float(OrderedFloat(1.5)))
            .with("f64", FieldValue::Double(OrderedFloat(-0.25)))
            .with("decimal", Decimal::new(3, 12345))
            .with("long_string", "hello world")
            .with("bytes", Bytes::from_static(&[0, 1, 2, 0xFF]))
            .with("array", array)
            .with("timestamp", Timestamp::from_secs(1_700_000_000))
            .with("table", nested)
            .with("void", FieldValue::Void)
    }

    #[test]
    fn table_with_every_variant_round_trips_byte_for_byte() {
        let table = every_variant();
        let mut encoded = BytesMut::new();
        table.encode(&mut encoded).unwrap();

        let mut reader = Reader::new(&encoded);
        let decoded: FieldTable = reader.read().unwrap();
        assert!(reader.is_empty());
        assert_eq!(decoded, table);

        let mut reencoded = BytesMut::new();
        decoded.encode(&mut reencoded).unwrap();
        assert_eq!(encoded, reencoded);
    }

    #[test]
    fn table_length_prefix_counts_entries() {
        let table = FieldTable::new().with("a", true);
        let mut dst = BytesMut::new();
        table.encode(&mut dst).unwrap();
        // name: 1 + 1, value: tag + octet
        assert_eq!(&dst[..], &[0, 0, 0, 4, 1, b'a', b't', 1]);
    }

    #[test]
    fn empty_table_is_four_zero_bytes() {
        let mut dst = BytesMut::new();
        FieldTable::new().encode(&mut dst).unwrap();
        assert_eq!(&dst[..], &[0, 0, 0, 0]);
    }

    #[test]
    fn equality_ignores_entry_order() {
        let a = FieldTable::new().with("x", 1i32).with("y", 2i32);
        let b = FieldTable::new().with("y", 2i32).with("x", 1i32);
        assert_eq!(a, b);
    }

    #[test]
    fn truncated_table_is_an_error() {
        let buf = [0, 0, 0, 10, 1, b'a', b't'];
        let result = Reader::new(&buf).read::<FieldTable>();
        assert!(matches!(result, Err(Error::UnexpectedEnd { .. })));
    }

    #[test]
    fn unknown_tag_inside_nested_table_is_an_error() {
        let buf = [0, 0, 0, 10, 1, b'n', b'F', 0, 0, 0, 3, 1, b'k', b'?'];
        let result = Reader::new(&buf).read::<FieldTable>();
        assert_eq!(result, Err(Error::UnknownFieldType(b'?')));
    }

    /// `depth` arrays, each one holding the next
    fn nested_arrays(depth: usize) -> Vec<u8> {
        let mut buf = vec![0, 0, 0, 0];
        for _ in 1..depth {
            let mut outer = Vec::with_capacity(buf.len() + 5);
            outer.extend_from_slice(&(buf.len() as u32 + 1).to_be_bytes());
            outer.push(b'A');
            outer.extend_from_slice(&buf);
            buf = outer;
        }
        buf
    }

    #[test]
    fn nesting_depth_is_limited() {
        let buf = nested_arrays(MAX_NESTING_DEPTH);
        assert!(Reader::new(&buf).read::<FieldArray>().is_ok());

        let buf = nested_arrays(MAX_NESTING_DEPTH + 1);
        assert_eq!(
            Reader::new(&buf).read::<FieldArray>(),
            Err(Error::NestingTooDeep(MAX_NESTING_DEPTH))
        );

        let buf = nested_arrays(5_000);
        assert!(Reader::new(&buf).read::<FieldArray>().is_err());
    }

    #[test]
    fn tables_and_arrays_share_the_depth_limit() {
        let arrays = nested_arrays(MAX_NESTING_DEPTH);
        let mut table = Vec::new();
        table.extend_from_slice(&(arrays.len() as u32 + 3).to_be_bytes());
        table.extend_from_slice(&[1, b'n', b'A']);
        table.extend_from_slice(&arrays);

        assert_eq!(
            Reader::new(&table).read::<FieldTable>(),
            Err(Error::NestingTooDeep(MAX_NESTING_DEPTH))
        );
    }
}
