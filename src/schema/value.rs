//! The `WireValue` trait: every type that can appear as a field.
//!
//! Scalars, strings, and the supported containers all implement
//! [`WireValue`]. Struct-typed fields implement it by hand next to their
//! [`Record`](crate::schema::Record) impl, delegating to the traversal
//! engine. Containers nest freely, so `Vec<BTreeMap<String, f64>>` is a
//! valid field type out of the box.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::format::{DefaultValue, WireType};
use crate::protocol::{ProtocolWriter, TaggedProtocolReader, UntaggedProtocolReader};

/// Elements reserved ahead of a wire-supplied count. Counts above this grow
/// the collection as elements actually decode, so a hostile count cannot
/// reserve unbounded memory.
const PREALLOC_LIMIT: usize = 1024;

/// A value that knows how to move itself across a protocol boundary.
///
/// The write side is shared by both wire families; the read side splits,
/// because tagged payloads carry element types that must be validated while
/// untagged payloads carry only counts.
pub trait WireValue: Clone + PartialEq + Send + Sync + Sized + 'static {
    /// The wire-type tag announcing values of this type.
    fn wire_type() -> WireType;

    /// Writes `self` through the protocol.
    fn write(&self, writer: &mut dyn ProtocolWriter) -> Result<()>;

    /// Reads one value from a tagged payload, validating element tags
    /// against this type.
    fn read_tagged(reader: &mut dyn TaggedProtocolReader) -> Result<Self>;

    /// Reads one value from an untagged payload; the schema supplies all
    /// type knowledge.
    fn read_untagged(reader: &mut dyn UntaggedProtocolReader) -> Result<Self>;

    /// The value a reader materializes when the field is absent.
    fn default_value() -> Self;

    /// `self` described as an omittable default, when such a description
    /// exists. Non-empty containers and struct values return `None` and are
    /// therefore always written.
    fn default_variant(&self) -> Option<DefaultValue>;
}

macro_rules! impl_scalar_value {
    ($($ty:ty => $wire:ident, $write:ident, $read:ident;)*) => {
        $(
            impl WireValue for $ty {
                fn wire_type() -> WireType {
                    WireType::$wire
                }

                fn write(&self, writer: &mut dyn ProtocolWriter) -> Result<()> {
                    writer.$write(*self)
                }

                fn read_tagged(reader: &mut dyn TaggedProtocolReader) -> Result<Self> {
                    reader.$read()
                }

                fn read_untagged(reader: &mut dyn UntaggedProtocolReader) -> Result<Self> {
                    reader.$read()
                }

                fn default_value() -> Self {
                    Default::default()
                }

                fn default_variant(&self) -> Option<DefaultValue> {
                    Some(DefaultValue::$wire(*self))
                }
            }
        )*
    };
}

impl_scalar_value! {
    bool => Bool, write_bool, read_bool;
    u8 => UInt8, write_u8, read_u8;
    u16 => UInt16, write_u16, read_u16;
    u32 => UInt32, write_u32, read_u32;
    u64 => UInt64, write_u64, read_u64;
    i8 => Int8, write_i8, read_i8;
    i16 => Int16, write_i16, read_i16;
    i32 => Int32, write_i32, read_i32;
    i64 => Int64, write_i64, read_i64;
    f32 => Float, write_f32, read_f32;
    f64 => Double, write_f64, read_f64;
}

impl WireValue for String {
    fn wire_type() -> WireType {
        WireType::String
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> Result<()> {
        writer.write_string(self)
    }

    fn read_tagged(reader: &mut dyn TaggedProtocolReader) -> Result<Self> {
        reader.read_string()
    }

    fn read_untagged(reader: &mut dyn UntaggedProtocolReader) -> Result<Self> {
        reader.read_string()
    }

    fn default_value() -> Self {
        String::new()
    }

    fn default_variant(&self) -> Option<DefaultValue> {
        Some(DefaultValue::Str(self.clone()))
    }
}

/// Text stored on the wire as UTF-16LE code units.
///
/// In memory it is ordinary UTF-8; the newtype only selects the wide wire
/// representation for the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WString(pub String);

impl WString {
    /// Borrows the text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for WString {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for WString {
    fn from(text: &str) -> Self {
        Self(text.to_owned())
    }
}

impl std::fmt::Display for WString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl WireValue for WString {
    fn wire_type() -> WireType {
        WireType::WString
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> Result<()> {
        writer.write_wstring(&self.0)
    }

    fn read_tagged(reader: &mut dyn TaggedProtocolReader) -> Result<Self> {
        Ok(Self(reader.read_wstring()?))
    }

    fn read_untagged(reader: &mut dyn UntaggedProtocolReader) -> Result<Self> {
        Ok(Self(reader.read_wstring()?))
    }

    fn default_value() -> Self {
        Self::default()
    }

    fn default_variant(&self) -> Option<DefaultValue> {
        Some(DefaultValue::WStr(self.0.clone()))
    }
}

fn check_element(expected: WireType, actual: WireType) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::TypeMismatch { expected, actual })
    }
}

impl<T: WireValue> WireValue for Vec<T> {
    fn wire_type() -> WireType {
        WireType::List
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> Result<()> {
        writer.write_container_begin(self.len(), T::wire_type())?;
        for item in self {
            item.write(writer)?;
        }
        writer.write_container_end()
    }

    fn read_tagged(reader: &mut dyn TaggedProtocolReader) -> Result<Self> {
        let (count, element) = reader.read_container_begin()?;
        check_element(T::wire_type(), element)?;
        let mut items = Vec::with_capacity((count as usize).min(PREALLOC_LIMIT));
        for _ in 0..count {
            items.push(T::read_tagged(reader)?);
        }
        reader.read_container_end()?;
        Ok(items)
    }

    fn read_untagged(reader: &mut dyn UntaggedProtocolReader) -> Result<Self> {
        let count = reader.read_container_begin()?;
        let mut items = Vec::with_capacity((count as usize).min(PREALLOC_LIMIT));
        for _ in 0..count {
            items.push(T::read_untagged(reader)?);
        }
        Ok(items)
    }

    fn default_value() -> Self {
        Vec::new()
    }

    fn default_variant(&self) -> Option<DefaultValue> {
        if self.is_empty() {
            Some(DefaultValue::Empty)
        } else {
            None
        }
    }
}

/// Sets keep their elements sorted, so serialized output is deterministic
/// regardless of insertion order.
impl<T: WireValue + Ord> WireValue for BTreeSet<T> {
    fn wire_type() -> WireType {
        WireType::Set
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> Result<()> {
        writer.write_container_begin(self.len(), T::wire_type())?;
        for item in self {
            item.write(writer)?;
        }
        writer.write_container_end()
    }

    fn read_tagged(reader: &mut dyn TaggedProtocolReader) -> Result<Self> {
        let (count, element) = reader.read_container_begin()?;
        check_element(T::wire_type(), element)?;
        let mut items = BTreeSet::new();
        for _ in 0..count {
            items.insert(T::read_tagged(reader)?);
        }
        reader.read_container_end()?;
        Ok(items)
    }

    fn read_untagged(reader: &mut dyn UntaggedProtocolReader) -> Result<Self> {
        let count = reader.read_container_begin()?;
        let mut items = BTreeSet::new();
        for _ in 0..count {
            items.insert(T::read_untagged(reader)?);
        }
        Ok(items)
    }

    fn default_value() -> Self {
        BTreeSet::new()
    }

    fn default_variant(&self) -> Option<DefaultValue> {
        if self.is_empty() {
            Some(DefaultValue::Empty)
        } else {
            None
        }
    }
}

impl<K: WireValue + Ord, V: WireValue> WireValue for BTreeMap<K, V> {
    fn wire_type() -> WireType {
        WireType::Map
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> Result<()> {
        writer.write_map_begin(self.len(), K::wire_type(), V::wire_type())?;
        for (key, value) in self {
            key.write(writer)?;
            value.write(writer)?;
        }
        writer.write_container_end()
    }

    fn read_tagged(reader: &mut dyn TaggedProtocolReader) -> Result<Self> {
        let (count, key_tag, value_tag) = reader.read_map_begin()?;
        check_element(K::wire_type(), key_tag)?;
        check_element(V::wire_type(), value_tag)?;
        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let key = K::read_tagged(reader)?;
            let value = V::read_tagged(reader)?;
            entries.insert(key, value);
        }
        reader.read_container_end()?;
        Ok(entries)
    }

    fn read_untagged(reader: &mut dyn UntaggedProtocolReader) -> Result<Self> {
        let count = reader.read_map_begin()?;
        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let key = K::read_untagged(reader)?;
            let value = V::read_untagged(reader)?;
            entries.insert(key, value);
        }
        Ok(entries)
    }

    fn default_value() -> Self {
        BTreeMap::new()
    }

    fn default_variant(&self) -> Option<DefaultValue> {
        if self.is_empty() {
            Some(DefaultValue::Empty)
        } else {
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::format::{VERSION_1, VERSION_2};
    use crate::protocol::{TaggedReader, TaggedWriter, UntaggedReader, UntaggedWriter};

    fn tagged_bytes<T: WireValue>(value: &T, version: u16) -> Vec<u8> {
        let mut writer = TaggedWriter::new(Vec::new(), version).unwrap();
        value.write(&mut writer).unwrap();
        writer.into_inner()
    }

    fn untagged_bytes<T: WireValue>(value: &T, version: u16) -> Vec<u8> {
        let mut writer = UntaggedWriter::new(Vec::new(), version).unwrap();
        value.write(&mut writer).unwrap();
        writer.into_inner()
    }

    #[test]
    fn nested_containers_round_trip_both_families() {
        let value: Vec<BTreeMap<String, f64>> = vec![
            BTreeMap::from([("pi".to_owned(), 3.14), ("zero".to_owned(), 0.0)]),
            BTreeMap::new(),
        ];

        for version in [VERSION_1, VERSION_2] {
            let buf = tagged_bytes(&value, version);
            let mut reader = TaggedReader::new(&buf[..], version).unwrap();
            let restored = <Vec<BTreeMap<String, f64>>>::read_tagged(&mut reader).unwrap();
            assert_eq!(restored, value);

            let buf = untagged_bytes(&value, version);
            let mut reader = UntaggedReader::new(&buf[..], version).unwrap();
            let restored = <Vec<BTreeMap<String, f64>>>::read_untagged(&mut reader).unwrap();
            assert_eq!(restored, value);
        }
    }

    #[test]
    fn tagged_element_type_is_validated() {
        let buf = tagged_bytes(&vec![1i32, 2, 3], VERSION_2);
        let mut reader = TaggedReader::new(&buf[..], VERSION_2).unwrap();
        let err = <Vec<String>>::read_tagged(&mut reader).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: WireType::String,
                actual: WireType::Int32,
            }
        ));
    }

    #[test]
    fn map_key_and_value_types_are_validated() {
        let value = BTreeMap::from([(1u16, true)]);
        let buf = tagged_bytes(&value, VERSION_2);

        let mut reader = TaggedReader::new(&buf[..], VERSION_2).unwrap();
        assert!(matches!(
            <BTreeMap<u32, bool>>::read_tagged(&mut reader),
            Err(Error::TypeMismatch { .. })
        ));

        let mut reader = TaggedReader::new(&buf[..], VERSION_2).unwrap();
        assert!(matches!(
            <BTreeMap<u16, u8>>::read_tagged(&mut reader),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn hostile_count_fails_without_reserving_memory() {
        // Claims u32::MAX elements, then ends. The decode must die on the
        // missing bytes, not in the allocator.
        let mut payload = vec![WireType::Int32 as u8];
        payload.extend([0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
        let mut reader = TaggedReader::new(&payload[..], VERSION_2).unwrap();
        assert!(matches!(
            <Vec<i32>>::read_tagged(&mut reader),
            Err(Error::UnexpectedEndOfStream)
        ));
    }

    #[test]
    fn set_serialization_is_insertion_order_independent() {
        let mut forward = BTreeSet::new();
        for v in [1i64, 5, 3] {
            forward.insert(v);
        }
        let mut backward = BTreeSet::new();
        for v in [3i64, 5, 1] {
            backward.insert(v);
        }
        assert_eq!(
            tagged_bytes(&forward, VERSION_2),
            tagged_bytes(&backward, VERSION_2)
        );
    }

    #[test]
    fn default_variants_describe_omittable_values() {
        assert_eq!(42i32.default_variant(), Some(DefaultValue::Int32(42)));
        assert_eq!(
            WString::from("w").default_variant(),
            Some(DefaultValue::WStr("w".to_owned()))
        );
        assert_eq!(
            Vec::<i32>::new().default_variant(),
            Some(DefaultValue::Empty)
        );
        assert_eq!(vec![1i32].default_variant(), None);
        assert_eq!(
            BTreeMap::<String, i32>::new().default_variant(),
            Some(DefaultValue::Empty)
        );
    }
}
