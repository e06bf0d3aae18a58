//! Property-based tests for protocol round-trips.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::float_cmp)]

use std::fmt::Debug;

use proptest::prelude::*;

use crate::format::WireType;
use crate::protocol::{
    ProtocolReader, ProtocolWriter, TaggedProtocolReader, TaggedReader, TaggedWriter,
    UntaggedReader, UntaggedWriter,
};
use crate::schema::value::{WString, WireValue};

fn tagged_roundtrip<T: WireValue + Debug>(value: &T, version: u16) -> T {
    let mut writer = TaggedWriter::new(Vec::new(), version).expect("writer");
    value.write(&mut writer).expect("write");
    let buf = writer.into_inner();
    let mut reader = TaggedReader::new(&buf[..], version).expect("reader");
    T::read_tagged(&mut reader).expect("read")
}

fn untagged_roundtrip<T: WireValue + Debug>(value: &T, version: u16) -> T {
    let mut writer = UntaggedWriter::new(Vec::new(), version).expect("writer");
    value.write(&mut writer).expect("write");
    let buf = writer.into_inner();
    let mut reader = UntaggedReader::new(&buf[..], version).expect("reader");
    T::read_untagged(&mut reader).expect("read")
}

proptest! {
    #[test]
    fn integers_roundtrip_in_both_families(value in any::<i64>(), version in 1..=2u16) {
        prop_assert_eq!(tagged_roundtrip(&value, version), value);
        prop_assert_eq!(untagged_roundtrip(&value, version), value);
    }

    #[test]
    fn doubles_roundtrip_bit_exact(
        value in any::<f64>().prop_filter("not NaN", |f| !f.is_nan()),
        version in 1..=2u16,
    ) {
        prop_assert_eq!(tagged_roundtrip(&value, version), value);
        prop_assert_eq!(untagged_roundtrip(&value, version), value);
    }

    #[test]
    fn strings_roundtrip_in_both_widths(text in ".*", version in 1..=2u16) {
        prop_assert_eq!(tagged_roundtrip(&text, version), text.clone());
        prop_assert_eq!(untagged_roundtrip(&text, version), text.clone());

        let wide = WString(text);
        prop_assert_eq!(tagged_roundtrip(&wide, version), wide.clone());
        prop_assert_eq!(untagged_roundtrip(&wide, version), wide);
    }

    #[test]
    fn lists_roundtrip(items in prop::collection::vec(any::<i64>(), 0..50), version in 1..=2u16) {
        prop_assert_eq!(tagged_roundtrip(&items, version), items.clone());
        prop_assert_eq!(untagged_roundtrip(&items, version), items);
    }

    #[test]
    fn maps_roundtrip(
        entries in prop::collection::btree_map(".*", any::<i32>(), 0..20),
        version in 1..=2u16,
    ) {
        prop_assert_eq!(tagged_roundtrip(&entries, version), entries.clone());
        prop_assert_eq!(untagged_roundtrip(&entries, version), entries);
    }

    #[test]
    fn field_headers_roundtrip_any_id(id in any::<u16>(), version in 1..=2u16) {
        let mut writer = TaggedWriter::new(Vec::new(), version).unwrap();
        writer.write_field_begin(WireType::Double, id).unwrap();
        let buf = writer.into_inner();

        let mut reader = TaggedReader::new(&buf[..], version).unwrap();
        prop_assert_eq!(reader.read_field_begin().unwrap(), (WireType::Double, id));
    }

    #[test]
    fn skip_lands_exactly_on_the_next_value(
        items in prop::collection::vec(".*", 0..20),
        entries in prop::collection::btree_map(any::<u32>(), ".*", 0..10),
        sentinel in any::<i32>(),
        version in 1..=2u16,
    ) {
        let mut writer = TaggedWriter::new(Vec::new(), version).unwrap();
        items.write(&mut writer).unwrap();
        entries.write(&mut writer).unwrap();
        writer.write_i32(sentinel).unwrap();
        let buf = writer.into_inner();

        let mut reader = TaggedReader::new(&buf[..], version).unwrap();
        reader.skip(WireType::List).unwrap();
        reader.skip(WireType::Map).unwrap();
        prop_assert_eq!(reader.read_i32().unwrap(), sentinel);
    }

    #[test]
    fn tagged_and_untagged_disagree_on_framing_only(
        value in any::<u64>(),
        version in 1..=2u16,
    ) {
        // A bare fixed-width scalar has no framing, so both families emit
        // identical bytes for it.
        let mut tagged = TaggedWriter::new(Vec::new(), version).unwrap();
        value.write(&mut tagged).unwrap();
        let mut untagged = UntaggedWriter::new(Vec::new(), version).unwrap();
        value.write(&mut untagged).unwrap();
        prop_assert_eq!(tagged.into_inner(), untagged.into_inner());
    }
}
