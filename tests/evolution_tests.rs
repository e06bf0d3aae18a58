//! Schema evolution: old readers against new payloads, new readers against
//! old payloads, required enforcement, omission, and inheritance slicing.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tagwire::engine;
use tagwire::protocol::{ProtocolWriter, TaggedProtocolReader, UntaggedProtocolReader};
use tagwire::{
    deserialize_from_slice, serialize_to_vec, DefaultValue, Error, Modifier, Protocol, Record,
    Result, StructBuilder, StructDescriptor, TypeRegistry, WString, WireType, WireValue,
    VERSION_1, VERSION_2,
};

const TAGGED_VERSIONS: [u16; 2] = [VERSION_1, VERSION_2];

// --- MOCK DATA STRUCTURES ---

#[derive(Debug, Default, Clone, PartialEq)]
struct PointV1 {
    x: i32,
    y: i32,
}

impl Record for PointV1 {
    fn descriptor() -> Result<Arc<StructDescriptor>> {
        TypeRegistry::global().resolve::<PointV1>(|| {
            StructBuilder::<PointV1>::new("evolution.PointV1")
                .field(
                    1,
                    "x",
                    Modifier::Optional,
                    |p: &PointV1| &p.x,
                    |p: &mut PointV1| &mut p.x,
                )
                .field(
                    2,
                    "y",
                    Modifier::Optional,
                    |p: &PointV1| &p.y,
                    |p: &mut PointV1| &mut p.y,
                )
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// The same point two schema revisions later: a label and a weighted
/// default were added, ids 1 and 2 kept their meaning.
#[derive(Debug, Clone, PartialEq)]
struct PointV2 {
    x: i32,
    y: i32,
    label: String,
    weight: f64,
}

impl Default for PointV2 {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            label: String::new(),
            weight: 1.0,
        }
    }
}

impl Record for PointV2 {
    fn descriptor() -> Result<Arc<StructDescriptor>> {
        TypeRegistry::global().resolve::<PointV2>(|| {
            StructBuilder::<PointV2>::new("evolution.PointV2")
                .field(
                    1,
                    "x",
                    Modifier::Optional,
                    |p: &PointV2| &p.x,
                    |p: &mut PointV2| &mut p.x,
                )
                .field(
                    2,
                    "y",
                    Modifier::Optional,
                    |p: &PointV2| &p.y,
                    |p: &mut PointV2| &mut p.y,
                )
                .field(
                    3,
                    "label",
                    Modifier::Optional,
                    |p: &PointV2| &p.label,
                    |p: &mut PointV2| &mut p.label,
                )
                .field_with_default(
                    4,
                    "weight",
                    Modifier::Optional,
                    1.0f64,
                    |p: &PointV2| &p.weight,
                    |p: &mut PointV2| &mut p.weight,
                )
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Strict {
    x: i32,
}

impl Record for Strict {
    fn descriptor() -> Result<Arc<StructDescriptor>> {
        TypeRegistry::global().resolve::<Strict>(|| {
            StructBuilder::<Strict>::new("evolution.Strict")
                .field(
                    1,
                    "x",
                    Modifier::Required,
                    |s: &Strict| &s.x,
                    |s: &mut Strict| &mut s.x,
                )
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Blank;

impl Record for Blank {
    fn descriptor() -> Result<Arc<StructDescriptor>> {
        TypeRegistry::global()
            .resolve::<Blank>(|| StructBuilder::<Blank>::new("evolution.Blank").build())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
struct OptCfg {
    retries: u32,
    host: String,
}

impl Default for OptCfg {
    fn default() -> Self {
        Self {
            retries: 3,
            host: "localhost".to_owned(),
        }
    }
}

impl Record for OptCfg {
    fn descriptor() -> Result<Arc<StructDescriptor>> {
        TypeRegistry::global().resolve::<OptCfg>(|| {
            StructBuilder::<OptCfg>::new("evolution.OptCfg")
                .field_with_default(
                    1,
                    "retries",
                    Modifier::Optional,
                    3u32,
                    |c: &OptCfg| &c.retries,
                    |c: &mut OptCfg| &mut c.retries,
                )
                .field_with_default(
                    2,
                    "host",
                    Modifier::Optional,
                    "localhost".to_owned(),
                    |c: &OptCfg| &c.host,
                    |c: &mut OptCfg| &mut c.host,
                )
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Field-for-field identical to [`OptCfg`], but nothing is ever omitted.
#[derive(Debug, Clone, PartialEq)]
struct AlwaysCfg {
    retries: u32,
    host: String,
}

impl Default for AlwaysCfg {
    fn default() -> Self {
        Self {
            retries: 3,
            host: "localhost".to_owned(),
        }
    }
}

impl Record for AlwaysCfg {
    fn descriptor() -> Result<Arc<StructDescriptor>> {
        TypeRegistry::global().resolve::<AlwaysCfg>(|| {
            StructBuilder::<AlwaysCfg>::new("evolution.AlwaysCfg")
                .field_with_default(
                    1,
                    "retries",
                    Modifier::RequiredOptional,
                    3u32,
                    |c: &AlwaysCfg| &c.retries,
                    |c: &mut AlwaysCfg| &mut c.retries,
                )
                .field_with_default(
                    2,
                    "host",
                    Modifier::RequiredOptional,
                    "localhost".to_owned(),
                    |c: &AlwaysCfg| &c.host,
                    |c: &mut AlwaysCfg| &mut c.host,
                )
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct InnerEvo {
    marker: u8,
}

impl Record for InnerEvo {
    fn descriptor() -> Result<Arc<StructDescriptor>> {
        TypeRegistry::global().resolve::<InnerEvo>(|| {
            StructBuilder::<InnerEvo>::new("evolution.Inner")
                .field(
                    1,
                    "marker",
                    Modifier::Optional,
                    |i: &InnerEvo| &i.marker,
                    |i: &mut InnerEvo| &mut i.marker,
                )
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl WireValue for InnerEvo {
    fn wire_type() -> WireType {
        WireType::Struct
    }

    fn write(&self, writer: &mut dyn ProtocolWriter) -> Result<()> {
        engine::write_struct_value(self, writer)
    }

    fn read_tagged(reader: &mut dyn TaggedProtocolReader) -> Result<Self> {
        engine::read_struct_value_tagged(reader)
    }

    fn read_untagged(reader: &mut dyn UntaggedProtocolReader) -> Result<Self> {
        engine::read_struct_value_untagged(reader)
    }

    fn default_value() -> Self {
        Self::default()
    }

    fn default_variant(&self) -> Option<DefaultValue> {
        None
    }
}

/// A writer-side type carrying one field of every wire shape a reader
/// might have to skip.
#[derive(Debug, Default, Clone, PartialEq)]
struct KitchenSink {
    keep: i32,
    ratio: f64,
    note: String,
    wide: WString,
    counts: Vec<i32>,
    names: Vec<String>,
    index: BTreeMap<String, i32>,
    nested: InnerEvo,
    bits: BTreeSet<u8>,
    on: bool,
}

impl Record for KitchenSink {
    fn descriptor() -> Result<Arc<StructDescriptor>> {
        TypeRegistry::global().resolve::<KitchenSink>(|| {
            StructBuilder::<KitchenSink>::new("evolution.KitchenSink")
                .field(1, "keep", Modifier::Optional, |k: &KitchenSink| &k.keep, |k: &mut KitchenSink| &mut k.keep)
                .field(2, "ratio", Modifier::Optional, |k: &KitchenSink| &k.ratio, |k: &mut KitchenSink| &mut k.ratio)
                .field(3, "note", Modifier::Optional, |k: &KitchenSink| &k.note, |k: &mut KitchenSink| &mut k.note)
                .field(4, "wide", Modifier::Optional, |k: &KitchenSink| &k.wide, |k: &mut KitchenSink| &mut k.wide)
                .field(5, "counts", Modifier::Optional, |k: &KitchenSink| &k.counts, |k: &mut KitchenSink| &mut k.counts)
                .field(6, "names", Modifier::Optional, |k: &KitchenSink| &k.names, |k: &mut KitchenSink| &mut k.names)
                .field(7, "index", Modifier::Optional, |k: &KitchenSink| &k.index, |k: &mut KitchenSink| &mut k.index)
                .field(8, "nested", Modifier::Optional, |k: &KitchenSink| &k.nested, |k: &mut KitchenSink| &mut k.nested)
                .field(9, "bits", Modifier::Optional, |k: &KitchenSink| &k.bits, |k: &mut KitchenSink| &mut k.bits)
                .field(10, "on", Modifier::Optional, |k: &KitchenSink| &k.on, |k: &mut KitchenSink| &mut k.on)
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A reader-side type that knows id 1, and knows id 2 under a different
/// wire type than the payload carries.
#[derive(Debug, Clone, PartialEq)]
struct Keeper {
    keep: i32,
    mismatch: i32,
}

impl Default for Keeper {
    fn default() -> Self {
        Self {
            keep: 0,
            mismatch: 77,
        }
    }
}

impl Record for Keeper {
    fn descriptor() -> Result<Arc<StructDescriptor>> {
        TypeRegistry::global().resolve::<Keeper>(|| {
            StructBuilder::<Keeper>::new("evolution.Keeper")
                .field(
                    1,
                    "keep",
                    Modifier::Optional,
                    |k: &Keeper| &k.keep,
                    |k: &mut Keeper| &mut k.keep,
                )
                .field_with_default(
                    2,
                    "mismatch",
                    Modifier::Optional,
                    77i32,
                    |k: &Keeper| &k.mismatch,
                    |k: &mut Keeper| &mut k.mismatch,
                )
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Creature {
    id: i64,
}

impl Record for Creature {
    fn descriptor() -> Result<Arc<StructDescriptor>> {
        TypeRegistry::global().resolve::<Creature>(|| {
            StructBuilder::<Creature>::new("evolution.Creature")
                .field(
                    1,
                    "id",
                    Modifier::Optional,
                    |c: &Creature| &c.id,
                    |c: &mut Creature| &mut c.id,
                )
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Dog {
    id: i64,
    name: String,
}

impl Record for Dog {
    fn descriptor() -> Result<Arc<StructDescriptor>> {
        TypeRegistry::global().resolve::<Dog>(|| {
            StructBuilder::<Dog>::new("evolution.Dog")
                .base(Creature::descriptor()?)
                .field(
                    1,
                    "name",
                    Modifier::Optional,
                    |d: &Dog| &d.name,
                    |d: &mut Dog| &mut d.name,
                )
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

// --- TESTS ---

#[test]
fn new_reader_fills_missing_fields_with_declared_defaults() {
    let old = PointV1 { x: 10, y: -4 };
    for version in TAGGED_VERSIONS {
        let bytes = serialize_to_vec(&old, Protocol::Tagged, version).unwrap();
        let new: PointV2 = deserialize_from_slice(&bytes, Protocol::Tagged, version).unwrap();
        assert_eq!(new.x, 10);
        assert_eq!(new.y, -4);
        assert_eq!(new.label, "");
        // The declared default, not the type's zero.
        assert_eq!(new.weight, 1.0);
    }
}

#[test]
fn old_reader_skips_fields_it_never_heard_of() {
    let new = PointV2 {
        x: -1,
        y: 2,
        label: "origin-ish".to_owned(),
        weight: 0.25,
    };
    for version in TAGGED_VERSIONS {
        let bytes = serialize_to_vec(&new, Protocol::Tagged, version).unwrap();
        let old: PointV1 = deserialize_from_slice(&bytes, Protocol::Tagged, version).unwrap();
        assert_eq!(old, PointV1 { x: -1, y: 2 });
    }
}

#[test]
fn required_fields_are_enforced_by_tagged_readers() {
    for version in TAGGED_VERSIONS {
        let bytes = serialize_to_vec(&Blank, Protocol::Tagged, version).unwrap();
        let err = deserialize_from_slice::<Strict>(&bytes, Protocol::Tagged, version).unwrap_err();
        match err {
            Error::MissingRequiredField {
                type_name,
                field_name,
                id,
            } => {
                assert_eq!(type_name, "evolution.Strict");
                assert_eq!(field_name, "x");
                assert_eq!(id, 1);
            }
            other => panic!("expected MissingRequiredField, got {other:?}"),
        }

        // Present-and-required round-trips normally.
        let ok = serialize_to_vec(&Strict { x: 5 }, Protocol::Tagged, version).unwrap();
        let restored: Strict = deserialize_from_slice(&ok, Protocol::Tagged, version).unwrap();
        assert_eq!(restored.x, 5);
    }
}

#[test]
fn untagged_readers_cannot_enforce_presence() {
    // An untagged payload with too few bytes dies on framing, never on a
    // presence check.
    let bytes = serialize_to_vec(&Blank, Protocol::Untagged, VERSION_2).unwrap();
    let err = deserialize_from_slice::<Strict>(&bytes, Protocol::Untagged, VERSION_2).unwrap_err();
    assert!(matches!(err, Error::UnexpectedEndOfStream));
}

#[test]
fn untagged_omission_is_byte_identical_to_an_explicit_default() {
    let omitting = OptCfg::default();
    let explicit = AlwaysCfg::default();
    for version in [VERSION_1, VERSION_2] {
        let omitted_bytes = serialize_to_vec(&omitting, Protocol::Untagged, version).unwrap();
        let explicit_bytes = serialize_to_vec(&explicit, Protocol::Untagged, version).unwrap();
        assert_eq!(omitted_bytes, explicit_bytes);

        // Either layout reads back through the other schema.
        let crossed: AlwaysCfg =
            deserialize_from_slice(&omitted_bytes, Protocol::Untagged, version).unwrap();
        assert_eq!(crossed, explicit);
    }
}

#[test]
fn tagged_omission_reduces_to_a_bare_stop_marker() {
    let all_defaults = OptCfg::default();
    let bytes = serialize_to_vec(&all_defaults, Protocol::Tagged, VERSION_2).unwrap();
    assert_eq!(bytes, [WireType::Stop as u8]);

    let restored: OptCfg = deserialize_from_slice(&bytes, Protocol::Tagged, VERSION_2).unwrap();
    assert_eq!(restored.retries, 3);
    assert_eq!(restored.host, "localhost");
}

#[test]
fn non_default_optionals_are_written() {
    let cfg = OptCfg {
        retries: 5,
        host: "localhost".to_owned(),
    };
    let bytes = serialize_to_vec(&cfg, Protocol::Tagged, VERSION_2).unwrap();
    assert!(bytes.len() > 1);
    let restored: OptCfg = deserialize_from_slice(&bytes, Protocol::Tagged, VERSION_2).unwrap();
    assert_eq!(restored, cfg);
}

#[test]
fn every_unknown_field_shape_is_skipped() {
    let sink = KitchenSink {
        keep: 1234,
        ratio: 0.5,
        note: "skipped".to_owned(),
        wide: WString::from("wide skipped"),
        counts: vec![1, 2, 3],
        names: vec!["a".to_owned(), String::new(), "ccc".to_owned()],
        index: BTreeMap::from([("k1".to_owned(), 1), ("k2".to_owned(), 2)]),
        nested: InnerEvo { marker: 9 },
        bits: BTreeSet::from([0, 128, 255]),
        on: true,
    };
    for version in TAGGED_VERSIONS {
        let bytes = serialize_to_vec(&sink, Protocol::Tagged, version).unwrap();
        let keeper: Keeper = deserialize_from_slice(&bytes, Protocol::Tagged, version).unwrap();
        assert_eq!(keeper.keep, 1234);
        // Id 2 arrived as a double; the schema says int32, so it is
        // skipped and the declared default survives.
        assert_eq!(keeper.mismatch, 77);
    }
}

#[test]
fn derived_payload_reads_as_a_base_slice() {
    let dog = Dog {
        id: 7,
        name: "rex".to_owned(),
    };
    for (protocol, version) in [
        (Protocol::Tagged, VERSION_1),
        (Protocol::Tagged, VERSION_2),
        (Protocol::Untagged, VERSION_1),
        (Protocol::Untagged, VERSION_2),
    ] {
        let bytes = serialize_to_vec(&dog, protocol, version).unwrap();
        let creature: Creature = deserialize_from_slice(&bytes, protocol, version).unwrap();
        assert_eq!(creature.id, 7, "{protocol:?} v{version}");
    }
}

#[test]
fn base_payload_reads_as_a_derived_record_with_defaults() {
    let creature = Creature { id: 9 };
    for version in TAGGED_VERSIONS {
        let bytes = serialize_to_vec(&creature, Protocol::Tagged, version).unwrap();
        let dog: Dog = deserialize_from_slice(&bytes, Protocol::Tagged, version).unwrap();
        assert_eq!(dog.id, 9);
        assert_eq!(dog.name, "");
    }
}
