//! Defines the physical layout of the tagwire formats.
//!
//! # Wire Layout
//! Both format families reduce to the same primitive vocabulary; they differ
//! only in framing.
//!
//! Untagged payload: `[field 0 value] [field 1 value] ... [field N value]`
//!
//! Tagged payload: `[field header] [value] ... [STOP]`, where a struct with a
//! base type serializes as
//! `[base fields] [STOP_BASE] [own fields] [STOP]`, base-most segment first.
//!
//! ## Field Header Anatomy
//! Version 1: `[tag: u8] [id: u16 LE]`, three bytes, always.
//!
//! Version 2: `[id_bits(3) | tag(5)]`, one byte when the id fits the three
//! spare bits (id ≤ 5); larger ids set the escape value and follow as a
//! varint: `[110 | tag(5)] [id: varuint]`.
//!
//! A marshaled payload is prefixed by the 4-byte [`MarshalHeader`] so the
//! receiver can pick the right reader without out-of-band agreement.

use num_enum::TryFromPrimitive;

use crate::error::{Error, Result};

/// Lowest protocol version either family accepts.
pub const VERSION_1: u16 = 1;

/// Highest protocol version either family accepts.
pub const VERSION_2: u16 = 2;

/// Every value on the wire is associated with exactly one tag.
///
/// Tags drive encoding width on the write side and skip logic on the read
/// side. All non-reserved values fit in the low 5 bits of a header byte,
/// which is what makes the version-2 packed field header possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum WireType {
    /// Terminates a struct.
    Stop = 0,
    /// Terminates one inheritance segment; fields of the next-derived
    /// struct follow.
    StopBase = 1,
    /// One byte, zero = false.
    Bool = 2,
    /// Unsigned 8-bit integer.
    UInt8 = 3,
    /// Unsigned 16-bit integer.
    UInt16 = 4,
    /// Unsigned 32-bit integer.
    UInt32 = 5,
    /// Unsigned 64-bit integer.
    UInt64 = 6,
    /// IEEE 754 single-precision float.
    Float = 7,
    /// IEEE 754 double-precision float.
    Double = 8,
    /// Length-prefixed UTF-8 text.
    String = 9,
    /// Nested struct value.
    Struct = 10,
    /// Ordered container of one element type.
    List = 11,
    /// Container of unique elements of one element type.
    Set = 12,
    /// Container of (key, value) pairs.
    Map = 13,
    /// Signed 8-bit integer.
    Int8 = 14,
    /// Signed 16-bit integer.
    Int16 = 15,
    /// Signed 32-bit integer.
    Int32 = 16,
    /// Signed 64-bit integer.
    Int64 = 17,
    /// Length-prefixed UTF-16LE text, counted in code units.
    WString = 18,
    /// Reserved; never valid on the wire.
    Unavailable = 127,
}

impl WireType {
    /// Decodes a tag byte, mapping unknown values to an [`Error::Encoding`].
    pub fn from_byte(byte: u8) -> Result<Self> {
        Self::try_from_primitive(byte)
            .map_err(|_| Error::Encoding(format!("invalid wire type tag {byte:#04x}")))
    }

    /// Width in bytes of a value of this type, for fixed-width types only.
    ///
    /// Variable-width types (strings, containers, structs) and the marker
    /// tags return `None`.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float => Some(4),
            Self::Int64 | Self::UInt64 | Self::Double => Some(8),
            _ => None,
        }
    }
}

/// Format family identity. The discriminant is the 2-byte marshaling magic.
///
/// The magics spell "UP" and "TP" when written little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u16)]
pub enum Protocol {
    /// Positional format; both sides must agree on the schema out of band.
    Untagged = 0x5055,
    /// Self-framing format; readers skip what they do not recognize.
    Tagged = 0x5054,
}

impl Protocol {
    /// The magic value written ahead of a marshaled payload.
    pub fn magic(self) -> u16 {
        self as u16
    }
}

/// A version-2 tagged field header byte.
///
/// Layout: `[id_bits(3) | tag(5)]`. The three id bits hold the field id
/// directly when it is at most [`PackedTag::DIRECT_ID_MAX`]; the escape
/// value signals that the id follows as a varint. Value 7 is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedTag(u8);

impl PackedTag {
    const TAG_MASK: u8 = 0b0001_1111; // low 5 bits
    const ID_SHIFT: u8 = 5;

    /// Largest field id that packs directly into the header byte.
    pub const DIRECT_ID_MAX: u16 = 5;
    /// Id-bits value meaning "id follows as a varint".
    pub const ID_ESCAPE: u8 = 6;
    /// Id-bits value rejected on read.
    pub const ID_RESERVED: u8 = 7;

    /// Packs a header byte. Returns the byte and whether the id still has
    /// to be written separately.
    pub fn pack(tag: WireType, id: u16) -> (Self, bool) {
        if id <= Self::DIRECT_ID_MAX {
            (Self((id as u8) << Self::ID_SHIFT | tag as u8), false)
        } else {
            (Self(Self::ID_ESCAPE << Self::ID_SHIFT | tag as u8), true)
        }
    }

    /// Wraps a raw header byte read from the wire.
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// The wire-type tag in the low 5 bits.
    pub fn wire_type(&self) -> Result<WireType> {
        WireType::from_byte(self.0 & Self::TAG_MASK)
    }

    /// The three id bits above the tag.
    pub fn id_bits(&self) -> u8 {
        self.0 >> Self::ID_SHIFT
    }

    /// Returns the raw byte representation.
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

/// The self-description header written by `marshal` ahead of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarshalHeader {
    /// Format-family magic; see [`Protocol`].
    pub magic: u16,
    /// Protocol version the payload was written with.
    pub version: u16,
}

impl MarshalHeader {
    /// The size in bytes of a serialized header.
    /// Magic(2) + Version(2) = 4
    pub const SIZE: usize = 4;

    /// Builds the header for a (protocol, version) pair.
    pub fn new(protocol: Protocol, version: u16) -> Self {
        Self {
            magic: protocol.magic(),
            version,
        }
    }

    /// Serializes to a fixed-size byte array (Little Endian).
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..2].copy_from_slice(&self.magic.to_le_bytes());
        buf[2..4].copy_from_slice(&self.version.to_le_bytes());
        buf
    }

    /// Deserializes from a fixed-size byte array.
    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let version = u16::from_le_bytes([bytes[2], bytes[3]]);
        Self { magic, version }
    }

    /// Resolves the protocol family, rejecting unknown magics and versions
    /// outside the supported range.
    pub fn protocol(&self) -> Result<Protocol> {
        let unknown = || Error::UnknownProtocol {
            magic: self.magic,
            version: self.version,
        };
        if !(VERSION_1..=VERSION_2).contains(&self.version) {
            return Err(unknown());
        }
        Protocol::try_from_primitive(self.magic).map_err(|_| unknown())
    }
}

/// Wire-level rendition of a field's default, used by the untagged
/// omitted-field path.
///
/// The untagged format has no per-field presence signal, so omitting a field
/// means writing bytes indistinguishable from an explicit write of its
/// default. Container defaults collapse to [`DefaultValue::Empty`], written
/// as a zero count. Struct fields have no wire-level default and are never
/// omitted.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// Default for a `bool` field.
    Bool(bool),
    /// Default for an `int8` field.
    Int8(i8),
    /// Default for an `int16` field.
    Int16(i16),
    /// Default for an `int32` field.
    Int32(i32),
    /// Default for an `int64` field.
    Int64(i64),
    /// Default for a `uint8` field.
    UInt8(u8),
    /// Default for a `uint16` field.
    UInt16(u16),
    /// Default for a `uint32` field.
    UInt32(u32),
    /// Default for a `uint64` field.
    UInt64(u64),
    /// Default for a `float` field.
    Float(f32),
    /// Default for a `double` field.
    Double(f64),
    /// Default for a UTF-8 string field.
    Str(String),
    /// Default for a UTF-16 string field.
    WStr(String),
    /// Default for any container field: the empty container.
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_type_round_trips_through_bytes() {
        for ty in [
            WireType::Stop,
            WireType::Bool,
            WireType::Double,
            WireType::WString,
            WireType::Map,
            WireType::Int64,
        ] {
            assert_eq!(WireType::from_byte(ty as u8).ok(), Some(ty));
        }
    }

    #[test]
    fn unknown_tag_byte_is_rejected() {
        assert!(matches!(WireType::from_byte(19), Err(Error::Encoding(_))));
        assert!(matches!(WireType::from_byte(0xFF), Err(Error::Encoding(_))));
    }

    #[test]
    fn packed_tag_small_ids_fit_one_byte() {
        let (packed, id_follows) = PackedTag::pack(WireType::Int32, 5);
        assert!(!id_follows);
        assert_eq!(packed.id_bits(), 5);
        assert_eq!(packed.wire_type().ok(), Some(WireType::Int32));
    }

    #[test]
    fn packed_tag_large_ids_escape() {
        let (packed, id_follows) = PackedTag::pack(WireType::String, 6);
        assert!(id_follows);
        assert_eq!(packed.id_bits(), PackedTag::ID_ESCAPE);
        assert_eq!(packed.wire_type().ok(), Some(WireType::String));
    }

    #[test]
    fn stop_markers_are_whole_header_bytes() {
        assert_eq!(PackedTag::pack(WireType::Stop, 0).0.as_u8(), 0x00);
        assert_eq!(PackedTag::pack(WireType::StopBase, 0).0.as_u8(), 0x01);
    }

    #[test]
    fn marshal_header_round_trips() {
        let header = MarshalHeader::new(Protocol::Tagged, VERSION_2);
        let restored = MarshalHeader::from_bytes(header.to_bytes());
        assert_eq!(restored, header);
        assert_eq!(restored.protocol().ok(), Some(Protocol::Tagged));
    }

    #[test]
    fn marshal_header_rejects_unknown_magic_and_version() {
        let bad_magic = MarshalHeader {
            magic: 0x0000,
            version: VERSION_1,
        };
        assert!(matches!(
            bad_magic.protocol(),
            Err(Error::UnknownProtocol { .. })
        ));

        let bad_version = MarshalHeader::new(Protocol::Untagged, 3);
        assert!(matches!(
            bad_version.protocol(),
            Err(Error::UnknownProtocol { .. })
        ));
    }
}
