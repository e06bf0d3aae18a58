//! Protocol writer/reader seams and their two wire-format families.
//!
//! The traversal engine never touches bytes; it issues the verbs defined
//! here and the protocol implementation decides what, if anything, lands on
//! the wire. Format-specific decisions live entirely behind these traits:
//! the untagged family ([`UntaggedWriter`]/[`UntaggedReader`]) frames nothing
//! and relies on field position, the tagged family
//! ([`TaggedWriter`]/[`TaggedReader`]) prefixes every field with a
//! (wire type, id) header and can therefore skip what it does not recognize.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::format::{DefaultValue, WireType, VERSION_1, VERSION_2};
use crate::io::{StreamReader, StreamWriter};

mod tagged;
mod untagged;

#[cfg(test)]
mod proptest_tests;

pub use tagged::{TaggedReader, TaggedWriter};
pub use untagged::{UntaggedReader, UntaggedWriter};

/// Nested structs (and struct skips) beyond this depth abort the decode.
/// Bounds stack use against hostile deeply-nested input.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Format-agnostic write verbs issued by the traversal engine.
///
/// Implementations are free to make any verb a no-op; the untagged writer
/// does so for all framing verbs, because field position is its only
/// framing signal.
pub trait ProtocolWriter {
    /// Writes the self-description header (magic + version) ahead of a
    /// marshaled payload.
    fn write_marshal_header(&mut self) -> Result<()>;

    /// Marks the start of a struct value.
    fn write_struct_begin(&mut self) -> Result<()>;
    /// Marks the end of a struct value.
    fn write_struct_end(&mut self) -> Result<()>;
    /// Marks the start of an inherited (base) field segment.
    fn write_base_begin(&mut self) -> Result<()>;
    /// Marks the end of an inherited (base) field segment.
    fn write_base_end(&mut self) -> Result<()>;

    /// Announces a field of the given wire type and id.
    fn write_field_begin(&mut self, tag: WireType, id: u16) -> Result<()>;
    /// Closes the announced field.
    fn write_field_end(&mut self) -> Result<()>;
    /// Records that a field whose value equals its default is being left
    /// out. Tagged formats write nothing; the untagged format must emit the
    /// default's bytes, since a reader cannot tell omitted from written.
    fn write_field_omitted(&mut self, tag: WireType, id: u16, default: &DefaultValue)
        -> Result<()>;

    /// Opens a list or set of `count` elements.
    fn write_container_begin(&mut self, count: usize, element: WireType) -> Result<()>;
    /// Opens a map of `count` entries.
    fn write_map_begin(&mut self, count: usize, key: WireType, value: WireType) -> Result<()>;
    /// Closes the innermost open container.
    fn write_container_end(&mut self) -> Result<()>;

    /// Writes a bool value.
    fn write_bool(&mut self, value: bool) -> Result<()>;
    /// Writes an 8-bit unsigned value.
    fn write_u8(&mut self, value: u8) -> Result<()>;
    /// Writes a 16-bit unsigned value.
    fn write_u16(&mut self, value: u16) -> Result<()>;
    /// Writes a 32-bit unsigned value.
    fn write_u32(&mut self, value: u32) -> Result<()>;
    /// Writes a 64-bit unsigned value.
    fn write_u64(&mut self, value: u64) -> Result<()>;
    /// Writes an 8-bit signed value.
    fn write_i8(&mut self, value: i8) -> Result<()>;
    /// Writes a 16-bit signed value.
    fn write_i16(&mut self, value: i16) -> Result<()>;
    /// Writes a 32-bit signed value.
    fn write_i32(&mut self, value: i32) -> Result<()>;
    /// Writes a 64-bit signed value.
    fn write_i64(&mut self, value: i64) -> Result<()>;
    /// Writes a single-precision float.
    fn write_f32(&mut self, value: f32) -> Result<()>;
    /// Writes a double-precision float.
    fn write_f64(&mut self, value: f64) -> Result<()>;
    /// Writes a length-prefixed UTF-8 string.
    fn write_string(&mut self, value: &str) -> Result<()>;
    /// Writes a length-prefixed UTF-16LE string, counted in code units.
    fn write_wstring(&mut self, value: &str) -> Result<()>;
}

/// Read verbs shared by both format families.
pub trait ProtocolReader {
    /// Reads and validates the self-description header, rejecting payloads
    /// written by a different family or version.
    fn read_marshal_header(&mut self) -> Result<()>;

    /// Marks descent into a struct value; enforces [`MAX_NESTING_DEPTH`].
    fn read_struct_begin(&mut self) -> Result<()>;
    /// Marks ascent out of a struct value.
    fn read_struct_end(&mut self) -> Result<()>;
    /// Closes the innermost open container.
    fn read_container_end(&mut self) -> Result<()>;

    /// Reads a bool value; any nonzero byte is `true`.
    fn read_bool(&mut self) -> Result<bool>;
    /// Reads an 8-bit unsigned value.
    fn read_u8(&mut self) -> Result<u8>;
    /// Reads a 16-bit unsigned value.
    fn read_u16(&mut self) -> Result<u16>;
    /// Reads a 32-bit unsigned value.
    fn read_u32(&mut self) -> Result<u32>;
    /// Reads a 64-bit unsigned value.
    fn read_u64(&mut self) -> Result<u64>;
    /// Reads an 8-bit signed value.
    fn read_i8(&mut self) -> Result<i8>;
    /// Reads a 16-bit signed value.
    fn read_i16(&mut self) -> Result<i16>;
    /// Reads a 32-bit signed value.
    fn read_i32(&mut self) -> Result<i32>;
    /// Reads a 64-bit signed value.
    fn read_i64(&mut self) -> Result<i64>;
    /// Reads a single-precision float.
    fn read_f32(&mut self) -> Result<f32>;
    /// Reads a double-precision float.
    fn read_f64(&mut self) -> Result<f64>;
    /// Reads a length-prefixed UTF-8 string.
    fn read_string(&mut self) -> Result<String>;
    /// Reads a length-prefixed UTF-16LE string.
    fn read_wstring(&mut self) -> Result<String>;
}

/// Read verbs specific to the tagged family.
pub trait TaggedProtocolReader: ProtocolReader {
    /// Reads the next field header. Stop markers come back as
    /// `(WireType::Stop, 0)` / `(WireType::StopBase, 0)`.
    fn read_field_begin(&mut self) -> Result<(WireType, u16)>;
    /// Closes the current field.
    fn read_field_end(&mut self) -> Result<()>;
    /// Opens a list or set, yielding (element count, element wire type).
    fn read_container_begin(&mut self) -> Result<(u32, WireType)>;
    /// Opens a map, yielding (entry count, key wire type, value wire type).
    fn read_map_begin(&mut self) -> Result<(u32, WireType, WireType)>;
    /// Discards one value of the given wire type, recursing through nested
    /// containers and structs using only wire-type tags.
    fn skip(&mut self, tag: WireType) -> Result<()>;
}

/// Read verbs specific to the untagged family. Counts are all the framing
/// this format has; element types come from the schema.
pub trait UntaggedProtocolReader: ProtocolReader {
    /// Opens a list or set, yielding the element count.
    fn read_container_begin(&mut self) -> Result<u32>;
    /// Opens a map, yielding the entry count.
    fn read_map_begin(&mut self) -> Result<u32>;
}

/// Both families accept exactly versions 1 and 2.
pub(crate) fn check_version(version: u16) -> Result<()> {
    if (VERSION_1..=VERSION_2).contains(&version) {
        Ok(())
    } else {
        Err(Error::Argument(format!(
            "unsupported protocol version: {version}"
        )))
    }
}

/// Version 1 stores lengths and counts as fixed 4-byte signed integers,
/// version 2 as varints. The rule is shared by both families.
pub(crate) fn write_length<W: Write>(
    stream: &mut StreamWriter<W>,
    version: u16,
    len: usize,
) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| Error::Encoding(format!("length {len} exceeds the wire limit")))?;
    if version == VERSION_1 {
        let signed = i32::try_from(len)
            .map_err(|_| Error::Encoding(format!("length {len} exceeds the wire limit")))?;
        stream.write_i32(signed)
    } else {
        stream.write_var_u32(len)
    }
}

/// Counterpart of [`write_length`]; negative v1 lengths are malformed.
pub(crate) fn read_length<R: Read>(stream: &mut StreamReader<R>, version: u16) -> Result<u32> {
    if version == VERSION_1 {
        let len = stream.read_i32()?;
        u32::try_from(len).map_err(|_| Error::Encoding(format!("negative length {len}")))
    } else {
        stream.read_var_u32()
    }
}

pub(crate) fn enter_struct(depth: &mut usize) -> Result<()> {
    if *depth >= MAX_NESTING_DEPTH {
        return Err(Error::Encoding(format!(
            "struct nesting exceeds {MAX_NESTING_DEPTH} levels"
        )));
    }
    *depth += 1;
    Ok(())
}

pub(crate) fn leave_struct(depth: &mut usize) {
    *depth = depth.saturating_sub(1);
}
