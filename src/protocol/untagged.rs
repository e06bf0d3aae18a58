//! The untagged (positional) wire format, versions 1 and 2.
//!
//! Nothing frames a field: writer and reader must walk the exact same field
//! sequence, which is why this family is only safe when both endpoints share
//! the schema out of band. Struct, base and field verbs are no-ops; the only
//! version difference is the length rule (v1 fixed 4-byte signed, v2
//! varint).

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::format::{DefaultValue, MarshalHeader, Protocol, WireType};
use crate::io::{decode_utf16, encode_utf16, StreamReader, StreamWriter};
use crate::protocol::{
    check_version, enter_struct, leave_struct, read_length, write_length, ProtocolReader,
    ProtocolWriter, UntaggedProtocolReader,
};

/// Writes records positionally.
#[derive(Debug)]
pub struct UntaggedWriter<W: Write> {
    stream: StreamWriter<W>,
    version: u16,
}

impl<W: Write> UntaggedWriter<W> {
    /// Wraps a byte sink. Versions other than 1 and 2 are rejected with
    /// [`Error::Argument`].
    pub fn new(sink: W, version: u16) -> Result<Self> {
        check_version(version)?;
        Ok(Self {
            stream: StreamWriter::new(sink),
            version,
        })
    }

    /// The protocol version this writer emits.
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Flushes the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.stream.flush()
    }

    /// Unwraps the underlying sink.
    pub fn into_inner(self) -> W {
        self.stream.into_inner()
    }
}

impl<W: Write> ProtocolWriter for UntaggedWriter<W> {
    fn write_marshal_header(&mut self) -> Result<()> {
        let header = MarshalHeader::new(Protocol::Untagged, self.version);
        self.stream.write_bytes(&header.to_bytes())
    }

    // Position alone conveys identity; none of the framing verbs emit bytes.
    fn write_struct_begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_struct_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_base_begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_base_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_field_begin(&mut self, _tag: WireType, _id: u16) -> Result<()> {
        Ok(())
    }

    fn write_field_end(&mut self) -> Result<()> {
        Ok(())
    }

    /// An omitted field must be indistinguishable from an explicitly written
    /// default, so the default's bytes go on the wire. Container defaults
    /// become a zero count, not an absent field.
    fn write_field_omitted(
        &mut self,
        _tag: WireType,
        _id: u16,
        default: &DefaultValue,
    ) -> Result<()> {
        match default {
            DefaultValue::Bool(v) => self.write_bool(*v),
            DefaultValue::Int8(v) => self.write_i8(*v),
            DefaultValue::Int16(v) => self.write_i16(*v),
            DefaultValue::Int32(v) => self.write_i32(*v),
            DefaultValue::Int64(v) => self.write_i64(*v),
            DefaultValue::UInt8(v) => self.write_u8(*v),
            DefaultValue::UInt16(v) => self.write_u16(*v),
            DefaultValue::UInt32(v) => self.write_u32(*v),
            DefaultValue::UInt64(v) => self.write_u64(*v),
            DefaultValue::Float(v) => self.write_f32(*v),
            DefaultValue::Double(v) => self.write_f64(*v),
            DefaultValue::Str(v) => self.write_string(v),
            DefaultValue::WStr(v) => self.write_wstring(v),
            DefaultValue::Empty => write_length(&mut self.stream, self.version, 0),
        }
    }

    fn write_container_begin(&mut self, count: usize, _element: WireType) -> Result<()> {
        write_length(&mut self.stream, self.version, count)
    }

    fn write_map_begin(&mut self, count: usize, _key: WireType, _value: WireType) -> Result<()> {
        write_length(&mut self.stream, self.version, count)
    }

    fn write_container_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.stream.write_bool(value)
    }

    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.stream.write_u8(value)
    }

    fn write_u16(&mut self, value: u16) -> Result<()> {
        self.stream.write_u16(value)
    }

    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.stream.write_u32(value)
    }

    fn write_u64(&mut self, value: u64) -> Result<()> {
        self.stream.write_u64(value)
    }

    fn write_i8(&mut self, value: i8) -> Result<()> {
        self.stream.write_i8(value)
    }

    fn write_i16(&mut self, value: i16) -> Result<()> {
        self.stream.write_i16(value)
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.stream.write_i32(value)
    }

    fn write_i64(&mut self, value: i64) -> Result<()> {
        self.stream.write_i64(value)
    }

    fn write_f32(&mut self, value: f32) -> Result<()> {
        self.stream.write_f32(value)
    }

    fn write_f64(&mut self, value: f64) -> Result<()> {
        self.stream.write_f64(value)
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        write_length(&mut self.stream, self.version, bytes.len())?;
        self.stream.write_bytes(bytes)
    }

    fn write_wstring(&mut self, value: &str) -> Result<()> {
        let units = encode_utf16(value);
        write_length(&mut self.stream, self.version, units.len())?;
        self.stream.write_utf16_units(&units)
    }
}

/// Reads records positionally.
///
/// There is no unknown-field skip: constructed against a different field
/// sequence than the writer used, this reader silently misreads. That is an
/// inherent property of the format, not a recoverable condition.
#[derive(Debug)]
pub struct UntaggedReader<R: Read> {
    stream: StreamReader<R>,
    version: u16,
    depth: usize,
}

impl<R: Read> UntaggedReader<R> {
    /// Wraps a byte source. Versions other than 1 and 2 are rejected with
    /// [`Error::Argument`].
    pub fn new(source: R, version: u16) -> Result<Self> {
        check_version(version)?;
        Ok(Self {
            stream: StreamReader::new(source),
            version,
            depth: 0,
        })
    }

    /// The protocol version this reader expects.
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Unwraps the underlying source.
    pub fn into_inner(self) -> R {
        self.stream.into_inner()
    }
}

impl<R: Read> ProtocolReader for UntaggedReader<R> {
    fn read_marshal_header(&mut self) -> Result<()> {
        let mut raw = [0u8; MarshalHeader::SIZE];
        for slot in raw.iter_mut() {
            *slot = self.stream.read_u8()?;
        }
        let header = MarshalHeader::from_bytes(raw);
        if header.protocol()? != Protocol::Untagged || header.version != self.version {
            return Err(Error::UnknownProtocol {
                magic: header.magic,
                version: header.version,
            });
        }
        Ok(())
    }

    fn read_struct_begin(&mut self) -> Result<()> {
        enter_struct(&mut self.depth)
    }

    fn read_struct_end(&mut self) -> Result<()> {
        leave_struct(&mut self.depth);
        Ok(())
    }

    fn read_container_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_bool(&mut self) -> Result<bool> {
        self.stream.read_bool()
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.stream.read_u8()
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.stream.read_u16()
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.stream.read_u32()
    }

    fn read_u64(&mut self) -> Result<u64> {
        self.stream.read_u64()
    }

    fn read_i8(&mut self) -> Result<i8> {
        self.stream.read_i8()
    }

    fn read_i16(&mut self) -> Result<i16> {
        self.stream.read_i16()
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.stream.read_i32()
    }

    fn read_i64(&mut self) -> Result<i64> {
        self.stream.read_i64()
    }

    fn read_f32(&mut self) -> Result<f32> {
        self.stream.read_f32()
    }

    fn read_f64(&mut self) -> Result<f64> {
        self.stream.read_f64()
    }

    fn read_string(&mut self) -> Result<String> {
        let len = read_length(&mut self.stream, self.version)?;
        let bytes = self.stream.read_bytes(len as usize)?;
        String::from_utf8(bytes).map_err(|_| Error::Encoding("string is not valid UTF-8".into()))
    }

    fn read_wstring(&mut self) -> Result<String> {
        let count = read_length(&mut self.stream, self.version)?;
        let units = self.stream.read_utf16_units(count as usize)?;
        decode_utf16(&units)
    }
}

impl<R: Read> UntaggedProtocolReader for UntaggedReader<R> {
    fn read_container_begin(&mut self) -> Result<u32> {
        read_length(&mut self.stream, self.version)
    }

    fn read_map_begin(&mut self) -> Result<u32> {
        read_length(&mut self.stream, self.version)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::format::{VERSION_1, VERSION_2};

    fn writer(version: u16) -> UntaggedWriter<Vec<u8>> {
        UntaggedWriter::new(Vec::new(), version).unwrap()
    }

    #[test]
    fn constructor_rejects_unknown_versions() {
        for bad in [0u16, 3, 255] {
            assert!(matches!(
                UntaggedWriter::new(Vec::new(), bad),
                Err(Error::Argument(_))
            ));
            assert!(matches!(
                UntaggedReader::new(&[][..], bad),
                Err(Error::Argument(_))
            ));
        }
    }

    #[test]
    fn v1_lengths_are_fixed_four_bytes() {
        let mut w = writer(VERSION_1);
        w.write_string("ab").unwrap();
        assert_eq!(w.into_inner(), [0x02, 0x00, 0x00, 0x00, b'a', b'b']);
    }

    #[test]
    fn v2_lengths_are_varints() {
        let mut w = writer(VERSION_2);
        w.write_string("ab").unwrap();
        assert_eq!(w.into_inner(), [0x02, b'a', b'b']);
    }

    #[test]
    fn negative_v1_length_is_malformed() {
        let payload = (-1i32).to_le_bytes();
        let mut r = UntaggedReader::new(&payload[..], VERSION_1).unwrap();
        assert!(matches!(r.read_string(), Err(Error::Encoding(_))));
    }

    #[test]
    fn omitted_scalar_matches_explicit_default() {
        let mut explicit = writer(VERSION_2);
        explicit.write_i32(42).unwrap();

        let mut omitted = writer(VERSION_2);
        omitted
            .write_field_omitted(WireType::Int32, 7, &DefaultValue::Int32(42))
            .unwrap();

        assert_eq!(explicit.into_inner(), omitted.into_inner());
    }

    #[test]
    fn omitted_container_matches_explicit_empty_container() {
        for version in [VERSION_1, VERSION_2] {
            let mut explicit = writer(version);
            explicit
                .write_container_begin(0, WireType::Double)
                .unwrap();
            explicit.write_container_end().unwrap();

            let mut omitted = writer(version);
            omitted
                .write_field_omitted(WireType::List, 3, &DefaultValue::Empty)
                .unwrap();

            assert_eq!(explicit.into_inner(), omitted.into_inner());
        }
    }

    #[test]
    fn strings_round_trip_raw() {
        for version in [VERSION_1, VERSION_2] {
            let mut w = writer(version);
            w.write_string("grüße").unwrap();
            w.write_wstring("grüße 🌊").unwrap();
            let buf = w.into_inner();

            let mut r = UntaggedReader::new(&buf[..], version).unwrap();
            assert_eq!(r.read_string().unwrap(), "grüße");
            assert_eq!(r.read_wstring().unwrap(), "grüße 🌊");
        }
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let mut r = UntaggedReader::new(&[][..], VERSION_2).unwrap();
        for _ in 0..crate::protocol::MAX_NESTING_DEPTH {
            r.read_struct_begin().unwrap();
        }
        assert!(matches!(r.read_struct_begin(), Err(Error::Encoding(_))));
    }

    #[test]
    fn marshal_header_round_trips_and_rejects_foreign_family() {
        let mut w = writer(VERSION_2);
        w.write_marshal_header().unwrap();
        let buf = w.into_inner();

        let mut ok = UntaggedReader::new(&buf[..], VERSION_2).unwrap();
        ok.read_marshal_header().unwrap();

        let mut wrong_version = UntaggedReader::new(&buf[..], VERSION_1).unwrap();
        assert!(matches!(
            wrong_version.read_marshal_header(),
            Err(Error::UnknownProtocol { .. })
        ));
    }
}
