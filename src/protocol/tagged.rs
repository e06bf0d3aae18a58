//! The tagged (self-framing) wire format, versions 1 and 2.
//!
//! Every field is announced by a (wire type, id) header and every struct ends
//! with a stop marker, so a reader can walk a payload it only partially
//! understands: recognized ids dispatch into the schema, everything else is
//! skipped by tag. This is the format that survives schema evolution.
//!
//! Version 1 spends a fixed 3 bytes per field header; version 2 packs small
//! ids into the header byte itself and encodes lengths as varints.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::format::{DefaultValue, MarshalHeader, PackedTag, Protocol, WireType, VERSION_1};
use crate::io::{decode_utf16, encode_utf16, StreamReader, StreamWriter};
use crate::protocol::{
    check_version, enter_struct, leave_struct, read_length, write_length, ProtocolReader,
    ProtocolWriter, TaggedProtocolReader,
};

/// Writes records with per-field framing.
#[derive(Debug)]
pub struct TaggedWriter<W: Write> {
    stream: StreamWriter<W>,
    version: u16,
}

impl<W: Write> TaggedWriter<W> {
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

impl<W: Write> ProtocolWriter for TaggedWriter<W> {
    fn write_marshal_header(&mut self) -> Result<()> {
        let header = MarshalHeader::new(Protocol::Tagged, self.version);
        self.stream.write_bytes(&header.to_bytes())
    }

    fn write_struct_begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// The struct terminator; readers stop their field loop here.
    fn write_struct_end(&mut self) -> Result<()> {
        self.stream.write_u8(WireType::Stop as u8)
    }

    fn write_base_begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// Terminates one inheritance segment; derived fields follow.
    fn write_base_end(&mut self) -> Result<()> {
        self.stream.write_u8(WireType::StopBase as u8)
    }

    fn write_field_begin(&mut self, tag: WireType, id: u16) -> Result<()> {
        if self.version == VERSION_1 {
            self.stream.write_u8(tag as u8)?;
            self.stream.write_u16(id)
        } else {
            let (packed, id_follows) = PackedTag::pack(tag, id);
            self.stream.write_u8(packed.as_u8())?;
            if id_follows {
                self.stream.write_var_u16(id)?;
            }
            Ok(())
        }
    }

    fn write_field_end(&mut self) -> Result<()> {
        Ok(())
    }

    /// Omission is free in this family: the field header simply never
    /// appears, and the reader restores the default on its own side.
    fn write_field_omitted(
        &mut self,
        _tag: WireType,
        _id: u16,
        _default: &DefaultValue,
    ) -> Result<()> {
        Ok(())
    }

    fn write_container_begin(&mut self, count: usize, element: WireType) -> Result<()> {
        self.stream.write_u8(element as u8)?;
        write_length(&mut self.stream, self.version, count)
    }

    fn write_map_begin(&mut self, count: usize, key: WireType, value: WireType) -> Result<()> {
        self.stream.write_u8(key as u8)?;
        self.stream.write_u8(value as u8)?;
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

/// Reads records with per-field framing, skipping what it does not
/// recognize.
#[derive(Debug)]
pub struct TaggedReader<R: Read> {
    stream: StreamReader<R>,
    version: u16,
    depth: usize,
}

impl<R: Read> TaggedReader<R> {
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

    fn read_packed_field_begin(&mut self) -> Result<(WireType, u16)> {
        let packed = PackedTag::from_byte(self.stream.read_u8()?);
        let tag = packed.wire_type()?;
        if matches!(tag, WireType::Stop | WireType::StopBase) {
            return Ok((tag, 0));
        }
        let id = match packed.id_bits() {
            bits if u16::from(bits) <= PackedTag::DIRECT_ID_MAX => u16::from(bits),
            PackedTag::ID_ESCAPE => self.stream.read_var_u16()?,
            _ => {
                return Err(Error::Encoding(
                    "reserved id bits in packed field header".into(),
                ))
            }
        };
        Ok((tag, id))
    }
}

impl<R: Read> ProtocolReader for TaggedReader<R> {
    fn read_marshal_header(&mut self) -> Result<()> {
        let mut raw = [0u8; MarshalHeader::SIZE];
        for slot in raw.iter_mut() {
            *slot = self.stream.read_u8()?;
        }
        let header = MarshalHeader::from_bytes(raw);
        if header.protocol()? != Protocol::Tagged || header.version != self.version {
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

impl<R: Read> TaggedProtocolReader for TaggedReader<R> {
    fn read_field_begin(&mut self) -> Result<(WireType, u16)> {
        if self.version == VERSION_1 {
            let tag = WireType::from_byte(self.stream.read_u8()?)?;
            if matches!(tag, WireType::Stop | WireType::StopBase) {
                return Ok((tag, 0));
            }
            let id = self.stream.read_u16()?;
            Ok((tag, id))
        } else {
            self.read_packed_field_begin()
        }
    }

    fn read_field_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_container_begin(&mut self) -> Result<(u32, WireType)> {
        let element = WireType::from_byte(self.stream.read_u8()?)?;
        let count = read_length(&mut self.stream, self.version)?;
        Ok((count, element))
    }

    fn read_map_begin(&mut self) -> Result<(u32, WireType, WireType)> {
        let key = WireType::from_byte(self.stream.read_u8()?)?;
        let value = WireType::from_byte(self.stream.read_u8()?)?;
        let count = read_length(&mut self.stream, self.version)?;
        Ok((count, key, value))
    }

    fn skip(&mut self, tag: WireType) -> Result<()> {
        if let Some(width) = tag.fixed_width() {
            return self.stream.skip(width);
        }
        match tag {
            WireType::String => {
                let len = read_length(&mut self.stream, self.version)?;
                self.stream.skip(len as usize)
            }
            WireType::WString => {
                let count = read_length(&mut self.stream, self.version)? as usize;
                let bytes = count
                    .checked_mul(2)
                    .ok_or_else(|| Error::Encoding("wide string length overflows".into()))?;
                self.stream.skip(bytes)
            }
            WireType::List | WireType::Set => {
                let (count, element) = self.read_container_begin()?;
                // Runs of fixed-width elements skip as one byte run.
                if let Some(width) = element.fixed_width() {
                    let total = (count as usize)
                        .checked_mul(width)
                        .ok_or_else(|| Error::Encoding("container length overflows".into()))?;
                    self.stream.skip(total)
                } else {
                    for _ in 0..count {
                        self.skip(element)?;
                    }
                    self.read_container_end()
                }
            }
            WireType::Map => {
                let (count, key, value) = self.read_map_begin()?;
                for _ in 0..count {
                    self.skip(key)?;
                    self.skip(value)?;
                }
                self.read_container_end()
            }
            WireType::Struct => {
                self.read_struct_begin()?;
                loop {
                    let (field_tag, _id) = self.read_field_begin()?;
                    match field_tag {
                        WireType::Stop => break,
                        // Base segments of the skipped struct keep going.
                        WireType::StopBase => continue,
                        other => self.skip(other)?,
                    }
                }
                self.read_struct_end()
            }
            other => Err(Error::Encoding(format!(
                "cannot skip value of wire type {other:?}"
            ))),
        }
    }
}
