//! High-level entry points: typed serializers, the marshal façade, and
//! byte/file conveniences.
//!
//! [`Serializer`] and [`Deserializer`] resolve a type's descriptor once and
//! reuse it across calls; the free functions resolve per call and exist for
//! the one-shot case. [`marshal`] and [`unmarshal`] add the self-describing
//! header so the reading side needs no out-of-band agreement about which
//! wire format a payload uses.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use crate::engine;
use crate::error::Result;
use crate::format::{MarshalHeader, Protocol};
use crate::io::StreamReader;
use crate::protocol::{
    ProtocolWriter, TaggedProtocolReader, TaggedReader, TaggedWriter, UntaggedProtocolReader,
    UntaggedReader, UntaggedWriter,
};
use crate::schema::{Record, StructDescriptor};

/// Serializes values of one record type through a cached descriptor.
pub struct Serializer<T: Record> {
    descriptor: Arc<StructDescriptor>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> Serializer<T> {
    /// Resolves the descriptor for `T`.
    pub fn new() -> Result<Self> {
        Ok(Self {
            descriptor: T::descriptor()?,
            _marker: PhantomData,
        })
    }

    /// The descriptor this serializer walks.
    pub fn descriptor(&self) -> &Arc<StructDescriptor> {
        &self.descriptor
    }

    /// Writes one value through any protocol writer.
    pub fn serialize(&self, value: &T, writer: &mut dyn ProtocolWriter) -> Result<()> {
        engine::serialize(value, &self.descriptor, writer)
    }
}

/// Deserializes values of one record type through a cached descriptor.
pub struct Deserializer<T: Record> {
    descriptor: Arc<StructDescriptor>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> Deserializer<T> {
    /// Resolves the descriptor for `T`.
    pub fn new() -> Result<Self> {
        Ok(Self {
            descriptor: T::descriptor()?,
            _marker: PhantomData,
        })
    }

    /// Reads one value from a tagged payload.
    pub fn deserialize_tagged(&self, reader: &mut dyn TaggedProtocolReader) -> Result<T> {
        let mut record = self.descriptor.initialize()?;
        engine::deserialize_tagged_into(record.as_mut(), &self.descriptor, reader)?;
        engine::downcast_record(record)
    }

    /// Reads one value from an untagged payload.
    pub fn deserialize_untagged(&self, reader: &mut dyn UntaggedProtocolReader) -> Result<T> {
        let mut record = self.descriptor.initialize()?;
        engine::deserialize_untagged_into(record.as_mut(), &self.descriptor, reader)?;
        engine::downcast_record(record)
    }
}

/// Writes a self-describing payload: the marshal header, then the record.
pub fn marshal<T: Record>(value: &T, writer: &mut dyn ProtocolWriter) -> Result<()> {
    writer.write_marshal_header()?;
    engine::write_struct_value(value, writer)
}

/// Reads a self-describing payload, dispatching on its header.
///
/// The header names the wire family and version the payload was written
/// with; an unrecognized pair fails with
/// [`Error::UnknownProtocol`](crate::error::Error::UnknownProtocol) before
/// any of the payload is consumed.
pub fn unmarshal<T: Record, R: Read>(source: R) -> Result<T> {
    let mut stream = StreamReader::new(source);
    let mut raw = [0u8; MarshalHeader::SIZE];
    for slot in raw.iter_mut() {
        *slot = stream.read_u8()?;
    }
    let header = MarshalHeader::from_bytes(raw);
    match header.protocol()? {
        Protocol::Tagged => {
            let mut reader = TaggedReader::new(stream.into_inner(), header.version)?;
            engine::read_struct_value_tagged(&mut reader)
        }
        Protocol::Untagged => {
            let mut reader = UntaggedReader::new(stream.into_inner(), header.version)?;
            engine::read_struct_value_untagged(&mut reader)
        }
    }
}

/// Serializes one value to bytes with the given format and version.
pub fn serialize_to_vec<T: Record>(
    value: &T,
    protocol: Protocol,
    version: u16,
) -> Result<Vec<u8>> {
    match protocol {
        Protocol::Tagged => {
            let mut writer = TaggedWriter::new(Vec::new(), version)?;
            engine::write_struct_value(value, &mut writer)?;
            Ok(writer.into_inner())
        }
        Protocol::Untagged => {
            let mut writer = UntaggedWriter::new(Vec::new(), version)?;
            engine::write_struct_value(value, &mut writer)?;
            Ok(writer.into_inner())
        }
    }
}

/// Deserializes one value from bytes written with the given format and
/// version. Trailing bytes are ignored; a tagged payload of a more derived
/// type legitimately leaves its tail unread.
pub fn deserialize_from_slice<T: Record>(
    bytes: &[u8],
    protocol: Protocol,
    version: u16,
) -> Result<T> {
    match protocol {
        Protocol::Tagged => {
            let mut reader = TaggedReader::new(bytes, version)?;
            engine::read_struct_value_tagged(&mut reader)
        }
        Protocol::Untagged => {
            let mut reader = UntaggedReader::new(bytes, version)?;
            engine::read_struct_value_untagged(&mut reader)
        }
    }
}

/// Marshals one value to bytes with the given format and version.
pub fn marshal_to_vec<T: Record>(
    value: &T,
    protocol: Protocol,
    version: u16,
) -> Result<Vec<u8>> {
    match protocol {
        Protocol::Tagged => {
            let mut writer = TaggedWriter::new(Vec::new(), version)?;
            marshal(value, &mut writer)?;
            Ok(writer.into_inner())
        }
        Protocol::Untagged => {
            let mut writer = UntaggedWriter::new(Vec::new(), version)?;
            marshal(value, &mut writer)?;
            Ok(writer.into_inner())
        }
    }
}

/// Unmarshals one value from self-describing bytes.
pub fn unmarshal_from_slice<T: Record>(bytes: &[u8]) -> Result<T> {
    unmarshal(bytes)
}

/// Marshals one value straight to a file.
pub fn marshal_to_file<T, P>(path: P, value: &T, protocol: Protocol, version: u16) -> Result<()>
where
    T: Record,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut sink = BufWriter::new(file);
    match protocol {
        Protocol::Tagged => {
            let mut writer = TaggedWriter::new(&mut sink, version)?;
            marshal(value, &mut writer)?;
            writer.flush()?;
        }
        Protocol::Untagged => {
            let mut writer = UntaggedWriter::new(&mut sink, version)?;
            marshal(value, &mut writer)?;
            writer.flush()?;
        }
    }
    sink.flush()?;
    Ok(())
}

/// Unmarshals one value from a file written by [`marshal_to_file`].
pub fn unmarshal_from_file<T, P>(path: P) -> Result<T>
where
    T: Record,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    unmarshal(BufReader::new(file))
}
