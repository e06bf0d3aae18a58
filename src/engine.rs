//! Schema-driven traversal: serializes and deserializes any `dyn Record`
//! by walking its [`StructDescriptor`] and issuing protocol verbs.
//!
//! The engine is the only place that understands field order, inheritance
//! segments, omission, and required-field enforcement. Protocols decide how
//! verbs land on the wire; descriptors decide which verbs are issued.
//!
//! Inheritance travels base-most first. Each base segment is closed by a
//! `StopBase` marker and the most-derived segment by `Stop`, so a tagged
//! reader can stop early (reading a base slice of a derived payload) or run
//! out of segments early (reading a derived schema from a base payload) and
//! still land in a consistent state.

use crate::error::{Error, Result};
use crate::format::WireType;
use crate::protocol::{ProtocolWriter, TaggedProtocolReader, UntaggedProtocolReader};
use crate::schema::descriptor::{Modifier, StructDescriptor};
use crate::schema::Record;

/// Which marker ended a run of fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldsEnd {
    Stop,
    StopBase,
}

/// Writes one record as a struct value, inheritance segments included.
pub fn serialize(
    value: &dyn Record,
    descriptor: &StructDescriptor,
    writer: &mut dyn ProtocolWriter,
) -> Result<()> {
    writer.write_struct_begin()?;
    write_fields(value, descriptor, writer)?;
    writer.write_struct_end()
}

fn write_fields(
    value: &dyn Record,
    descriptor: &StructDescriptor,
    writer: &mut dyn ProtocolWriter,
) -> Result<()> {
    if let Some(base) = descriptor.base() {
        writer.write_base_begin()?;
        write_fields(value, base, writer)?;
        writer.write_base_end()?;
    }
    for field in descriptor.fields() {
        if field.modifier() == Modifier::Optional {
            if let Some(default) = field.codec().default_variant() {
                if field.codec().is_default(value)? {
                    writer.write_field_omitted(field.wire_type(), field.id(), &default)?;
                    continue;
                }
            }
        }
        writer.write_field_begin(field.wire_type(), field.id())?;
        field.codec().encode(value, writer)?;
        writer.write_field_end()?;
    }
    Ok(())
}

/// Fills a record from a tagged payload.
///
/// Every field is first reset to its declared default, so fields absent
/// from the payload come out at their defaults. Unknown fields are skipped
/// by wire type; a known id whose wire type disagrees with the schema is
/// treated as unknown, which is how a field that changed type reads against
/// the old schema. If the payload is a derived type, fields beyond this
/// descriptor's chain are left unread in the stream.
pub fn deserialize_tagged_into(
    record: &mut dyn Record,
    descriptor: &StructDescriptor,
    reader: &mut dyn TaggedProtocolReader,
) -> Result<()> {
    descriptor.apply_defaults(record)?;
    reader.read_struct_begin()?;
    read_fields_tagged(record, descriptor, reader)?;
    reader.read_struct_end()
}

fn read_fields_tagged(
    record: &mut dyn Record,
    descriptor: &StructDescriptor,
    reader: &mut dyn TaggedProtocolReader,
) -> Result<FieldsEnd> {
    if let Some(base) = descriptor.base() {
        if read_fields_tagged(record, base, reader)? == FieldsEnd::Stop {
            // The writer's chain ended below us. Our own segment never
            // arrives, so only the required check remains.
            verify_required(descriptor, &[])?;
            return Ok(FieldsEnd::Stop);
        }
    }

    let mut seen = Vec::new();
    loop {
        let (tag, id) = reader.read_field_begin()?;
        let end = match tag {
            WireType::Stop => FieldsEnd::Stop,
            WireType::StopBase => FieldsEnd::StopBase,
            _ => {
                match descriptor.field_by_id(id) {
                    Some(field) if field.wire_type() == tag => {
                        field.codec().decode_tagged(record, reader)?;
                        seen.push(id);
                    }
                    _ => reader.skip(tag)?,
                }
                reader.read_field_end()?;
                continue;
            }
        };
        verify_required(descriptor, &seen)?;
        return Ok(end);
    }
}

fn verify_required(descriptor: &StructDescriptor, seen: &[u16]) -> Result<()> {
    for field in descriptor.fields() {
        if field.modifier() == Modifier::Required && !seen.contains(&field.id()) {
            return Err(Error::MissingRequiredField {
                type_name: descriptor.name(),
                field_name: field.name(),
                id: field.id(),
            });
        }
    }
    Ok(())
}

/// Fills a record from an untagged payload.
///
/// The payload carries no framing, so the schema dictates everything:
/// every field of every segment is read, in declaration order, base-most
/// segment first. Required modifiers are not enforced here; an untagged
/// payload always contains every field.
pub fn deserialize_untagged_into(
    record: &mut dyn Record,
    descriptor: &StructDescriptor,
    reader: &mut dyn UntaggedProtocolReader,
) -> Result<()> {
    reader.read_struct_begin()?;
    read_fields_untagged(record, descriptor, reader)?;
    reader.read_struct_end()
}

fn read_fields_untagged(
    record: &mut dyn Record,
    descriptor: &StructDescriptor,
    reader: &mut dyn UntaggedProtocolReader,
) -> Result<()> {
    if let Some(base) = descriptor.base() {
        read_fields_untagged(record, base, reader)?;
    }
    for field in descriptor.fields() {
        field.codec().decode_untagged(record, reader)?;
    }
    Ok(())
}

/// Serializes a typed value through its own descriptor.
///
/// This is also the write half of a hand-written
/// [`WireValue`](crate::schema::WireValue) impl for a struct-typed field.
pub fn write_struct_value<T: Record>(value: &T, writer: &mut dyn ProtocolWriter) -> Result<()> {
    let descriptor = T::descriptor()?;
    serialize(value, &descriptor, writer)
}

/// Reads a typed value from a tagged payload.
pub fn read_struct_value_tagged<T: Record>(reader: &mut dyn TaggedProtocolReader) -> Result<T> {
    let descriptor = T::descriptor()?;
    let mut record = descriptor.initialize()?;
    deserialize_tagged_into(record.as_mut(), &descriptor, reader)?;
    downcast_record(record)
}

/// Reads a typed value from an untagged payload.
pub fn read_struct_value_untagged<T: Record>(
    reader: &mut dyn UntaggedProtocolReader,
) -> Result<T> {
    let descriptor = T::descriptor()?;
    let mut record = descriptor.initialize()?;
    deserialize_untagged_into(record.as_mut(), &descriptor, reader)?;
    downcast_record(record)
}

/// Builds a `T` with every field at its descriptor-declared default.
///
/// Unlike `T::default()`, this honors defaults declared through
/// `field_with_default`, which is what a reader restores for absent fields.
pub fn initialize_as<T: Record>() -> Result<T> {
    let descriptor = T::descriptor()?;
    downcast_record(descriptor.initialize()?)
}

pub(crate) fn downcast_record<T: Record>(record: Box<dyn Record>) -> Result<T> {
    record
        .into_any()
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| Error::Internal("descriptor constructed a record of the wrong type".into()))
}
