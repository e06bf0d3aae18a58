//! Runtime descriptors: the schema a record carries about itself.
//!
//! A [`StructDescriptor`] holds everything the traversal engine needs to
//! serialize or deserialize a record without compile-time knowledge of its
//! type: an ordered field list, an optional base descriptor, and a
//! constructor. Each [`FieldDescriptor`] pairs wire metadata (id, tag,
//! modifier) with a type-erased codec that projects the field out of
//! `dyn Record` and moves it across a protocol boundary.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::format::{DefaultValue, WireType};
use crate::protocol::{ProtocolWriter, TaggedProtocolReader, UntaggedProtocolReader};
use crate::schema::value::WireValue;
use crate::schema::Record;

/// Presence rules for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    /// Written only when the value differs from the field default; a reader
    /// that does not find it restores the default silently.
    Optional,
    /// Always written; a tagged reader that does not find it fails the
    /// whole deserialization.
    Required,
    /// Always written but never enforced on read. The migration state
    /// between the other two: deploy writers first, tighten readers later.
    RequiredOptional,
}

/// Type-erased access to one field of one record type.
///
/// Built by [`StructBuilder`]; every method downcasts the record to the
/// concrete type captured at build time, so a descriptor applied to the
/// wrong record surfaces [`Error::Internal`] instead of corrupting data.
pub(crate) trait FieldCodec: Send + Sync {
    /// Writes the field's current value.
    fn encode(&self, record: &dyn Record, writer: &mut dyn ProtocolWriter) -> Result<()>;
    /// Replaces the field's value from a tagged payload.
    fn decode_tagged(
        &self,
        record: &mut dyn Record,
        reader: &mut dyn TaggedProtocolReader,
    ) -> Result<()>;
    /// Replaces the field's value from an untagged payload.
    fn decode_untagged(
        &self,
        record: &mut dyn Record,
        reader: &mut dyn UntaggedProtocolReader,
    ) -> Result<()>;
    /// Restores the field to its declared default.
    fn reset(&self, record: &mut dyn Record) -> Result<()>;
    /// Whether the field currently equals its declared default.
    fn is_default(&self, record: &dyn Record) -> Result<bool>;
    /// Copies the field's value from one record into another.
    fn clone_into(&self, source: &dyn Record, target: &mut dyn Record) -> Result<()>;
    /// The declared default as an omittable wire value, if one exists.
    fn default_variant(&self) -> Option<DefaultValue>;
}

struct FieldAccessor<R, T> {
    get: fn(&R) -> &T,
    get_mut: fn(&mut R) -> &mut T,
    default: T,
}

fn concrete<R: Record>(record: &dyn Record) -> Result<&R> {
    record
        .as_any()
        .downcast_ref::<R>()
        .ok_or_else(|| Error::Internal("record does not match its descriptor's type".into()))
}

fn concrete_mut<R: Record>(record: &mut dyn Record) -> Result<&mut R> {
    record
        .as_any_mut()
        .downcast_mut::<R>()
        .ok_or_else(|| Error::Internal("record does not match its descriptor's type".into()))
}

impl<R: Record, T: WireValue> FieldCodec for FieldAccessor<R, T> {
    fn encode(&self, record: &dyn Record, writer: &mut dyn ProtocolWriter) -> Result<()> {
        (self.get)(concrete::<R>(record)?).write(writer)
    }

    fn decode_tagged(
        &self,
        record: &mut dyn Record,
        reader: &mut dyn TaggedProtocolReader,
    ) -> Result<()> {
        *(self.get_mut)(concrete_mut::<R>(record)?) = T::read_tagged(reader)?;
        Ok(())
    }

    fn decode_untagged(
        &self,
        record: &mut dyn Record,
        reader: &mut dyn UntaggedProtocolReader,
    ) -> Result<()> {
        *(self.get_mut)(concrete_mut::<R>(record)?) = T::read_untagged(reader)?;
        Ok(())
    }

    fn reset(&self, record: &mut dyn Record) -> Result<()> {
        *(self.get_mut)(concrete_mut::<R>(record)?) = self.default.clone();
        Ok(())
    }

    fn is_default(&self, record: &dyn Record) -> Result<bool> {
        Ok((self.get)(concrete::<R>(record)?) == &self.default)
    }

    fn clone_into(&self, source: &dyn Record, target: &mut dyn Record) -> Result<()> {
        let value = (self.get)(concrete::<R>(source)?).clone();
        *(self.get_mut)(concrete_mut::<R>(target)?) = value;
        Ok(())
    }

    fn default_variant(&self) -> Option<DefaultValue> {
        self.default.default_variant()
    }
}

/// One field of a described struct.
pub struct FieldDescriptor {
    id: u16,
    name: &'static str,
    wire_type: WireType,
    modifier: Modifier,
    codec: Box<dyn FieldCodec>,
}

impl FieldDescriptor {
    /// The field's wire id, unique within its struct.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// The field's declared name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The wire-type tag announcing this field.
    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    /// The field's presence rule.
    pub fn modifier(&self) -> Modifier {
        self.modifier
    }

    pub(crate) fn codec(&self) -> &dyn FieldCodec {
        self.codec.as_ref()
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("wire_type", &self.wire_type)
            .field("modifier", &self.modifier)
            .finish_non_exhaustive()
    }
}

/// The runtime schema of one struct type.
///
/// Fields are kept in declaration order, which is also wire order; the
/// untagged format depends on that order being identical on both sides.
pub struct StructDescriptor {
    name: &'static str,
    base: Option<Arc<StructDescriptor>>,
    fields: Vec<FieldDescriptor>,
    new_fn: fn() -> Box<dyn Record>,
}

impl StructDescriptor {
    /// Starts a [`StructBuilder`] for `R` under the given qualified name.
    pub fn builder<R: Record + Default>(name: &'static str) -> StructBuilder<R> {
        StructBuilder::new(name)
    }

    /// The struct's qualified name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The descriptor of the base struct, if this type inherits one.
    pub fn base(&self) -> Option<&Arc<StructDescriptor>> {
        self.base.as_ref()
    }

    /// This struct's own fields, excluding inherited ones, in wire order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up one of this struct's own fields by wire id.
    ///
    /// Linear scan; field counts are small and the common case is fields
    /// arriving in declaration order anyway.
    pub fn field_by_id(&self, id: u16) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.id == id)
    }

    /// Constructs a fresh record with every field, inherited ones
    /// included, at its declared default.
    pub fn initialize(&self) -> Result<Box<dyn Record>> {
        let mut record = (self.new_fn)();
        self.apply_defaults(record.as_mut())?;
        Ok(record)
    }

    /// Resets every field of an existing record to its declared default,
    /// base-most fields first.
    pub(crate) fn apply_defaults(&self, record: &mut dyn Record) -> Result<()> {
        if let Some(base) = &self.base {
            base.apply_defaults(record)?;
        }
        for field in &self.fields {
            field.codec.reset(record)?;
        }
        Ok(())
    }

    /// Deep-copies a record field by field, inherited fields included.
    pub fn clone_record(&self, source: &dyn Record) -> Result<Box<dyn Record>> {
        let mut copy = (self.new_fn)();
        self.clone_fields(source, copy.as_mut())?;
        Ok(copy)
    }

    fn clone_fields(&self, source: &dyn Record, target: &mut dyn Record) -> Result<()> {
        if let Some(base) = &self.base {
            base.clone_fields(source, target)?;
        }
        for field in &self.fields {
            field.codec.clone_into(source, target)?;
        }
        Ok(())
    }
}

impl fmt::Debug for StructDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructDescriptor")
            .field("name", &self.name)
            .field("base", &self.base.as_ref().map(|base| base.name))
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`StructDescriptor`] for a record type.
///
/// Fields are declared in wire order. Accessor pairs are plain `fn`
/// pointers into the concrete type, so a descriptor is `Send + Sync` and
/// safe to share process-wide once built.
pub struct StructBuilder<R> {
    name: &'static str,
    base: Option<Arc<StructDescriptor>>,
    fields: Vec<FieldDescriptor>,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Record + Default> StructBuilder<R> {
    /// Starts a descriptor for `R` under the given qualified name.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            base: None,
            fields: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declares the base struct whose fields precede this type's own on
    /// the wire.
    pub fn base(mut self, base: Arc<StructDescriptor>) -> Self {
        self.base = Some(base);
        self
    }

    /// Declares a field whose default is `T`'s natural default.
    pub fn field<T: WireValue>(
        self,
        id: u16,
        name: &'static str,
        modifier: Modifier,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Self {
        self.field_with_default(id, name, modifier, T::default_value(), get, get_mut)
    }

    /// Declares a field with an explicit default value.
    pub fn field_with_default<T: WireValue>(
        mut self,
        id: u16,
        name: &'static str,
        modifier: Modifier,
        default: T,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Self {
        self.fields.push(FieldDescriptor {
            id,
            name,
            wire_type: T::wire_type(),
            modifier,
            codec: Box::new(FieldAccessor {
                get,
                get_mut,
                default,
            }),
        });
        self
    }

    /// Finishes the descriptor, rejecting duplicate field ids.
    pub fn build(self) -> Result<StructDescriptor> {
        for (index, field) in self.fields.iter().enumerate() {
            if self.fields[..index].iter().any(|prior| prior.id == field.id) {
                return Err(Error::Argument(format!(
                    "duplicate field id {} in struct {}",
                    field.id, self.name
                )));
            }
        }
        Ok(StructDescriptor {
            name: self.name,
            base: self.base,
            fields: self.fields,
            new_fn: || Box::new(R::default()),
        })
    }
}
