//! Runtime type descriptions for serializable records.
//!
//! This module defines the `Record` trait implemented by every serializable
//! struct, the `WireValue` trait covering every field type, and the
//! descriptor machinery ([`StructDescriptor`], [`FieldDescriptor`]) that the
//! traversal engine walks instead of compile-time knowledge of the struct.

use std::any::Any;
use std::sync::Arc;

use crate::error::Result;

/// Defines the `WireValue` trait and the `WString` newtype.
pub mod value;

/// Defines field and struct descriptors and their builder.
pub mod descriptor;

/// Defines the descriptor registry and generic-type specialization.
pub mod registry;

pub use descriptor::{FieldDescriptor, Modifier, StructBuilder, StructDescriptor};
pub use registry::{GenericTemplate, TypeRegistry};
pub use value::{WString, WireValue};

/// A struct that can travel over the wire.
///
/// Implementations provide a [`StructDescriptor`] describing their fields
/// and expose themselves as [`Any`] so the engine can operate on
/// heterogeneous records behind `dyn Record`.
///
/// `descriptor()` should resolve through [`TypeRegistry`] so that every
/// call site shares one interned descriptor; see the crate-level example.
pub trait Record: Any + Send + Sync {
    /// The shared descriptor for this type.
    fn descriptor() -> Result<Arc<StructDescriptor>>
    where
        Self: Sized;

    /// Borrows the record for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrows the record for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Consumes the boxed record for downcasting by value.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}
