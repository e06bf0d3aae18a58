//! # Tagwire
//!
//! A schema-evolution-aware binary serialization library built around runtime
//! type descriptors and interchangeable wire formats.
//!
//! ## Overview
//!
//! Tagwire separates three concerns that most serialization libraries fuse
//! together. A [`schema::StructDescriptor`] describes a record type at
//! runtime: its fields, their wire ids, defaults, and presence rules. The
//! [`engine`] walks that descriptor generically, issuing abstract read/write
//! verbs. A protocol ([`protocol::TaggedWriter`], [`protocol::UntaggedWriter`]
//! and their readers) decides how those verbs land on the wire. One record
//! type therefore serializes to any format, and two programs compiled against
//! *different revisions* of a schema still interoperate.
//!
//! ### Key Features
//!
//! *   **Two wire families:** The *tagged* family frames every field with a
//!     (wire type, id) header and ends structs with stop markers, so readers
//!     skip fields they do not recognize. The *untagged* family writes raw
//!     values in schema order for compactness, and relies on both sides
//!     sharing the field layout.
//! *   **Two versions per family:** Version 1 uses fixed-width lengths and
//!     field headers; version 2 packs small field ids into a single byte and
//!     encodes lengths as varints, which usually shrinks payloads.
//! *   **Schema evolution:** Optional fields may be omitted when equal to
//!     their defaults and are restored on read; unknown fields are skipped;
//!     required fields are enforced by tagged readers; inheritance segments
//!     let readers consume a base slice of a derived payload.
//! *   **Marshaling:** A four-byte self-description header
//!     ([`format::MarshalHeader`]) lets [`unmarshal`] dispatch to whichever
//!     format and version a payload was written with.
//! *   **Descriptor interning:** [`schema::TypeRegistry`] builds each type's
//!     descriptor once and shares it process-wide, with duplicate-name
//!     detection and arity-checked generic specialization.
//!
//! ## Wire Model
//!
//! A tagged struct value is a run of field headers and values closed by a
//! stop marker; inherited fields come first, each base segment closed by its
//! own marker:
//!
//! ```text
//! [base-most fields...] StopBase ... [own fields...] Stop
//! ```
//!
//! Version 1 field headers are three bytes (type byte + little-endian id).
//! Version 2 packs ids 0..=5 into the header byte's high bits and escapes
//! larger ids to a varint:
//!
//! ```text
//! v1:  [type u8] [id u16 LE]
//! v2:  [id <<5 | type]            for id <= 5
//!      [6 <<5 | type] [id varint] otherwise
//! ```
//!
//! An untagged struct value is just its field values back to back; every
//! byte of framing is implied by the schema.
//!
//! ## Usage
//!
//! Records implement [`schema::Record`] by hand, building their descriptor
//! through [`schema::StructBuilder`] and resolving it through the global
//! registry so every call site shares one copy:
//!
//! ```rust
//! use std::any::Any;
//! use std::sync::Arc;
//!
//! use tagwire::{
//!     deserialize_from_slice, marshal_to_vec, serialize_to_vec, unmarshal_from_slice,
//!     Modifier, Protocol, Record, Result, StructBuilder, StructDescriptor, TypeRegistry,
//!     VERSION_1, VERSION_2,
//! };
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct Score {
//!     player: String,
//!     points: u32,
//! }
//!
//! impl Record for Score {
//!     fn descriptor() -> Result<Arc<StructDescriptor>> {
//!         TypeRegistry::global().resolve::<Score>(|| {
//!             StructBuilder::<Score>::new("demo.Score")
//!                 .field(
//!                     1,
//!                     "player",
//!                     Modifier::Optional,
//!                     |s: &Score| &s.player,
//!                     |s: &mut Score| &mut s.player,
//!                 )
//!                 .field(
//!                     2,
//!                     "points",
//!                     Modifier::Optional,
//!                     |s: &Score| &s.points,
//!                     |s: &mut Score| &mut s.points,
//!                 )
//!                 .build()
//!         })
//!     }
//!
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//!
//!     fn as_any_mut(&mut self) -> &mut dyn Any {
//!         self
//!     }
//!
//!     fn into_any(self: Box<Self>) -> Box<dyn Any> {
//!         self
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let score = Score {
//!         player: "ada".to_owned(),
//!         points: 4200,
//!     };
//!
//!     // Pick a format and version explicitly...
//!     let bytes = serialize_to_vec(&score, Protocol::Tagged, VERSION_2)?;
//!     let restored: Score = deserialize_from_slice(&bytes, Protocol::Tagged, VERSION_2)?;
//!     assert_eq!(restored, score);
//!
//!     // ...or marshal, and let the reader dispatch on the payload header.
//!     let framed = marshal_to_vec(&score, Protocol::Untagged, VERSION_1)?;
//!     let dispatched: Score = unmarshal_from_slice(&framed)?;
//!     assert_eq!(dispatched, score);
//!     Ok(())
//! }
//! ```
//!
//! Struct-typed fields implement [`schema::WireValue`] by delegating to the
//! [`engine`] helpers; containers (`Vec`, `BTreeSet`, `BTreeMap`), strings,
//! and scalars are covered out of the box.
//!
//! ### Safety and Error Handling
//!
//! * **No unsafe:** The crate is `#![deny(unsafe_code)]`.
//! * **No panics:** No `unwrap()` or `panic!()` in the library (enforced by
//!   clippy lints); every failure surfaces as an [`Error`].
//! * **Hostile input:** Malformed payloads fail with descriptive errors
//!   rather than crashing: lengths are validated, nesting depth is bounded
//!   by [`protocol::MAX_NESTING_DEPTH`], and wire-supplied counts cannot
//!   force large allocations up front.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod engine;
pub mod error;
pub mod format;
pub mod protocol;
pub mod schema;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod io;

// --- RE-EXPORTS ---

pub use api::{
    deserialize_from_slice, marshal, marshal_to_file, marshal_to_vec, serialize_to_vec,
    unmarshal, unmarshal_from_file, unmarshal_from_slice, Deserializer, Serializer,
};
pub use error::{Error, Result};
pub use format::{DefaultValue, MarshalHeader, Protocol, WireType, VERSION_1, VERSION_2};
pub use protocol::{
    ProtocolReader, ProtocolWriter, TaggedProtocolReader, TaggedReader, TaggedWriter,
    UntaggedProtocolReader, UntaggedReader, UntaggedWriter, MAX_NESTING_DEPTH,
};
pub use schema::{
    FieldDescriptor, GenericTemplate, Modifier, Record, StructBuilder, StructDescriptor,
    TypeRegistry, WString, WireValue,
};
