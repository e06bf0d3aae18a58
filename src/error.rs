//! Centralized error handling for tagwire.
//!
//! All failure conditions are represented as `Result` values; the library
//! enforces this through `#![deny(clippy::panic)]` and
//! `#![deny(clippy::unwrap_used)]`. Every encode or decode error aborts the
//! current call and propagates to the caller; nothing is retried internally.
//!
//! ## Error Categories
//!
//! - **Argument** ([`Error::Argument`]): invalid constructor or builder
//!   arguments, such as an unsupported protocol version or a duplicate field
//!   id within one struct.
//! - **Encoding** ([`Error::Encoding`]): malformed wire data: an
//!   over-long variable-length integer, an invalid wire-type tag, a negative
//!   length, invalid UTF-8/UTF-16, or nesting past the depth limit.
//! - **End of stream** ([`Error::UnexpectedEndOfStream`]): input exhausted in
//!   the middle of a value.
//! - **Schema mismatches** ([`Error::MissingRequiredField`],
//!   [`Error::TypeMismatch`]): a tagged decode finished without a field the
//!   descriptor marks required, or a container's element tags disagree with
//!   the descriptor. Unknown *fields* are never errors, they are skipped;
//!   that is the compatibility mechanism.
//! - **Registry** ([`Error::InvalidGenericArguments`],
//!   [`Error::DuplicateTypeRegistration`]): descriptor construction problems.
//! - **Marshaling** ([`Error::UnknownProtocol`]): a marshaled payload whose
//!   magic or version this build does not understand.
//! - **Internal** ([`Error::Internal`]): accessor/downcast invariant breaks.
//!   These indicate a bug in a descriptor definition, not bad input.
//! - **I/O** ([`Error::Io`]): transport failures other than clean EOF.
//!
//! ## Example
//!
//! ```rust
//! use tagwire::{Error, WireType};
//!
//! fn describe(err: &Error) -> &'static str {
//!     match err {
//!         Error::UnexpectedEndOfStream => "truncated input",
//!         Error::MissingRequiredField { .. } => "incomplete record",
//!         Error::TypeMismatch { .. } => "schema disagreement",
//!         _ => "other failure",
//!     }
//! }
//!
//! let err = Error::TypeMismatch { expected: WireType::Int32, actual: WireType::String };
//! assert_eq!(describe(&err), "schema disagreement");
//! ```

use std::io;

use crate::format::WireType;

/// A specialized `Result` type for tagwire operations.
///
/// Used throughout the library; equivalent to
/// `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The master error enum covering all failure domains in tagwire.
///
/// Variants either carry a formatted description (`Argument`, `Encoding`,
/// `Internal`) or structured fields that tests and callers can match on
/// (`MissingRequiredField`, `TypeMismatch`, `InvalidGenericArguments`,
/// `UnknownProtocol`).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid constructor or builder argument.
    ///
    /// Raised for unsupported protocol versions (anything other than 1 or 2)
    /// and for descriptor builders given a duplicate field id.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Malformed wire data.
    ///
    /// Covers over-long variable-length integers, bytes that are not a valid
    /// wire-type tag, reserved header bits, negative lengths, invalid string
    /// encodings, and nesting beyond the reader depth limit. Skip failures
    /// land here too: skipping depends only on tag validity, so a tag that
    /// cannot be interpreted is fatal to the decode.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Input exhausted in the middle of a value.
    #[error("unexpected end of stream")]
    UnexpectedEndOfStream,

    /// A tagged decode completed without observing a Required field.
    ///
    /// Only tagged readers can raise this; the untagged format has no
    /// per-field presence signal to check.
    #[error("required field {type_name}::{field_name} (id {id}) missing from payload")]
    MissingRequiredField {
        /// Qualified name of the struct whose field is missing.
        type_name: &'static str,
        /// Declared name of the missing field.
        field_name: &'static str,
        /// Wire id of the missing field.
        id: u16,
    },

    /// Wire element tags inside a recognized field disagree with the
    /// descriptor.
    ///
    /// Field-level type disagreements are handled by skipping the field, not
    /// by this error; this arises only once a field has been recognized and
    /// its container payload turns out to carry different element types.
    #[error("type mismatch: expected {expected:?}, found {actual:?}")]
    TypeMismatch {
        /// Wire type the descriptor declares.
        expected: WireType,
        /// Wire type found on the wire.
        actual: WireType,
    },

    /// A generic record was specialized with the wrong number of arguments.
    #[error("generic type {open_type} expects {expected} argument(s), got {actual}")]
    InvalidGenericArguments {
        /// Name of the open generic type.
        open_type: &'static str,
        /// Declared arity.
        expected: usize,
        /// Arguments supplied.
        actual: usize,
    },

    /// Two different record types claimed the same qualified name.
    #[error("type name {name:?} is already registered to a different type")]
    DuplicateTypeRegistration {
        /// The contested qualified name.
        name: &'static str,
    },

    /// A marshaled payload carries a magic or version this build does not
    /// understand.
    #[error("unknown protocol (magic {magic:#06x}, version {version})")]
    UnknownProtocol {
        /// Magic value read from the header.
        magic: u16,
        /// Version value read from the header.
        version: u16,
    },

    /// Logic error inside the descriptor machinery.
    ///
    /// Should not occur with well-formed descriptor definitions; the usual
    /// cause is an accessor registered against the wrong record type.
    #[error("internal logic error: {0}")]
    Internal(String),

    /// Low-level I/O failure other than clean end-of-stream.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
