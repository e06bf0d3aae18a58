//! Example: Schema Evolution Across Revisions
//!
//! Two revisions of the same record exchange payloads in both directions:
//! the old reader skips fields it never heard of, and the new reader fills
//! absent fields from its declared defaults.

#![allow(missing_docs)]

use std::any::Any;
use std::sync::Arc;

use tagwire::engine;
use tagwire::{
    deserialize_from_slice, serialize_to_vec, Modifier, Protocol, Record, Result, StructBuilder,
    StructDescriptor, TypeRegistry, VERSION_2,
};

#[derive(Debug, Default, Clone, PartialEq)]
struct ProfileV1 {
    id: u64,
    name: String,
}

impl Record for ProfileV1 {
    fn descriptor() -> Result<Arc<StructDescriptor>> {
        TypeRegistry::global().resolve::<ProfileV1>(|| {
            StructBuilder::<ProfileV1>::new("demo.ProfileV1")
                .field(
                    1,
                    "id",
                    Modifier::Optional,
                    |p: &ProfileV1| &p.id,
                    |p: &mut ProfileV1| &mut p.id,
                )
                .field(
                    2,
                    "name",
                    Modifier::Optional,
                    |p: &ProfileV1| &p.name,
                    |p: &mut ProfileV1| &mut p.name,
                )
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// The same profile one release later: an email and a karma score were
/// added under fresh field ids.
#[derive(Debug, Clone, PartialEq)]
struct ProfileV2 {
    id: u64,
    name: String,
    email: String,
    karma: i32,
}

impl Default for ProfileV2 {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            email: String::new(),
            karma: 50,
        }
    }
}

impl Record for ProfileV2 {
    fn descriptor() -> Result<Arc<StructDescriptor>> {
        TypeRegistry::global().resolve::<ProfileV2>(|| {
            StructBuilder::<ProfileV2>::new("demo.ProfileV2")
                .field(
                    1,
                    "id",
                    Modifier::Optional,
                    |p: &ProfileV2| &p.id,
                    |p: &mut ProfileV2| &mut p.id,
                )
                .field(
                    2,
                    "name",
                    Modifier::Optional,
                    |p: &ProfileV2| &p.name,
                    |p: &mut ProfileV2| &mut p.name,
                )
                .field(
                    3,
                    "email",
                    Modifier::Optional,
                    |p: &ProfileV2| &p.email,
                    |p: &mut ProfileV2| &mut p.email,
                )
                .field_with_default(
                    4,
                    "karma",
                    Modifier::Optional,
                    50i32,
                    |p: &ProfileV2| &p.karma,
                    |p: &mut ProfileV2| &mut p.karma,
                )
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

fn main() -> Result<()> {
    println!("--- Schema Evolution Example ---");

    // 1. An old writer produces a payload.
    let old = ProfileV1 {
        id: 7,
        name: "ada".to_owned(),
    };
    let old_bytes = serialize_to_vec(&old, Protocol::Tagged, VERSION_2)?;
    println!("v1 payload: {} bytes", old_bytes.len());

    // 2. A newer reader accepts it; absent fields come out at their
    //    declared defaults, karma included.
    let upgraded: ProfileV2 = deserialize_from_slice(&old_bytes, Protocol::Tagged, VERSION_2)?;
    println!("read as v2: {upgraded:?}");
    assert_eq!(upgraded.karma, 50);

    // 3. Declared defaults also drive fresh construction.
    let blank: ProfileV2 = engine::initialize_as()?;
    println!("initialized v2: {blank:?}");

    // 4. The new writer's payload still reads under the old schema; the
    //    unknown fields are skipped by their wire types.
    let new = ProfileV2 {
        id: 8,
        name: "grace".to_owned(),
        email: "grace@example.com".to_owned(),
        karma: 99,
    };
    let new_bytes = serialize_to_vec(&new, Protocol::Tagged, VERSION_2)?;
    let downgraded: ProfileV1 = deserialize_from_slice(&new_bytes, Protocol::Tagged, VERSION_2)?;
    println!("read as v1: {downgraded:?}");
    assert_eq!(
        downgraded,
        ProfileV1 {
            id: 8,
            name: "grace".to_owned()
        }
    );

    println!("both directions round-tripped cleanly");
    Ok(())
}
