//! Example: Protocol Dispatch Through the Marshal Header
//!
//! A marshaled payload opens with a 4-byte header naming its wire family
//! and version, so a reader can decode it without any prior agreement
//! about which protocol the writer picked.

#![allow(missing_docs)]

use std::any::Any;
use std::sync::Arc;

use tagwire::{
    marshal_to_vec, unmarshal_from_slice, Modifier, Protocol, Record, Result, StructBuilder,
    StructDescriptor, TypeRegistry, VERSION_1, VERSION_2,
};

#[derive(Debug, Default, Clone, PartialEq)]
struct Event {
    seq: u64,
    kind: String,
}

impl Record for Event {
    fn descriptor() -> Result<Arc<StructDescriptor>> {
        TypeRegistry::global().resolve::<Event>(|| {
            StructBuilder::<Event>::new("demo.Event")
                .field(
                    1,
                    "seq",
                    Modifier::Optional,
                    |e: &Event| &e.seq,
                    |e: &mut Event| &mut e.seq,
                )
                .field(
                    2,
                    "kind",
                    Modifier::Required,
                    |e: &Event| &e.kind,
                    |e: &mut Event| &mut e.kind,
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
    println!("--- Marshal Dispatch Example ---");

    let event = Event {
        seq: 301,
        kind: "login".to_owned(),
    };

    for (protocol, version) in [
        (Protocol::Untagged, VERSION_1),
        (Protocol::Untagged, VERSION_2),
        (Protocol::Tagged, VERSION_1),
        (Protocol::Tagged, VERSION_2),
    ] {
        // 1. The writer picks any family and version.
        let bytes = marshal_to_vec(&event, protocol, version)?;
        println!(
            "{protocol:?} v{version}: header {:02X?}, {} bytes total",
            &bytes[..4],
            bytes.len()
        );

        // 2. The reader needs no such knowledge; the header dispatches.
        let restored: Event = unmarshal_from_slice(&bytes)?;
        assert_eq!(restored, event);
    }

    println!("every payload dispatched by its header alone");
    Ok(())
}
