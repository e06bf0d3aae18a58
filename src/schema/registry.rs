//! Descriptor interning: one shared [`StructDescriptor`] per type.
//!
//! Descriptors are built once and shared behind `Arc` from then on, so two
//! call sites serializing the same type walk pointer-identical schemas.
//! Concrete types key by [`TypeId`]; generic types key by their open
//! template plus argument [`TypeId`]s, so every specialization gets its own
//! descriptor without tripping the duplicate-name check.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::schema::descriptor::StructDescriptor;
use crate::schema::Record;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TypeKey {
    Concrete(TypeId),
    Generic {
        open: &'static str,
        args: Box<[TypeId]>,
    },
}

/// Who owns a registered name. Specializations of one open type share the
/// template name, so the owner is the template, not any one specialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameOwner {
    Concrete(TypeId),
    Open(&'static str),
}

#[derive(Default)]
struct RegistryInner {
    types: HashMap<TypeKey, Arc<StructDescriptor>>,
    names: HashMap<&'static str, NameOwner>,
}

/// Interns struct descriptors, enforcing unique qualified names.
///
/// [`TypeRegistry::global`] is the instance `Record::descriptor`
/// implementations normally resolve through; separate instances exist for
/// tests that must not observe each other's registrations.
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

static GLOBAL: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::new);

fn poisoned() -> Error {
    Error::Internal("type registry lock poisoned".into())
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static TypeRegistry {
        &GLOBAL
    }

    /// Returns the interned descriptor for `R`, building it with `build`
    /// on first resolution.
    ///
    /// Concurrent first resolutions may both run `build`; exactly one
    /// result is kept and every caller receives that one.
    pub fn resolve<R: Record>(
        &self,
        build: impl FnOnce() -> Result<StructDescriptor>,
    ) -> Result<Arc<StructDescriptor>> {
        self.intern(
            TypeKey::Concrete(TypeId::of::<R>()),
            NameOwner::Concrete(TypeId::of::<R>()),
            build,
        )
    }

    /// Returns the interned descriptor for one specialization of an open
    /// generic type, identified by its argument types.
    pub fn specialize(
        &self,
        template: &GenericTemplate,
        args: &[TypeId],
        build: impl FnOnce() -> Result<StructDescriptor>,
    ) -> Result<Arc<StructDescriptor>> {
        if args.len() != template.arity {
            return Err(Error::InvalidGenericArguments {
                open_type: template.name,
                expected: template.arity,
                actual: args.len(),
            });
        }
        self.intern(
            TypeKey::Generic {
                open: template.name,
                args: args.into(),
            },
            NameOwner::Open(template.name),
            build,
        )
    }

    fn intern(
        &self,
        key: TypeKey,
        owner: NameOwner,
        build: impl FnOnce() -> Result<StructDescriptor>,
    ) -> Result<Arc<StructDescriptor>> {
        {
            let inner = self.inner.read().map_err(|_| poisoned())?;
            if let Some(existing) = inner.types.get(&key) {
                return Ok(existing.clone());
            }
        }

        // Build outside the lock; descriptor construction may itself
        // resolve base descriptors through this registry.
        let built = Arc::new(build()?);

        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        if let Some(existing) = inner.types.get(&key) {
            // Another thread won the race; its descriptor is the one
            // everybody shares.
            return Ok(existing.clone());
        }
        let name = built.name();
        match inner.names.get(name) {
            Some(existing) if *existing != owner => {
                return Err(Error::DuplicateTypeRegistration { name });
            }
            _ => {}
        }
        inner.names.insert(name, owner);
        inner.types.insert(key, built.clone());
        Ok(built)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// An open generic type: a name plus the number of type arguments every
/// specialization must supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericTemplate {
    name: &'static str,
    arity: usize,
}

impl GenericTemplate {
    /// Declares an open type.
    pub const fn new(name: &'static str, arity: usize) -> Self {
        Self { name, arity }
    }

    /// The template's qualified name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The number of type arguments a specialization must supply.
    pub fn arity(&self) -> usize {
        self.arity
    }
}
