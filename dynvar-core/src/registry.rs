//! The type registry: per-type operation tables indexed by [`MetaTypeId`].

use core::any::{Any, TypeId};
use core::fmt;
use core::marker::PhantomData;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{LazyLock, PoisonError, RwLock};

use crate::container::{AssociativeContainer, AssociativeDef, SequentialContainer, SequentialDef};
use crate::object::{MetaObject, ObjectPointer, ObjectPtr};
use crate::stream::{StreamReader, StreamWriter, Streamable};
use crate::{MetaTypeId, Payload, RegistryError, TypeFlags, cast};

/// Type-erased operations of one registered type.
///
/// Every function receives payloads of the registered Rust type; handing
/// one a payload of another type is a bug and panics.
#[derive(Clone, Copy)]
pub struct VTable {
    /// Creates the default value.
    pub default: fn() -> Box<Payload>,
    /// Clones a payload.
    pub clone: fn(&Payload) -> Box<Payload>,
    /// Compares two payloads.
    pub eq: Option<fn(&Payload, &Payload) -> bool>,
    /// Formats a payload for debugging.
    pub debug: Option<fn(&Payload, &mut fmt::Formatter<'_>) -> fmt::Result>,
    /// Writes a payload to a stream.
    pub save: Option<fn(&Payload, &mut StreamWriter)>,
    /// Replaces a payload with one read from a stream.
    pub load: Option<fn(&mut Payload, &mut StreamReader<'_>)>,
    /// Integral view of an enumeration.
    pub enumeration: Option<EnumOps>,
    /// Access to an object pointer.
    pub object: Option<ObjectOps>,
}

/// Integral view of an enumeration type.
#[derive(Clone, Copy)]
pub struct EnumOps {
    /// The payload's integral value.
    pub to_i64: fn(&Payload) -> i64,
    /// A payload for an integral value.
    pub from_i64: fn(i64) -> Box<Payload>,
}

/// Access to a typed object pointer.
#[derive(Clone, Copy)]
pub struct ObjectOps {
    /// The untyped pointer.
    pub get: fn(&Payload) -> ObjectPtr,
    /// A payload wrapping an untyped pointer.
    pub make: fn(ObjectPtr) -> Box<Payload>,
}

/// An enumeration with an integral representation.
pub trait EnumRepr: Copy {
    /// The integral value of `self`.
    fn to_i64(self) -> i64;

    /// The variant for `value`. Unknown values map to whatever the type
    /// considers a fallback.
    fn from_i64(value: i64) -> Self;
}

/// Everything the registry knows about one type.
pub struct TypeInfo {
    /// The type's id.
    pub id: MetaTypeId,
    /// The type's name; user types travel on the wire under it.
    pub name: &'static str,
    /// Storage size in bytes. Zero only for the void type, which cannot
    /// hold a value.
    pub size: usize,
    /// Flags.
    pub flags: TypeFlags,
    /// The Rust type payloads have.
    pub rust_type: TypeId,
    /// Operations.
    pub vtable: VTable,
    /// Class of the pointee, for object pointer types.
    pub meta_object: Option<&'static MetaObject>,
    /// Present when the type is a sequential container.
    pub sequential: Option<SequentialDef>,
    /// Present when the type is an associative container.
    pub associative: Option<AssociativeDef>,
}

impl TypeInfo {
    /// A default payload.
    pub fn construct(&self) -> Box<Payload> {
        (self.vtable.default)()
    }

    /// A copy of `payload`.
    pub fn copy(&self, payload: &Payload) -> Box<Payload> {
        (self.vtable.clone)(payload)
    }

    /// Compares two payloads, `None` when the type has no equality.
    pub fn equals(&self, a: &Payload, b: &Payload) -> Option<bool> {
        self.vtable.eq.map(|eq| eq(a, b))
    }

    /// Whether the type can be written to a stream.
    pub fn is_streamable(&self) -> bool {
        self.vtable.save.is_some() && self.vtable.load.is_some()
    }

    /// Writes `payload`; `false` when the type is not streamable.
    pub fn save(&self, payload: &Payload, out: &mut StreamWriter) -> bool {
        match self.vtable.save {
            Some(save) => {
                save(payload, out);
                true
            }
            None => false,
        }
    }

    /// Reads into `payload`; `false` when the type is not streamable or the
    /// stream went bad.
    pub fn load(&self, payload: &mut Payload, input: &mut StreamReader<'_>) -> bool {
        match self.vtable.load {
            Some(load) => {
                load(payload, input);
                input.is_ok()
            }
            None => false,
        }
    }

    /// Whether this is an enumeration.
    pub fn is_enumeration(&self) -> bool {
        self.flags.contains(TypeFlags::IS_ENUMERATION)
    }

    /// Whether this points to an object.
    pub fn is_object_pointer(&self) -> bool {
        self.flags.contains(TypeFlags::POINTER_TO_OBJECT)
    }

    /// Whether `payload` is a null pointer. Always `false` for non-pointers.
    pub fn is_null_pointer(&self, payload: &Payload) -> bool {
        self.flags.contains(TypeFlags::IS_POINTER)
            && self
                .vtable
                .object
                .is_some_and(|ops| (ops.get)(payload).is_null())
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.size)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

fn default_of<T: Default + Any + Send + Sync>() -> Box<Payload> {
    Box::new(T::default())
}

fn clone_of<T: Clone + Any + Send + Sync>(payload: &Payload) -> Box<Payload> {
    Box::new(cast::<T>(payload).clone())
}

fn eq_of<T: PartialEq + Any>(a: &Payload, b: &Payload) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn debug_of<T: fmt::Debug + Any>(payload: &Payload, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(cast::<T>(payload), f)
}

fn save_of<T: Streamable + Any>(payload: &Payload, out: &mut StreamWriter) {
    cast::<T>(payload).write_to(out);
}

fn load_of<T: Streamable + Any>(payload: &mut Payload, input: &mut StreamReader<'_>) {
    let value = T::read_from(input);
    if let Some(slot) = payload.downcast_mut::<T>() {
        *slot = value;
    }
}

fn enum_to_i64<T: EnumRepr + Any>(payload: &Payload) -> i64 {
    cast::<T>(payload).to_i64()
}

fn enum_from_i64<T: EnumRepr + Any + Send + Sync>(value: i64) -> Box<Payload> {
    Box::new(T::from_i64(value))
}

fn object_get<T: ObjectPointer + Any>(payload: &Payload) -> ObjectPtr {
    cast::<T>(payload).as_object_ptr().clone()
}

fn object_make<T: ObjectPointer + Any + Send + Sync>(ptr: ObjectPtr) -> Box<Payload> {
    Box::new(T::from_object_ptr(ptr))
}

/// Describes a type before it is registered.
///
/// Capabilities are opted into one by one, and each is only available when
/// `T` implements the trait it needs:
///
/// ```ignore
/// let id = TypeRegistry::global().register(
///     TypeBuilder::<Vec<Celsius>>::new("CelsiusList").eq().sequential(),
/// );
/// ```
#[must_use]
pub struct TypeBuilder<T> {
    name: Cow<'static, str>,
    size: usize,
    flags: TypeFlags,
    vtable: VTable,
    meta_object: Option<&'static MetaObject>,
    sequential: Option<SequentialDef>,
    associative: Option<AssociativeDef>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + Any + Send + Sync> TypeBuilder<T> {
    /// A type named `name` with `T::default()` as its default value.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self
    where
        T: Default,
    {
        Self::with_default(name, default_of::<T>)
    }

    /// A type named `name` whose default payload comes from `default`.
    pub fn with_default(name: impl Into<Cow<'static, str>>, default: fn() -> Box<Payload>) -> Self {
        Self {
            name: name.into(),
            size: size_of::<T>().max(1),
            flags: TypeFlags::empty(),
            vtable: VTable {
                default,
                clone: clone_of::<T>,
                eq: None,
                debug: None,
                save: None,
                load: None,
                enumeration: None,
                object: None,
            },
            meta_object: None,
            sequential: None,
            associative: None,
            _marker: PhantomData,
        }
    }

    /// Compares with `PartialEq`.
    pub fn eq(mut self) -> Self
    where
        T: PartialEq,
    {
        self.vtable.eq = Some(eq_of::<T>);
        self
    }

    /// Compares with a custom function.
    pub fn eq_with(mut self, eq: fn(&Payload, &Payload) -> bool) -> Self {
        self.vtable.eq = Some(eq);
        self
    }

    /// Formats with `Debug`.
    pub fn debug(mut self) -> Self
    where
        T: fmt::Debug,
    {
        self.vtable.debug = Some(debug_of::<T>);
        self
    }

    /// Streams with [`Streamable`].
    pub fn streamable(mut self) -> Self
    where
        T: Streamable,
    {
        self.vtable.save = Some(save_of::<T>);
        self.vtable.load = Some(load_of::<T>);
        self
    }

    /// Streams with custom functions.
    pub fn stream_with(
        mut self,
        save: fn(&Payload, &mut StreamWriter),
        load: fn(&mut Payload, &mut StreamReader<'_>),
    ) -> Self {
        self.vtable.save = Some(save);
        self.vtable.load = Some(load);
        self
    }

    /// Marks the type as an enumeration.
    pub fn enumeration(mut self) -> Self
    where
        T: EnumRepr,
    {
        self.flags |= TypeFlags::IS_ENUMERATION;
        self.vtable.enumeration = Some(EnumOps {
            to_i64: enum_to_i64::<T>,
            from_i64: enum_from_i64::<T>,
        });
        self
    }

    /// Marks the type as a pointer to objects of class `meta`.
    pub fn object_pointer(mut self, meta: &'static MetaObject) -> Self
    where
        T: ObjectPointer,
    {
        self.flags |= TypeFlags::IS_POINTER | TypeFlags::POINTER_TO_OBJECT;
        self.meta_object = Some(meta);
        self.vtable.object = Some(ObjectOps {
            get: object_get::<T>,
            make: object_make::<T>,
        });
        self
    }

    /// Exposes the type as a sequential container.
    pub fn sequential(mut self) -> Self
    where
        T: SequentialContainer,
    {
        self.sequential = Some(SequentialDef::of::<T>());
        self
    }

    /// Exposes the type as an associative container.
    pub fn associative(mut self) -> Self
    where
        T: AssociativeContainer,
    {
        self.associative = Some(AssociativeDef::of::<T>());
        self
    }

    /// Adds flags.
    pub fn flags(mut self, flags: TypeFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Overrides the reported size.
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    fn build(self, id: MetaTypeId) -> &'static TypeInfo {
        let name: &'static str = match self.name {
            Cow::Borrowed(name) => name,
            Cow::Owned(name) => Box::leak(name.into_boxed_str()),
        };
        Box::leak(Box::new(TypeInfo {
            id,
            name,
            size: self.size,
            flags: self.flags,
            rust_type: TypeId::of::<T>(),
            vtable: self.vtable,
            meta_object: self.meta_object,
            sequential: self.sequential,
            associative: self.associative,
        }))
    }
}

/// A converter between two registered types. Writes into a default
/// constructed target payload and reports success.
pub type ConverterFn = dyn Fn(&Payload, &mut Payload) -> bool + Send + Sync;

#[derive(Default)]
struct Inner {
    by_id: HashMap<MetaTypeId, &'static TypeInfo>,
    by_name: HashMap<&'static str, MetaTypeId>,
    by_rust_type: HashMap<TypeId, MetaTypeId>,
    converters: HashMap<(MetaTypeId, MetaTypeId), &'static ConverterFn>,
    next_user_id: u32,
}

impl Inner {
    fn insert(&mut self, info: &'static TypeInfo) {
        self.by_id.insert(info.id, info);
        self.by_name.entry(info.name).or_insert(info.id);
        self.by_rust_type.entry(info.rust_type).or_insert(info.id);
    }
}

/// Maps type ids to their [`TypeInfo`] and holds converters between types.
///
/// Entries are never removed, so lookups hand out `&'static` references.
pub struct TypeRegistry {
    inner: RwLock<Inner>,
}

static GLOBAL: LazyLock<TypeRegistry> = LazyLock::new(TypeRegistry::new);

impl TypeRegistry {
    /// A registry holding the builtin types.
    pub fn new() -> Self {
        let registry = TypeRegistry {
            inner: RwLock::new(Inner {
                next_user_id: MetaTypeId::USER.0,
                ..Inner::default()
            }),
        };
        crate::builtins::register_builtins(&registry);
        registry
    }

    /// The process-wide registry.
    pub fn global() -> &'static TypeRegistry {
        &GLOBAL
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a user type and returns its id.
    ///
    /// Registering a name twice returns the id of the first registration.
    pub fn register<T: Clone + Any + Send + Sync>(&self, builder: TypeBuilder<T>) -> MetaTypeId {
        let mut inner = self.write();
        if let Some(&id) = inner.by_name.get(builder.name.as_ref()) {
            let existing = inner.by_id[&id];
            if existing.rust_type != TypeId::of::<T>() {
                tracing::warn!(
                    "type name {:?} is already registered for another Rust type",
                    existing.name
                );
            }
            return id;
        }
        let id = MetaTypeId(inner.next_user_id);
        inner.next_user_id += 1;
        let info = builder.build(id);
        tracing::debug!("registered {:?} as {}", info.name, id);
        inner.insert(info);
        id
    }

    /// Registers a type under a fixed id below [`MetaTypeId::USER`].
    pub fn register_with_id<T: Clone + Any + Send + Sync>(
        &self,
        id: MetaTypeId,
        builder: TypeBuilder<T>,
    ) -> Result<MetaTypeId, RegistryError> {
        if id.is_unknown() || id.is_user_type() {
            return Err(RegistryError::IdOutOfRange(id));
        }
        let mut inner = self.write();
        if let Some(existing) = inner.by_id.get(&id) {
            if existing.rust_type == TypeId::of::<T>() {
                return Ok(id);
            }
            return Err(RegistryError::IdTaken(id));
        }
        let info = builder.build(id);
        inner.insert(info);
        Ok(id)
    }

    /// The entry for `id`.
    pub fn info(&self, id: MetaTypeId) -> Option<&'static TypeInfo> {
        self.read().by_id.get(&id).copied()
    }

    /// The entry a Rust type was first registered under.
    pub fn info_by_rust_type(&self, rust_type: TypeId) -> Option<&'static TypeInfo> {
        let inner = self.read();
        let id = inner.by_rust_type.get(&rust_type)?;
        inner.by_id.get(id).copied()
    }

    /// The entry for `T`.
    pub fn info_of<T: Any>(&self) -> Option<&'static TypeInfo> {
        self.info_by_rust_type(TypeId::of::<T>())
    }

    /// The id of `T`.
    pub fn id_of<T: Any>(&self) -> Option<MetaTypeId> {
        self.info_of::<T>().map(|info| info.id)
    }

    /// The entry registered under `name`.
    pub fn info_by_name(&self, name: &str) -> Option<&'static TypeInfo> {
        let inner = self.read();
        let id = inner.by_name.get(name)?;
        inner.by_id.get(id).copied()
    }

    /// The id registered under `name`.
    pub fn id_by_name(&self, name: &str) -> Option<MetaTypeId> {
        self.read().by_name.get(name).copied()
    }

    /// The name of `id`.
    pub fn name(&self, id: MetaTypeId) -> Option<&'static str> {
        self.info(id).map(|info| info.name)
    }

    /// Storage size of `id`; zero when unregistered.
    pub fn size_of(&self, id: MetaTypeId) -> usize {
        self.info(id).map_or(0, |info| info.size)
    }

    /// Flags of `id`; empty when unregistered.
    pub fn flags(&self, id: MetaTypeId) -> TypeFlags {
        self.info(id).map_or(TypeFlags::empty(), |info| info.flags)
    }

    /// Whether `id` has an entry.
    pub fn is_registered(&self, id: MetaTypeId) -> bool {
        self.read().by_id.contains_key(&id)
    }

    /// Registers a converter from `F` to `T`. Returning `None` reports a
    /// failed conversion.
    pub fn register_converter<F, T, C>(&self, convert: C) -> Result<(), RegistryError>
    where
        F: Any,
        T: Any,
        C: Fn(&F) -> Option<T> + Send + Sync + 'static,
    {
        let from = self
            .id_of::<F>()
            .ok_or(RegistryError::UnregisteredType(core::any::type_name::<F>()))?;
        let to = self
            .id_of::<T>()
            .ok_or(RegistryError::UnregisteredType(core::any::type_name::<T>()))?;
        self.register_converter_raw(from, to, move |src: &Payload, dst: &mut Payload| {
            let (Some(src), Some(dst)) = (src.downcast_ref::<F>(), dst.downcast_mut::<T>()) else {
                return false;
            };
            match convert(src) {
                Some(value) => {
                    *dst = value;
                    true
                }
                None => false,
            }
        });
        Ok(())
    }

    /// Registers a type-erased converter between two ids, replacing any
    /// previous one.
    pub fn register_converter_raw<C>(&self, from: MetaTypeId, to: MetaTypeId, convert: C)
    where
        C: Fn(&Payload, &mut Payload) -> bool + Send + Sync + 'static,
    {
        let convert: &'static ConverterFn = Box::leak(Box::new(convert));
        self.write().converters.insert((from, to), convert);
    }

    /// Whether a converter from `from` to `to` was registered.
    pub fn has_converter(&self, from: MetaTypeId, to: MetaTypeId) -> bool {
        self.read().converters.contains_key(&(from, to))
    }

    /// Runs the converter from `from` to `to`, if there is one.
    pub fn convert(&self, from: MetaTypeId, src: &Payload, to: MetaTypeId, dst: &mut Payload) -> bool {
        let converter = self.read().converters.get(&(from, to)).copied();
        converter.is_some_and(|convert| convert(src, dst))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("TypeRegistry")
            .field("types", &inner.by_id.len())
            .field("converters", &inner.converters.len())
            .finish()
    }
}
