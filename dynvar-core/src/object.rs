//! Object pointers and the meta-object chain used to check their conversions.

use std::sync::Arc;

/// Class description of an [`Object`]: a name and a link to the base class.
#[derive(Debug)]
pub struct MetaObject {
    /// Class name.
    pub class_name: &'static str,
    /// Base class, `None` only for [`OBJECT_META`].
    pub super_class: Option<&'static MetaObject>,
}

/// The root of every class chain.
pub static OBJECT_META: MetaObject = MetaObject {
    class_name: "Object",
    super_class: None,
};

impl MetaObject {
    /// Declares a class deriving from `super_class`.
    pub const fn new(class_name: &'static str, super_class: &'static MetaObject) -> Self {
        Self {
            class_name,
            super_class: Some(super_class),
        }
    }

    /// Whether this class is `other` or derives from it.
    ///
    /// Every class derives from [`OBJECT_META`], even one whose chain does not
    /// end there explicitly.
    pub fn inherits(&self, other: &MetaObject) -> bool {
        if core::ptr::eq(other, &OBJECT_META) {
            return true;
        }
        let mut current = Some(self);
        while let Some(meta) = current {
            if core::ptr::eq(meta, other) {
                return true;
            }
            current = meta.super_class;
        }
        false
    }

    /// Iterates from this class up to its root.
    pub fn ancestors(&self) -> impl Iterator<Item = &MetaObject> {
        core::iter::successors(Some(self), |meta| meta.super_class)
    }
}

/// Something an [`ObjectPtr`] can point to.
pub trait Object: Send + Sync + 'static {
    /// The runtime class of this object.
    fn meta_object(&self) -> &'static MetaObject;
}

/// A nullable shared pointer to an [`Object`].
///
/// Registered as [`MetaTypeId::OBJECT_STAR`](crate::MetaTypeId::OBJECT_STAR).
/// Pointers to more specific classes are separate types implementing
/// [`ObjectPointer`] and registered with their class's [`MetaObject`].
#[derive(Clone, Default)]
pub struct ObjectPtr(pub Option<Arc<dyn Object>>);

impl ObjectPtr {
    /// A pointer to `object`.
    pub fn new(object: impl Object) -> Self {
        Self(Some(Arc::new(object)))
    }

    /// The null pointer.
    pub const fn null() -> Self {
        Self(None)
    }

    /// Whether the pointer is null.
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Runtime class of the pointee.
    pub fn meta_object(&self) -> Option<&'static MetaObject> {
        self.0.as_ref().map(|object| object.meta_object())
    }

    /// The pointee.
    pub fn get(&self) -> Option<&dyn Object> {
        self.0.as_deref()
    }
}

impl PartialEq for ObjectPtr {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl core::fmt::Debug for ObjectPtr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.0 {
            Some(object) => write!(
                f,
                "{}({:p})",
                object.meta_object().class_name,
                Arc::as_ptr(object) as *const ()
            ),
            None => f.write_str("nullptr"),
        }
    }
}

/// A typed object pointer.
///
/// Implement this for newtypes around [`ObjectPtr`] and register them with
/// [`TypeBuilder::object_pointer`](crate::TypeBuilder::object_pointer).
pub trait ObjectPointer: Sized {
    /// The untyped pointer.
    fn as_object_ptr(&self) -> &ObjectPtr;

    /// Wraps an untyped pointer. Its class has already been checked.
    fn from_object_ptr(ptr: ObjectPtr) -> Self;
}

impl ObjectPointer for ObjectPtr {
    fn as_object_ptr(&self) -> &ObjectPtr {
        self
    }

    fn from_object_ptr(ptr: ObjectPtr) -> Self {
        ptr
    }
}
