//! Walking container values without knowing their Rust type.
//!
//! [`Variant::sequential`] and [`Variant::associative`] borrow the held
//! container and hand out iterators whose elements come back as variants.
//! Clones of an iterator share one position, so advancing one moves all of
//! them; [`SequentialIterator::offset`] and friends fork a fresh position.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use dynvar_core::{
    AssociativeDef, Cursor, IterCapabilities, MetaTypeId, Payload, SequentialDef, TypeInfo,
};

use crate::{Variant, registry};

/// An element as a variant. Elements that are variants themselves are
/// returned as they are.
fn materialize(info: Option<&'static TypeInfo>, payload: Option<&Payload>) -> Variant {
    let (Some(info), Some(payload)) = (info, payload) else {
        return Variant::new();
    };
    if info.id == MetaTypeId::VARIANT {
        return payload.downcast_ref::<Variant>().cloned().unwrap_or_default();
    }
    Variant::from_info(info, Some(payload))
}

fn element_info(rust_type: core::any::TypeId) -> Option<&'static TypeInfo> {
    let info = registry().info_by_rust_type(rust_type);
    if info.is_none() {
        tracing::trace!("container element type is not registered");
    }
    info
}

/// A position shared by clones.
#[derive(Clone)]
struct Position<'a> {
    cursor: Rc<RefCell<Box<dyn Cursor<'a> + 'a>>>,
    capabilities: IterCapabilities,
}

impl<'a> Position<'a> {
    fn new(cursor: Box<dyn Cursor<'a> + 'a>, capabilities: IterCapabilities) -> Self {
        Position {
            cursor: Rc::new(RefCell::new(cursor)),
            capabilities,
        }
    }

    fn index(&self) -> usize {
        self.cursor.borrow().position()
    }

    fn advance(&self, step: isize) {
        debug_assert!(
            step >= 0 || self.capabilities.contains(IterCapabilities::BIDIRECTIONAL),
            "moving a forward-only iterator backwards"
        );
        self.cursor.borrow_mut().advance(step);
    }

    fn fork(&self, step: isize) -> Self {
        let forked = Position::new(self.cursor.borrow().fork(), self.capabilities);
        forked.advance(step);
        forked
    }

    fn value(&self) -> Option<&'a Payload> {
        self.cursor.borrow().value()
    }

    fn key(&self) -> Option<&'a Payload> {
        self.cursor.borrow().key()
    }
}

// === Sequential ===

/// A borrowed sequential container.
#[derive(Clone, Copy)]
pub struct SequentialIterable<'a> {
    container: &'a Payload,
    def: SequentialDef,
    value_info: Option<&'static TypeInfo>,
}

impl<'a> SequentialIterable<'a> {
    /// Number of elements.
    pub fn len(&self) -> usize {
        (self.def.len)(self.container)
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How iterators over this container may move.
    pub fn capabilities(&self) -> IterCapabilities {
        self.def.capabilities
    }

    /// Type of the elements; [`MetaTypeId::UNKNOWN`] when unregistered.
    pub fn value_type(&self) -> MetaTypeId {
        self.value_info.map_or(MetaTypeId::UNKNOWN, |info| info.id)
    }

    /// An iterator at the first element.
    pub fn begin(&self) -> SequentialIterator<'a> {
        SequentialIterator {
            position: Position::new((self.def.cursor)(self.container), self.def.capabilities),
            value_info: self.value_info,
        }
    }

    /// An iterator past the last element.
    pub fn end(&self) -> SequentialIterator<'a> {
        let it = self.begin();
        it.position.cursor.borrow_mut().move_to_end();
        it
    }

    /// The element at `index`, or `None` past the end.
    pub fn at(&self, index: usize) -> Option<Variant> {
        if index >= self.len() {
            return None;
        }
        let it = self.begin();
        it.position.advance(isize::try_from(index).ok()?);
        Some(it.get())
    }

    /// The elements in order.
    pub fn iter(&self) -> SequentialIterator<'a> {
        self.begin()
    }
}

impl fmt::Debug for SequentialIterable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialIterable")
            .field("value_type", &self.value_type())
            .field("len", &self.len())
            .finish()
    }
}

/// A position in a [`SequentialIterable`].
///
/// Clones share the position; as a Rust [`Iterator`] it yields the element
/// under the position and moves on.
#[derive(Clone)]
pub struct SequentialIterator<'a> {
    position: Position<'a>,
    value_info: Option<&'static TypeInfo>,
}

impl SequentialIterator<'_> {
    /// Index of the position.
    pub fn position(&self) -> usize {
        self.position.index()
    }

    /// The element under the position; invalid past the end.
    pub fn get(&self) -> Variant {
        materialize(self.value_info, self.position.value())
    }

    /// Moves every clone of this iterator by `step`.
    ///
    /// Backward steps need [`IterCapabilities::BIDIRECTIONAL`].
    pub fn advance(&mut self, step: isize) {
        self.position.advance(step);
    }

    /// A new iterator `step` elements away; this one stays put.
    pub fn offset(&self, step: isize) -> Self {
        SequentialIterator {
            position: self.position.fork(step),
            value_info: self.value_info,
        }
    }
}

impl PartialEq for SequentialIterator<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.position() == other.position()
    }
}

impl Iterator for SequentialIterator<'_> {
    type Item = Variant;

    fn next(&mut self) -> Option<Variant> {
        let payload = self.position.value()?;
        self.position.advance(1);
        Some(materialize(self.value_info, Some(payload)))
    }
}

impl fmt::Debug for SequentialIterator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialIterator")
            .field("position", &self.position())
            .finish()
    }
}

// === Associative ===

/// A borrowed associative container.
#[derive(Clone, Copy)]
pub struct AssociativeIterable<'a> {
    container: &'a Payload,
    def: AssociativeDef,
    key_info: Option<&'static TypeInfo>,
    mapped_info: Option<&'static TypeInfo>,
}

impl<'a> AssociativeIterable<'a> {
    /// Number of entries.
    pub fn len(&self) -> usize {
        (self.def.len)(self.container)
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How iterators over this container may move.
    pub fn capabilities(&self) -> IterCapabilities {
        self.def.capabilities
    }

    /// Type of the keys.
    pub fn key_type(&self) -> MetaTypeId {
        self.key_info.map_or(MetaTypeId::UNKNOWN, |info| info.id)
    }

    /// Type of the mapped values.
    pub fn mapped_type(&self) -> MetaTypeId {
        self.mapped_info.map_or(MetaTypeId::UNKNOWN, |info| info.id)
    }

    /// An iterator at the first entry.
    pub fn begin(&self) -> AssociativeIterator<'a> {
        AssociativeIterator {
            position: Position::new((self.def.cursor)(self.container), self.def.capabilities),
            key_info: self.key_info,
            mapped_info: self.mapped_info,
        }
    }

    /// An iterator past the last entry.
    pub fn end(&self) -> AssociativeIterator<'a> {
        let it = self.begin();
        it.position.cursor.borrow_mut().move_to_end();
        it
    }

    /// An iterator at the entry for `key`, or [`end`](Self::end).
    ///
    /// `key` is converted to the key type first.
    pub fn find(&self, key: &Variant) -> AssociativeIterator<'a> {
        let it = self.begin();
        let key = match self.key_info {
            Some(info) if info.id == MetaTypeId::VARIANT => Variant::from_value(key.clone()),
            Some(info) => key.try_convert(info.id).unwrap_or_default(),
            None => Variant::new(),
        };
        match key.payload() {
            Some(payload) => it.position.cursor.borrow_mut().seek(payload),
            None => it.position.cursor.borrow_mut().move_to_end(),
        }
        it
    }

    /// The value mapped to `key`.
    pub fn value(&self, key: &Variant) -> Option<Variant> {
        let payload = self.find(key).position.value()?;
        Some(materialize(self.mapped_info, Some(payload)))
    }

    /// Whether there is an entry for `key`.
    pub fn contains_key(&self, key: &Variant) -> bool {
        self.find(key).position.value().is_some()
    }

    /// The entries in order.
    pub fn iter(&self) -> AssociativeIterator<'a> {
        self.begin()
    }
}

impl fmt::Debug for AssociativeIterable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssociativeIterable")
            .field("key_type", &self.key_type())
            .field("mapped_type", &self.mapped_type())
            .field("len", &self.len())
            .finish()
    }
}

/// A position in an [`AssociativeIterable`].
///
/// Clones share the position; as a Rust [`Iterator`] it yields
/// `(key, value)` pairs.
#[derive(Clone)]
pub struct AssociativeIterator<'a> {
    position: Position<'a>,
    key_info: Option<&'static TypeInfo>,
    mapped_info: Option<&'static TypeInfo>,
}

impl AssociativeIterator<'_> {
    /// Index of the position.
    pub fn position(&self) -> usize {
        self.position.index()
    }

    /// The key under the position; invalid past the end.
    pub fn key(&self) -> Variant {
        materialize(self.key_info, self.position.key())
    }

    /// The mapped value under the position; invalid past the end.
    pub fn value(&self) -> Variant {
        materialize(self.mapped_info, self.position.value())
    }

    /// Key and value under the position.
    pub fn get(&self) -> (Variant, Variant) {
        (self.key(), self.value())
    }

    /// Moves every clone of this iterator by `step`.
    pub fn advance(&mut self, step: isize) {
        self.position.advance(step);
    }

    /// A new iterator `step` entries away.
    pub fn offset(&self, step: isize) -> Self {
        AssociativeIterator {
            position: self.position.fork(step),
            key_info: self.key_info,
            mapped_info: self.mapped_info,
        }
    }
}

impl PartialEq for AssociativeIterator<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.position() == other.position()
    }
}

impl Iterator for AssociativeIterator<'_> {
    type Item = (Variant, Variant);

    fn next(&mut self) -> Option<(Variant, Variant)> {
        let (key, value) = (self.position.key()?, self.position.value()?);
        self.position.advance(1);
        Some((
            materialize(self.key_info, Some(key)),
            materialize(self.mapped_info, Some(value)),
        ))
    }
}

impl fmt::Debug for AssociativeIterator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssociativeIterator")
            .field("position", &self.position())
            .finish()
    }
}

impl Variant {
    /// The held value as a sequential container, if its type is one.
    pub fn sequential(&self) -> Option<SequentialIterable<'_>> {
        let def = self.info?.sequential?;
        Some(SequentialIterable {
            container: self.payload()?,
            def,
            value_info: element_info(def.value_type),
        })
    }

    /// The held value as an associative container, if its type is one.
    pub fn associative(&self) -> Option<AssociativeIterable<'_>> {
        let def = self.info?.associative?;
        Some(AssociativeIterable {
            container: self.payload()?,
            def,
            key_info: element_info(def.key_type),
            mapped_info: element_info(def.mapped_type),
        })
    }
}
