//! Type-erased cursors over container types.
//!
//! A container type registered with
//! [`TypeBuilder::sequential`](crate::TypeBuilder::sequential) or
//! [`TypeBuilder::associative`](crate::TypeBuilder::associative) can be walked
//! without knowing its Rust type: the registry hands out a [`Cursor`] that
//! borrows the container and yields its elements as [`Payload`] references.

use core::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::Hash;

use crate::Payload;

crate::bitflags! {
    /// How a container's cursor may move.
    pub struct IterCapabilities: u8 {
        /// Forward steps.
        const FORWARD = 1 << 0;
        /// Backward steps.
        const BIDIRECTIONAL = 1 << 1;
        /// Jumps of any size in constant time.
        const RANDOM_ACCESS = 1 << 2;
    }
}

impl IterCapabilities {
    /// Everything a slice can do.
    pub const ALL: IterCapabilities = IterCapabilities::FORWARD
        .union(IterCapabilities::BIDIRECTIONAL)
        .union(IterCapabilities::RANDOM_ACCESS);
}

/// A position inside a borrowed container.
///
/// Positions run from 0 (first element) to the container's length (past the
/// end). Moving outside that range clamps.
pub trait Cursor<'a> {
    /// Index of the current position.
    fn position(&self) -> usize;

    /// Moves by `step` elements; negative steps move backwards.
    fn advance(&mut self, step: isize);

    /// Moves past the last element.
    fn move_to_end(&mut self);

    /// Element (or mapped value) at the current position.
    fn value(&self) -> Option<&'a Payload>;

    /// Key at the current position, for associative containers.
    fn key(&self) -> Option<&'a Payload> {
        None
    }

    /// Moves to the entry whose key equals `key`, or to the end.
    fn seek(&mut self, key: &Payload) {
        let _ = key;
        self.move_to_end();
    }

    /// An independent cursor at the same position.
    fn fork(&self) -> Box<dyn Cursor<'a> + 'a>;
}

fn step(pos: usize, step: isize, len: usize) -> usize {
    pos.saturating_add_signed(step).min(len)
}

/// Cursor over a slice.
pub struct SliceCursor<'a, E> {
    items: &'a [E],
    pos: usize,
}

impl<'a, E> SliceCursor<'a, E> {
    /// A cursor at the first element of `items`.
    pub fn new(items: &'a [E]) -> Self {
        Self { items, pos: 0 }
    }
}

impl<'a, E: Any + Send + Sync> Cursor<'a> for SliceCursor<'a, E> {
    fn position(&self) -> usize {
        self.pos
    }

    fn advance(&mut self, n: isize) {
        self.pos = step(self.pos, n, self.items.len());
    }

    fn move_to_end(&mut self) {
        self.pos = self.items.len();
    }

    fn value(&self) -> Option<&'a Payload> {
        self.items.get(self.pos).map(|item| item as &Payload)
    }

    fn fork(&self) -> Box<dyn Cursor<'a> + 'a> {
        Box::new(SliceCursor {
            items: self.items,
            pos: self.pos,
        })
    }
}

/// Cursor over a snapshot of `(key, value)` references.
///
/// The snapshot fixes the iteration order, which matters for hashed maps.
pub struct EntryCursor<'a, K, V> {
    entries: Vec<(&'a K, &'a V)>,
    pos: usize,
}

impl<'a, K, V> EntryCursor<'a, K, V> {
    /// A cursor at the first of `entries`.
    pub fn new(entries: impl IntoIterator<Item = (&'a K, &'a V)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            pos: 0,
        }
    }
}

impl<'a, K, V> Cursor<'a> for EntryCursor<'a, K, V>
where
    K: Any + Send + Sync + PartialEq,
    V: Any + Send + Sync,
{
    fn position(&self) -> usize {
        self.pos
    }

    fn advance(&mut self, n: isize) {
        self.pos = step(self.pos, n, self.entries.len());
    }

    fn move_to_end(&mut self) {
        self.pos = self.entries.len();
    }

    fn value(&self) -> Option<&'a Payload> {
        self.entries.get(self.pos).map(|(_, v)| *v as &Payload)
    }

    fn key(&self) -> Option<&'a Payload> {
        self.entries.get(self.pos).map(|(k, _)| *k as &Payload)
    }

    fn seek(&mut self, key: &Payload) {
        self.pos = match key.downcast_ref::<K>() {
            Some(key) => self
                .entries
                .iter()
                .position(|(k, _)| *k == key)
                .unwrap_or(self.entries.len()),
            None => self.entries.len(),
        };
    }

    fn fork(&self) -> Box<dyn Cursor<'a> + 'a> {
        Box::new(EntryCursor {
            entries: self.entries.clone(),
            pos: self.pos,
        })
    }
}

/// A container of values of one element type.
pub trait SequentialContainer: Any + Send + Sync {
    /// How the cursor may move.
    const CAPABILITIES: IterCapabilities;

    /// Rust type of the elements.
    fn value_type() -> TypeId;

    /// Number of elements.
    fn len(&self) -> usize;

    /// A cursor at the first element.
    fn cursor(&self) -> Box<dyn Cursor<'_> + '_>;
}

/// A container mapping keys of one type to values of another.
pub trait AssociativeContainer: Any + Send + Sync {
    /// How the cursor may move.
    const CAPABILITIES: IterCapabilities;

    /// Rust type of the keys.
    fn key_type() -> TypeId;

    /// Rust type of the mapped values.
    fn mapped_type() -> TypeId;

    /// Number of entries.
    fn len(&self) -> usize;

    /// A cursor at the first entry.
    fn cursor(&self) -> Box<dyn Cursor<'_> + '_>;
}

impl<E: Any + Send + Sync> SequentialContainer for Vec<E> {
    const CAPABILITIES: IterCapabilities = IterCapabilities::ALL;

    fn value_type() -> TypeId {
        TypeId::of::<E>()
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn cursor(&self) -> Box<dyn Cursor<'_> + '_> {
        Box::new(SliceCursor::new(self))
    }
}

/// Walks both halves of the ring buffer.
struct DequeCursor<'a, E> {
    deque: &'a VecDeque<E>,
    pos: usize,
}

impl<'a, E: Any + Send + Sync> Cursor<'a> for DequeCursor<'a, E> {
    fn position(&self) -> usize {
        self.pos
    }

    fn advance(&mut self, n: isize) {
        self.pos = step(self.pos, n, self.deque.len());
    }

    fn move_to_end(&mut self) {
        self.pos = self.deque.len();
    }

    fn value(&self) -> Option<&'a Payload> {
        self.deque.get(self.pos).map(|item| item as &Payload)
    }

    fn fork(&self) -> Box<dyn Cursor<'a> + 'a> {
        Box::new(DequeCursor {
            deque: self.deque,
            pos: self.pos,
        })
    }
}

impl<E: Any + Send + Sync> SequentialContainer for VecDeque<E> {
    const CAPABILITIES: IterCapabilities = IterCapabilities::ALL;

    fn value_type() -> TypeId {
        TypeId::of::<E>()
    }

    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    fn cursor(&self) -> Box<dyn Cursor<'_> + '_> {
        Box::new(DequeCursor {
            deque: self,
            pos: 0,
        })
    }
}

impl<K, V> AssociativeContainer for BTreeMap<K, V>
where
    K: Any + Send + Sync + Ord,
    V: Any + Send + Sync,
{
    const CAPABILITIES: IterCapabilities =
        IterCapabilities::FORWARD.union(IterCapabilities::BIDIRECTIONAL);

    fn key_type() -> TypeId {
        TypeId::of::<K>()
    }

    fn mapped_type() -> TypeId {
        TypeId::of::<V>()
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn cursor(&self) -> Box<dyn Cursor<'_> + '_> {
        Box::new(EntryCursor::new(self.iter()))
    }
}

impl<K, V> AssociativeContainer for HashMap<K, V>
where
    K: Any + Send + Sync + Eq + Hash,
    V: Any + Send + Sync,
{
    const CAPABILITIES: IterCapabilities = IterCapabilities::FORWARD;

    fn key_type() -> TypeId {
        TypeId::of::<K>()
    }

    fn mapped_type() -> TypeId {
        TypeId::of::<V>()
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn cursor(&self) -> Box<dyn Cursor<'_> + '_> {
        Box::new(EntryCursor::new(self.iter()))
    }
}

impl AssociativeContainer for serde_json::Map<String, serde_json::Value> {
    const CAPABILITIES: IterCapabilities =
        IterCapabilities::FORWARD.union(IterCapabilities::BIDIRECTIONAL);

    fn key_type() -> TypeId {
        TypeId::of::<String>()
    }

    fn mapped_type() -> TypeId {
        TypeId::of::<serde_json::Value>()
    }

    fn len(&self) -> usize {
        serde_json::Map::len(self)
    }

    fn cursor(&self) -> Box<dyn Cursor<'_> + '_> {
        Box::new(EntryCursor::new(self.iter()))
    }
}

/// Registry entry for a sequential container type.
#[derive(Clone, Copy)]
pub struct SequentialDef {
    /// Rust type of the elements; resolved to a registered id on use.
    pub value_type: TypeId,
    /// How cursors may move.
    pub capabilities: IterCapabilities,
    /// Number of elements.
    pub len: fn(&Payload) -> usize,
    /// A cursor at the first element.
    pub cursor: for<'a> fn(&'a Payload) -> Box<dyn Cursor<'a> + 'a>,
}

impl SequentialDef {
    /// The entry for `T`.
    pub fn of<T: SequentialContainer>() -> Self {
        Self {
            value_type: T::value_type(),
            capabilities: T::CAPABILITIES,
            len: seq_len::<T>,
            cursor: seq_cursor::<T>,
        }
    }
}

fn seq_len<T: SequentialContainer>(p: &Payload) -> usize {
    crate::cast::<T>(p).len()
}

fn seq_cursor<T: SequentialContainer>(p: &Payload) -> Box<dyn Cursor<'_> + '_> {
    crate::cast::<T>(p).cursor()
}

/// Registry entry for an associative container type.
#[derive(Clone, Copy)]
pub struct AssociativeDef {
    /// Rust type of the keys.
    pub key_type: TypeId,
    /// Rust type of the mapped values.
    pub mapped_type: TypeId,
    /// How cursors may move.
    pub capabilities: IterCapabilities,
    /// Number of entries.
    pub len: fn(&Payload) -> usize,
    /// A cursor at the first entry.
    pub cursor: for<'a> fn(&'a Payload) -> Box<dyn Cursor<'a> + 'a>,
}

impl AssociativeDef {
    /// The entry for `T`.
    pub fn of<T: AssociativeContainer>() -> Self {
        Self {
            key_type: T::key_type(),
            mapped_type: T::mapped_type(),
            capabilities: T::CAPABILITIES,
            len: assoc_len::<T>,
            cursor: assoc_cursor::<T>,
        }
    }
}

fn assoc_len<T: AssociativeContainer>(p: &Payload) -> usize {
    crate::cast::<T>(p).len()
}

fn assoc_cursor<T: AssociativeContainer>(p: &Payload) -> Box<dyn Cursor<'_> + '_> {
    crate::cast::<T>(p).cursor()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_cursor_clamps() {
        let items = vec![1i32, 2, 3];
        let mut cursor = items.cursor();
        cursor.advance(2);
        assert_eq!(cursor.value().and_then(|v| v.downcast_ref::<i32>()), Some(&3));
        cursor.advance(5);
        assert_eq!(cursor.position(), 3);
        assert!(cursor.value().is_none());
        cursor.advance(-10);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn forks_move_independently() {
        let items = vec!["a".to_string(), "b".to_string()];
        let mut cursor = items.cursor();
        let fork = cursor.fork();
        cursor.advance(1);
        assert_eq!(fork.position(), 0);
        assert_eq!(cursor.position(), 1);
    }

    struct Opaque(u8);

    fn opaque(payload: Option<&Payload>) -> Option<u8> {
        payload.and_then(|v| v.downcast_ref::<Opaque>()).map(|o| o.0)
    }

    #[test]
    fn forks_need_no_clone_elements() {
        let items = vec![Opaque(1), Opaque(2)];
        let mut slice = items.cursor();
        slice.advance(1);
        assert_eq!(opaque(slice.fork().value()), Some(2));

        let deque = VecDeque::from([Opaque(3), Opaque(4)]);
        let mut ring = deque.cursor();
        ring.advance(1);
        let mut forked = ring.fork();
        forked.advance(-1);
        assert_eq!(ring.position(), 1);
        assert_eq!(opaque(forked.value()), Some(3));

        let map = BTreeMap::from([(1u8, Opaque(5)), (2u8, Opaque(6))]);
        let mut entries = map.cursor();
        entries.advance(1);
        let forked = entries.fork();
        entries.advance(1);
        assert_eq!(forked.key().and_then(|k| k.downcast_ref::<u8>()), Some(&2));
        assert_eq!(entries.position(), 2);
    }

    #[test]
    fn entry_cursor_seeks_by_key() {
        let map = BTreeMap::from([("x".to_string(), 1u8), ("y".to_string(), 2u8)]);
        let mut cursor = map.cursor();
        cursor.seek(&"y".to_string());
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.value().and_then(|v| v.downcast_ref::<u8>()), Some(&2));

        cursor.seek(&"z".to_string());
        assert_eq!(cursor.position(), 2);

        // wrong key type never matches
        cursor.seek(&7i32);
        assert_eq!(cursor.position(), 2);
    }
}
