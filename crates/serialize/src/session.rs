//! Per-call state shared by every codec of one top-level operation.
//!
//! Most codecs are stateless, but pointer-typed values need to remember which
//! objects were already written (encode side) or already materialized (decode
//! side). That state lives in a [`Session`], which is passed as `&mut Session`
//! through every [`Marshaler`], [`Unmarshaler`], [`Sizer`] and [`Skipper`]
//! call, so nested codecs see the same maps as their parents.
//!
//! A session is meant to cover exactly one top-level call. The
//! [`Wrapper`](crate::wrapper::Wrapper) enforces that by clearing its session
//! after each call; code driving serializers by hand should use a fresh
//! session (or [`Session::clear`]) per top-level value.
//!
//! # Thread Safety
//!
//! A session is owned by the single in-flight call using it. It is not
//! designed to be shared between concurrent calls.
//!
//! [`Marshaler`]: crate::serializer::Marshaler
//! [`Unmarshaler`]: crate::serializer::Unmarshaler
//! [`Sizer`]: crate::serializer::Sizer
//! [`Skipper`]: crate::serializer::Skipper

use std::{any::Any, collections::hash_map::Entry, fmt};

use fxhash::FxHashMap;

use crate::{
    config::{Config, DefaultConfig},
    pointer::Identity,
};

/// Encode-side map from object identity to its wire id.
///
/// Ids are assigned densely starting at 1 in the order objects are first
/// met.
#[derive(Debug, Default)]
pub struct PointerMap {
    ids: FxHashMap<Identity, u64>,
}

impl PointerMap {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: FxHashMap::with_capacity_and_hasher(
                capacity,
                fxhash::FxBuildHasher::default(),
            ),
        }
    }

    /// Returns the id of `identity`, assigning the next one if it has not
    /// been seen yet. The flag is `true` when the id is new.
    pub fn get_or_assign(&mut self, identity: Identity) -> (u64, bool) {
        let next = self.ids.len() as u64 + 1;

        match self.ids.entry(identity) {
            Entry::Occupied(entry) => (*entry.get(), false),
            Entry::Vacant(entry) => (*entry.insert(next), true),
        }
    }

    /// Returns the id assigned to `identity`, if any.
    #[must_use]
    pub fn get(&self, identity: Identity) -> Option<u64> {
        self.ids.get(&identity).copied()
    }

    /// Returns the number of identities recorded.
    #[must_use]
    pub fn len(&self) -> usize { self.ids.len() }

    /// Returns `true` if no identity is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    /// Forgets every identity.
    pub fn clear(&mut self) { self.ids.clear(); }
}

/// What the decode side knows about a wire id.
pub enum Slot<'a> {
    /// The id was never met in this session.
    Unseen,

    /// The id was met by a skip; no object exists for it.
    Skipped,

    /// The id was materialized; holds the type-erased pointer.
    Materialized(&'a dyn Any),
}

/// Decode-side map from wire id to the pointer materialized for it.
///
/// Entries are type-erased so pointers of different types share one id
/// space, mirroring the encode side. An entry registered by a skip holds no
/// pointer at all.
#[derive(Default)]
pub struct ReversePointerMap {
    slots: FxHashMap<u64, Option<Box<dyn Any>>>,
}

impl ReversePointerMap {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: FxHashMap::with_capacity_and_hasher(
                capacity,
                fxhash::FxBuildHasher::default(),
            ),
        }
    }

    /// Looks up `id`.
    #[must_use]
    pub fn get(&self, id: u64) -> Slot<'_> {
        match self.slots.get(&id) {
            None => Slot::Unseen,
            Some(None) => Slot::Skipped,
            Some(Some(pointer)) => Slot::Materialized(pointer.as_ref()),
        }
    }

    /// Returns `true` if `id` was materialized or skipped.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool { self.slots.contains_key(&id) }

    /// Registers the pointer materialized for `id`.
    pub fn insert(&mut self, id: u64, pointer: Box<dyn Any>) {
        self.slots.insert(id, Some(pointer));
    }

    /// Records that `id` was consumed by a skip.
    pub fn mark_skipped(&mut self, id: u64) { self.slots.insert(id, None); }

    /// Returns the number of ids recorded.
    #[must_use]
    pub fn len(&self) -> usize { self.slots.len() }

    /// Returns `true` if no id is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    /// Forgets every id.
    pub fn clear(&mut self) { self.slots.clear(); }
}

impl fmt::Debug for ReversePointerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReversePointerMap")
            .field("len", &self.slots.len())
            .finish_non_exhaustive()
    }
}

/// The state of one top-level encode or decode call.
#[derive(Debug)]
pub struct Session {
    pointers: PointerMap,
    reverse: ReversePointerMap,
    preallocation_limit: usize,
}

impl Default for Session {
    fn default() -> Self { Self::new() }
}

impl Session {
    /// Creates an empty session using [`DefaultConfig`].
    #[must_use]
    pub fn new() -> Self { Self::with_config::<DefaultConfig>() }

    /// Creates an empty session tuned by `C`.
    #[must_use]
    pub fn with_config<C: Config>() -> Self {
        let capacity = C::pointer_map_capacity();

        Self {
            pointers: PointerMap::with_capacity(capacity),
            reverse: ReversePointerMap::with_capacity(capacity),
            preallocation_limit: C::preallocation_limit(),
        }
    }

    /// Returns the encode-side identity map.
    #[must_use]
    pub const fn pointers(&self) -> &PointerMap { &self.pointers }

    /// Returns the encode-side identity map mutably.
    pub const fn pointers_mut(&mut self) -> &mut PointerMap {
        &mut self.pointers
    }

    /// Returns the decode-side identity map.
    #[must_use]
    pub const fn reverse(&self) -> &ReversePointerMap { &self.reverse }

    /// Returns the decode-side identity map mutably.
    pub const fn reverse_mut(&mut self) -> &mut ReversePointerMap {
        &mut self.reverse
    }

    /// Returns the number of elements a collection may reserve up front.
    #[must_use]
    pub const fn preallocation_limit(&self) -> usize {
        self.preallocation_limit
    }

    /// Returns `true` if neither identity map holds an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty() && self.reverse.is_empty()
    }

    /// Empties both identity maps, keeping their allocations.
    pub fn clear(&mut self) {
        self.pointers.clear();
        self.reverse.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::Ptr;

    #[test]
    fn ids_are_dense_and_stable() {
        let a = Ptr::new(1u8);
        let b = Ptr::new(1u8);
        let mut map = PointerMap::default();

        assert_eq!(map.get_or_assign(a.identity()), (1, true));
        assert_eq!(map.get_or_assign(b.identity()), (2, true));
        assert_eq!(map.get_or_assign(a.clone().identity()), (1, false));
        assert_eq!(map.get(b.identity()), Some(2));
        assert_eq!(map.len(), 2);

        map.clear();
        assert_eq!(map.get_or_assign(b.identity()), (1, true));
    }

    #[test]
    fn reverse_map_distinguishes_skipped_ids() {
        let mut map = ReversePointerMap::default();
        map.insert(1, Box::new(Ptr::new(5u32)));
        map.mark_skipped(2);

        assert!(matches!(map.get(1), Slot::Materialized(_)));
        assert!(matches!(map.get(2), Slot::Skipped));
        assert!(matches!(map.get(3), Slot::Unseen));
        assert!(map.contains(2));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn session_takes_limits_from_config() {
        struct Small;

        impl Config for Small {
            fn preallocation_limit() -> usize { 8 }
        }

        let mut session = Session::with_config::<Small>();
        assert_eq!(session.preallocation_limit(), 8);

        session.pointers_mut().get_or_assign(Ptr::new(0u8).identity());
        session.reverse_mut().mark_skipped(4);
        assert!(!session.is_empty());

        session.clear();
        assert!(session.is_empty());
    }
}
