//! Pointer values that keep their identity across a round trip.
//!
//! A [`Ptr`] is a shared, reference-counted handle. Two handles that point to
//! the same allocation are the *same* object, regardless of whether the
//! pointed-to values compare equal. [`PointerSerializer`] preserves that
//! identity: each distinct allocation is written once and every later
//! occurrence refers back to it by id, so shared subgraphs stay shared and
//! cycles terminate.
//!
//! # Wire Format
//!
//! ```text
//! nil pointer        : 00
//! first occurrence   : 01 <id varint> <payload>
//! repeated occurrence: 01 <id varint>
//! ```
//!
//! Ids start at 1 and are assigned in the order allocations are first met
//! during one top-level call. The id space is shared by every pointer type
//! encoded in that call.
//!
//! # Cycles
//!
//! Decoding registers an empty placeholder under the id *before* the payload
//! is decoded, so a payload that refers back to its own id resolves to the
//! placeholder, which is filled once the payload is complete. On the encode
//! side a self-referential graph is built the same way, with [`Ptr::empty`]
//! and [`Ptr::set`]:
//!
//! ```ignore
//! let node = Ptr::empty();
//! node.set(Node { value: 1, next: Some(node.clone()) }).ok();
//! ```

use std::{
    cell::{Ref, RefCell},
    fmt,
    marker::PhantomData,
    rc::Rc,
};

use crate::{
    error::{self, Result},
    serializer::{Marshaler, Sizer, Skipper, Unmarshaler},
    session::{Session, Slot},
    stream::{Reader, Writer},
    varint::{self, Varint},
};

/// The identity of a [`Ptr`] allocation.
///
/// Identities are only meaningful while the allocation is alive; an
/// allocation freed and reused by the allocator may yield the same identity
/// again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(usize);

/// A shared handle to a value that may be filled in after allocation.
///
/// Cloning a `Ptr` clones the handle, not the value; both handles have the
/// same [`Identity`].
///
/// # Ownership
///
/// Handles are strong, so a graph with a cycle keeps itself alive after the
/// last outside handle is dropped. Decoding a cyclic encoding produces such a
/// graph. Call [`Ptr::take`] on a node of every cycle, usually the root,
/// once the graph is no longer needed:
///
/// ```ignore
/// let (root, _) = from_slice(&graph, &bytes)?;
/// let root = root.unwrap();
/// // ..
/// drop(root.take());
/// ```
pub struct Ptr<T>(Rc<RefCell<Option<T>>>);

impl<T> Ptr<T> {
    /// Allocates a pointer holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self { Self(Rc::new(RefCell::new(Some(value)))) }

    /// Allocates a pointer whose value is set later with [`Ptr::set`].
    #[must_use]
    pub fn empty() -> Self { Self(Rc::new(RefCell::new(None))) }

    /// Sets the value of an empty pointer.
    ///
    /// # Errors
    ///
    /// Gives `value` back if the pointer already holds a value.
    pub fn set(&self, value: T) -> std::result::Result<(), T> {
        // a live borrow means the slot is already filled
        let Ok(mut slot) = self.0.try_borrow_mut() else {
            return Err(value);
        };
        if slot.is_some() {
            return Err(value);
        }

        *slot = Some(value);
        Ok(())
    }

    /// Returns the value, or `None` if it has not been set yet or was taken.
    #[must_use]
    pub fn get(&self) -> Option<Ref<'_, T>> {
        let slot = self.0.try_borrow().ok()?;
        Ref::filter_map(slot, Option::as_ref).ok()
    }

    /// Removes the value, leaving the pointer empty for every handle.
    ///
    /// Dropping the returned value drops the handles it holds, which breaks
    /// any cycle running through this pointer.
    ///
    /// # Panics
    ///
    /// Panics if a reference returned by [`Ptr::get`] is still alive.
    pub fn take(&self) -> Option<T> { self.0.borrow_mut().take() }

    /// Returns `true` if both handles point to the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) }

    /// Returns the identity of the allocation.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity(Rc::as_ptr(&self.0).cast::<()>() as usize)
    }

    /// Returns the number of handles to the allocation.
    #[must_use]
    pub fn handle_count(&self) -> usize { Rc::strong_count(&self.0) }
}

impl<T> Clone for Ptr<T> {
    fn clone(&self) -> Self { Self(Rc::clone(&self.0)) }
}

// the value is not printed: it may refer back to this very pointer
impl<T> fmt::Debug for Ptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ptr")
            .field("identity", &self.identity())
            .field("set", &self.get().is_some())
            .finish()
    }
}

/// The leading byte of an encoded pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// A nil pointer; nothing follows.
    Nil = 0,

    /// A pointer id follows, and the payload too on first occurrence.
    Mapping = 1,
}

impl TryFrom<u8> for Tag {
    type Error = u8;

    fn try_from(byte: u8) -> std::result::Result<Self, u8> {
        match byte {
            0 => Ok(Self::Nil),
            1 => Ok(Self::Mapping),
            other => Err(other),
        }
    }
}

const ID: Varint<u64> = Varint::new();

fn read_tag(reader: &mut dyn Reader) -> Result<Tag> {
    let byte = reader.read_byte()?;

    Tag::try_from(byte).map_err(|byte| {
        error::wrong_format(format!("unknown pointer tag {byte}"), 1)
    })
}

/// Codec for `Option<Ptr<T>>` that preserves identity within one top-level
/// call.
///
/// The pointee is handled by the base serializer `S`. Identity state lives in
/// the [`Session`] passed to each call; wrap the outermost serializer in a
/// [`Wrapper`](crate::wrapper::Wrapper) to get a clean session per call.
///
/// Skipping a first occurrence records its id without building the pointee.
/// A later occurrence of that id in the same call therefore decodes as
/// `None`, exactly like a nil pointer: there is no value it could share.
///
/// Decoded graphs with cycles must be released with [`Ptr::take`]; see
/// [`Ptr`].
pub struct PointerSerializer<T, S> {
    base: S,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S> PointerSerializer<T, S> {
    /// Creates a pointer codec whose pointees are handled by `base`.
    #[must_use]
    pub const fn new(base: S) -> Self { Self { base, _marker: PhantomData } }

    /// Returns the pointee codec.
    #[must_use]
    pub const fn base(&self) -> &S { &self.base }
}

impl<T, S: Clone> Clone for PointerSerializer<T, S> {
    fn clone(&self) -> Self { Self::new(self.base.clone()) }
}

impl<T, S: Copy> Copy for PointerSerializer<T, S> {}

impl<T, S: fmt::Debug> fmt::Debug for PointerSerializer<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerSerializer").field("base", &self.base).finish()
    }
}

impl<T, S: Marshaler<T>> Marshaler<Option<Ptr<T>>> for PointerSerializer<T, S> {
    fn marshal(
        &self,
        value: &Option<Ptr<T>>,
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize> {
        let Some(ptr) = value else {
            writer.write_byte(Tag::Nil as u8)?;
            return Ok(1);
        };

        let Some(pointee) = ptr.get() else {
            return Err(error::wrong_format("pointer value was never set", 0));
        };

        writer.write_byte(Tag::Mapping as u8)?;
        let mut written = 1;

        let (id, new) = session.pointers_mut().get_or_assign(ptr.identity());
        written += ID
            .marshal(&id, writer, session)
            .map_err(|e| e.offset_by(written))?;

        if new {
            written += self
                .base
                .marshal(&pointee, writer, session)
                .map_err(|e| e.offset_by(written))?;
        }

        Ok(written)
    }
}

impl<T: 'static, S: Unmarshaler<T>> Unmarshaler<Option<Ptr<T>>>
    for PointerSerializer<T, S>
{
    fn unmarshal(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<(Option<Ptr<T>>, usize)> {
        if read_tag(reader)? == Tag::Nil {
            return Ok((None, 1));
        }
        let mut read = 1;

        let (id, id_len) =
            ID.unmarshal(reader, session).map_err(|e| e.offset_by(read))?;
        read += id_len;

        match session.reverse().get(id) {
            Slot::Skipped => return Ok((None, read)),
            Slot::Materialized(pointer) => {
                return pointer
                    .downcast_ref::<Ptr<T>>()
                    .map(|ptr| (Some(ptr.clone()), read))
                    .ok_or_else(|| {
                        error::wrong_format(
                            format!("pointer {id} has a different type"),
                            read,
                        )
                    });
            }
            Slot::Unseen => {}
        }

        let placeholder = Ptr::empty();
        session.reverse_mut().insert(id, Box::new(placeholder.clone()));
        tracing::trace!("registered placeholder for pointer {id}");

        let (value, payload_len) = self
            .base
            .unmarshal(reader, session)
            .map_err(|e| e.offset_by(read))?;
        read += payload_len;

        if placeholder.set(value).is_err() {
            return Err(error::wrong_format(
                format!("pointer {id} was filled twice"),
                read,
            ));
        }

        Ok((Some(placeholder), read))
    }
}

impl<T, S: Sizer<T>> Sizer<Option<Ptr<T>>> for PointerSerializer<T, S> {
    fn size(&self, value: &Option<Ptr<T>>, session: &mut Session) -> usize {
        let Some(ptr) = value else {
            return 1;
        };

        let (id, new) = session.pointers_mut().get_or_assign(ptr.identity());
        let mut size = 1 + varint::size_of(id);

        if new && let Some(pointee) = ptr.get() {
            size += self.base.size(&pointee, session);
        }

        size
    }
}

impl<T, S: Skipper> Skipper for PointerSerializer<T, S> {
    fn skip(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<usize> {
        if read_tag(reader)? == Tag::Nil {
            return Ok(1);
        }
        let mut read = 1;

        let (id, id_len) =
            ID.unmarshal(reader, session).map_err(|e| e.offset_by(read))?;
        read += id_len;

        if session.reverse().contains(id) {
            return Ok(read);
        }

        // recorded first so a payload referring back to `id` stops here
        session.reverse_mut().mark_skipped(id);

        read += self
            .base
            .skip(reader, session)
            .map_err(|e| e.offset_by(read))?;

        Ok(read)
    }
}

#[cfg(test)]
mod test;
