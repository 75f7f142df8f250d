//! A serializer that owns its session and resets it after every call.

use std::cell::{RefCell, RefMut};

use crate::{
    config::{Config, DefaultConfig},
    error::Result,
    serializer::{Marshaler, Sizer, Skipper, Unmarshaler},
    session::Session,
    stream::{Reader, Writer},
};

/// Runs an inner serializer against a private [`Session`] that is emptied
/// when each top-level call returns.
///
/// Put a `Wrapper` around the outermost serializer of a value containing
/// pointers. Every call on the wrapper starts from empty identity maps, so
/// ids never leak from one top-level value into the next. The maps are
/// cleared by a guard, which also runs when the inner serializer fails or
/// panics.
///
/// The session argument of the serializer traits is ignored; the inner
/// serializer always sees the wrapper's own session.
///
/// # Panics
///
/// A wrapper serves one call at a time. Calling a wrapper again from inside
/// its own inner serializer panics.
///
/// # Example
///
/// ```ignore
/// let graph = Wrapper::new(PointerSerializer::new(NodeSerializer));
///
/// let bytes = to_vec(&graph, &Some(root))?;
/// assert_eq!(graph.pointer_map_len(), 0);
/// ```
#[derive(Debug)]
pub struct Wrapper<S> {
    inner: S,
    session: RefCell<Session>,
}

/// Clears the session it borrows when dropped.
struct Scope<'a> {
    session: RefMut<'a, Session>,
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        self.session.clear();
        tracing::trace!("cleared wrapper session");
    }
}

impl<S> Wrapper<S> {
    /// Wraps `inner` with a session using [`DefaultConfig`].
    #[must_use]
    pub fn new(inner: S) -> Self { Self::with_config::<DefaultConfig>(inner) }

    /// Wraps `inner` with a session tuned by `C`.
    #[must_use]
    pub fn with_config<C: Config>(inner: S) -> Self {
        Self { inner, session: RefCell::new(Session::with_config::<C>()) }
    }

    /// Returns the inner serializer.
    #[must_use]
    pub const fn inner(&self) -> &S { &self.inner }

    /// Consumes the wrapper, returning the inner serializer.
    #[must_use]
    pub fn into_inner(self) -> S { self.inner }

    /// Returns the number of entries in the encode-side identity map.
    ///
    /// Always 0 between calls.
    ///
    /// # Panics
    ///
    /// Panics if called from inside a call on this wrapper.
    #[must_use]
    pub fn pointer_map_len(&self) -> usize {
        self.session.borrow().pointers().len()
    }

    /// Returns the number of entries in the decode-side identity map.
    ///
    /// Always 0 between calls.
    ///
    /// # Panics
    ///
    /// Panics if called from inside a call on this wrapper.
    #[must_use]
    pub fn reverse_map_len(&self) -> usize {
        self.session.borrow().reverse().len()
    }

    fn scope(&self) -> Scope<'_> {
        Scope { session: self.session.borrow_mut() }
    }
}

impl<T: ?Sized, S: Marshaler<T>> Marshaler<T> for Wrapper<S> {
    fn marshal(
        &self,
        value: &T,
        writer: &mut dyn Writer,
        _session: &mut Session,
    ) -> Result<usize> {
        let mut scope = self.scope();
        self.inner.marshal(value, writer, &mut scope.session)
    }
}

impl<T, S: Unmarshaler<T>> Unmarshaler<T> for Wrapper<S> {
    fn unmarshal(
        &self,
        reader: &mut dyn Reader,
        _session: &mut Session,
    ) -> Result<(T, usize)> {
        let mut scope = self.scope();
        self.inner.unmarshal(reader, &mut scope.session)
    }
}

impl<T: ?Sized, S: Sizer<T>> Sizer<T> for Wrapper<S> {
    fn size(&self, value: &T, _session: &mut Session) -> usize {
        let mut scope = self.scope();
        self.inner.size(value, &mut scope.session)
    }
}

impl<S: Skipper> Skipper for Wrapper<S> {
    fn skip(
        &self,
        reader: &mut dyn Reader,
        _session: &mut Session,
    ) -> Result<usize> {
        let mut scope = self.scope();
        self.inner.skip(reader, &mut scope.session)
    }
}
