//! The four-operation codec contract.
//!
//! Every codec in this crate is a value implementing some of:
//!
//! - [`Marshaler`]: writes a value, returning the bytes written
//! - [`Unmarshaler`]: reads a value back, returning it with the bytes read
//! - [`Sizer`]: computes what [`Marshaler::marshal`] would write, without a
//!   stream
//! - [`Skipper`]: consumes exactly what [`Unmarshaler::unmarshal`] would,
//!   without materializing the value
//!
//! [`Serializer`] is implemented for anything providing all four. Codecs
//! compose by holding other codecs: a collection holds its element codec, a
//! pointer holds the codec of its pointee, and so on. Dispatch is static
//! except for the stream, which is always `dyn`, so a plain closure can act
//! as a codec through [`MarshalFn`], [`UnmarshalFn`], [`SizeFn`] and
//! [`SkipFn`].
//!
//! # Invariants
//!
//! For any value `v` and a fresh [`Session`] per call:
//!
//! - `size(v)` equals the count returned by `marshal(v, ..)`
//! - on the bytes produced by `marshal(v, ..)`, `unmarshal` and `skip` both
//!   consume exactly `size(v)` bytes
//!
//! # Example
//!
//! ```ignore
//! use strand_serialize::{serializer::{to_vec, from_slice}, varint::Varint};
//!
//! let bytes = to_vec(&Varint::new(), &300u32)?;
//! assert_eq!(bytes, [0xAC, 0x02]);
//!
//! let (value, read): (u32, usize) = from_slice(&Varint::new(), &bytes)?;
//! assert_eq!((value, read), (300, 2));
//! ```

use crate::{
    error::Result,
    session::Session,
    stream::{Reader, Writer},
};

/// Writes values of type `T` to a stream.
pub trait Marshaler<T: ?Sized> {
    /// Writes the encoding of `value`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails; the error carries the number of
    /// bytes written before the failure.
    fn marshal(
        &self,
        value: &T,
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize>;
}

/// Reads values of type `T` from a stream.
pub trait Unmarshaler<T> {
    /// Reads one value, returning it with the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails or the encoding is invalid; the
    /// error carries the number of bytes consumed before the failure.
    fn unmarshal(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<(T, usize)>;
}

/// Computes the encoded size of values of type `T`.
pub trait Sizer<T: ?Sized> {
    /// Returns the number of bytes [`Marshaler::marshal`] would write for
    /// `value` given the same session state.
    fn size(&self, value: &T, session: &mut Session) -> usize;
}

/// Consumes one encoded value without decoding it.
pub trait Skipper {
    /// Consumes one encoded value, returning the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns the same errors [`Unmarshaler::unmarshal`] would for the same
    /// bytes.
    fn skip(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<usize>;
}

/// A complete codec for `T`.
pub trait Serializer<T>:
    Marshaler<T> + Unmarshaler<T> + Sizer<T> + Skipper
{
}

impl<T, S> Serializer<T> for S where
    S: Marshaler<T> + Unmarshaler<T> + Sizer<T> + Skipper + ?Sized
{
}

// =============================================================================
// Forwarding implementations for references
// =============================================================================

impl<T: ?Sized, M: Marshaler<T> + ?Sized> Marshaler<T> for &M {
    fn marshal(
        &self,
        value: &T,
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize> {
        (**self).marshal(value, writer, session)
    }
}

impl<T, U: Unmarshaler<T> + ?Sized> Unmarshaler<T> for &U {
    fn unmarshal(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<(T, usize)> {
        (**self).unmarshal(reader, session)
    }
}

impl<T: ?Sized, S: Sizer<T> + ?Sized> Sizer<T> for &S {
    fn size(&self, value: &T, session: &mut Session) -> usize {
        (**self).size(value, session)
    }
}

impl<K: Skipper + ?Sized> Skipper for &K {
    fn skip(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<usize> {
        (**self).skip(reader, session)
    }
}

impl<K: Skipper + ?Sized> Skipper for Box<K> {
    fn skip(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<usize> {
        (**self).skip(reader, session)
    }
}

// =============================================================================
// Functional adapters
// =============================================================================

/// Adapts a function `Fn(&T, &mut dyn Writer, &mut Session) -> Result<usize>`
/// into a [`Marshaler`].
#[derive(Debug, Clone, Copy)]
pub struct MarshalFn<F>(pub F);

impl<T: ?Sized, F> Marshaler<T> for MarshalFn<F>
where
    F: Fn(&T, &mut dyn Writer, &mut Session) -> Result<usize>,
{
    fn marshal(
        &self,
        value: &T,
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize> {
        (self.0)(value, writer, session)
    }
}

/// Adapts a function `Fn(&mut dyn Reader, &mut Session) -> Result<(T,
/// usize)>` into an [`Unmarshaler`].
#[derive(Debug, Clone, Copy)]
pub struct UnmarshalFn<F>(pub F);

impl<T, F> Unmarshaler<T> for UnmarshalFn<F>
where
    F: Fn(&mut dyn Reader, &mut Session) -> Result<(T, usize)>,
{
    fn unmarshal(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<(T, usize)> {
        (self.0)(reader, session)
    }
}

/// Adapts a function `Fn(&T, &mut Session) -> usize` into a [`Sizer`].
#[derive(Debug, Clone, Copy)]
pub struct SizeFn<F>(pub F);

impl<T: ?Sized, F> Sizer<T> for SizeFn<F>
where
    F: Fn(&T, &mut Session) -> usize,
{
    fn size(&self, value: &T, session: &mut Session) -> usize {
        (self.0)(value, session)
    }
}

/// Adapts a function `Fn(&mut dyn Reader, &mut Session) -> Result<usize>`
/// into a [`Skipper`].
#[derive(Debug, Clone, Copy)]
pub struct SkipFn<F>(pub F);

impl<F> Skipper for SkipFn<F>
where
    F: Fn(&mut dyn Reader, &mut Session) -> Result<usize>,
{
    fn skip(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<usize> {
        (self.0)(reader, session)
    }
}

/// Bundles four independent parts into one [`Serializer`].
///
/// Handy for hand-written codecs of structs, where each operation is a
/// separate function:
///
/// ```ignore
/// let point = Composite {
///     marshal: MarshalFn(marshal_point),
///     unmarshal: UnmarshalFn(unmarshal_point),
///     size: SizeFn(size_point),
///     skip: SkipFn(skip_point),
/// };
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Composite<M, U, Z, K> {
    /// Performs [`Marshaler::marshal`].
    pub marshal: M,
    /// Performs [`Unmarshaler::unmarshal`].
    pub unmarshal: U,
    /// Performs [`Sizer::size`].
    pub size: Z,
    /// Performs [`Skipper::skip`].
    pub skip: K,
}

impl<T, M, U, Z, K> Marshaler<T> for Composite<M, U, Z, K>
where
    T: ?Sized,
    M: Marshaler<T>,
{
    fn marshal(
        &self,
        value: &T,
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize> {
        self.marshal.marshal(value, writer, session)
    }
}

impl<T, M, U, Z, K> Unmarshaler<T> for Composite<M, U, Z, K>
where
    U: Unmarshaler<T>,
{
    fn unmarshal(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<(T, usize)> {
        self.unmarshal.unmarshal(reader, session)
    }
}

impl<T: ?Sized, M, U, Z: Sizer<T>, K> Sizer<T> for Composite<M, U, Z, K> {
    fn size(&self, value: &T, session: &mut Session) -> usize {
        self.size.size(value, session)
    }
}

impl<M, U, Z, K: Skipper> Skipper for Composite<M, U, Z, K> {
    fn skip(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<usize> {
        self.skip.skip(reader, session)
    }
}

// =============================================================================
// Convenience functions
// =============================================================================

/// Encodes `value` into a freshly allocated buffer.
///
/// The buffer is sized with [`Sizer::size`] first; sizing and encoding each
/// run against an empty session.
///
/// # Errors
///
/// Returns an error if marshalling fails.
pub fn to_vec<T, S>(serializer: &S, value: &T) -> Result<Vec<u8>>
where
    T: ?Sized,
    S: Marshaler<T> + Sizer<T> + ?Sized,
{
    let mut session = Session::new();
    let size = serializer.size(value, &mut session);
    session.clear();

    let mut buffer = Vec::with_capacity(size);
    serializer.marshal(value, &mut buffer, &mut session)?;
    Ok(buffer)
}

/// Decodes one value from the start of `bytes`, returning it with the number
/// of bytes consumed.
///
/// # Errors
///
/// Returns an error if unmarshalling fails.
pub fn from_slice<T, U>(unmarshaler: &U, bytes: &[u8]) -> Result<(T, usize)>
where
    U: Unmarshaler<T> + ?Sized,
{
    let mut reader = bytes;
    unmarshaler.unmarshal(&mut reader, &mut Session::new())
}
