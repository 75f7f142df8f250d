//! Length-prefixed collections with validate-and-skip decoding.
//!
//! # Wire Format
//!
//! Every collection starts with its element count as a [`PositiveVarint`]
//! `i64`, followed by the elements back to back. Maps write each pair as the
//! key followed by the value; pairs come in the map's iteration order.
//!
//! # Validation and Recovery
//!
//! A collection codec can carry validators for its length and for each
//! decoded element (for maps, each key and each value). When a validator
//! rejects, decoding stops with [`ErrorKind::Validation`]. If a recovery
//! skipper was supplied, the rest of the collection is consumed first, so the
//! stream is left right after the collection and the caller can carry on with
//! the next value:
//!
//! ```ignore
//! let codec = SliceSerializer::new(Varint::<u32>::new())
//!     .with_length_validator(MaxLength(1024))
//!     .recover_with(Varint::<u32>::new());
//!
//! match codec.unmarshal(&mut reader, &mut session) {
//!     Err(error) if error.is_validation() => {
//!         // `reader` is positioned after the rejected collection
//!     }
//!     other => { /* .. */ }
//! }
//! ```
//!
//! Without a skipper the rejection is returned as soon as it happens and the
//! stream is left wherever decoding stopped. Stream and format errors are
//! never recovered.
//!
//! [`ErrorKind::Validation`]: crate::error::ErrorKind::Validation

use std::{
    collections::HashMap,
    fmt,
    hash::{BuildHasher, Hash},
    marker::PhantomData,
};

use fxhash::FxBuildHasher;

use crate::{
    error::{self, Error, Result, ValidationError},
    serializer::{Marshaler, Sizer, Skipper, Unmarshaler},
    session::Session,
    stream::{Reader, Writer},
    validate::Validator,
    varint::{self, PositiveVarint},
};

// =============================================================================
// Length prefix
// =============================================================================

const LENGTH: PositiveVarint<i64> = PositiveVarint::new();

#[allow(clippy::cast_possible_wrap)]
const fn length_to_wire(len: usize) -> i64 { len as i64 }

/// Writes a collection or string length.
pub(crate) fn write_length(
    len: usize,
    writer: &mut dyn Writer,
    session: &mut Session,
) -> Result<usize> {
    LENGTH.marshal(&length_to_wire(len), writer, session)
}

/// Returns the encoded size of a length prefix.
pub(crate) const fn length_size(len: usize) -> usize {
    varint::size_of(len as u64)
}

/// Reads a length prefix, rejecting negative lengths.
pub(crate) fn read_length(
    reader: &mut dyn Reader,
    session: &mut Session,
) -> Result<(usize, usize)> {
    let (len, read) = LENGTH.unmarshal(reader, session)?;

    if len < 0 {
        return Err(error::negative_length(len, read));
    }

    let len = usize::try_from(len).map_err(|_| error::overflow("usize", read))?;
    Ok((len, read))
}

// =============================================================================
// Recovery
// =============================================================================

/// Skips `count` values with `skipper` after a rejection and returns the
/// rejection with the total number of bytes consumed.
///
/// `read` is the number of bytes of the collection consumed so far. Without a
/// skipper the rejection is returned right away.
fn reject(
    rejection: ValidationError,
    skipper: Option<&dyn Skipper>,
    count: usize,
    reader: &mut dyn Reader,
    session: &mut Session,
    read: usize,
) -> Error {
    let Some(skipper) = skipper else {
        tracing::debug!(
            "{}, no recovery skipper so the stream is left mid-collection",
            rejection
        );
        return error::rejected(rejection, read);
    };

    tracing::debug!("{}, skipping {} remaining values", rejection, count);

    match skip_values(skipper, count, reader, session, read) {
        Ok(read) => error::rejected(rejection, read),
        Err(error) => error,
    }
}

/// Skips `count` values with `skipper` and returns `read` plus the bytes
/// consumed.
///
/// A value whose skip consumes nothing leaves the stream where it was, so
/// every value after it would consume nothing too; the loop stops there
/// instead of spinning through a hostile count.
fn skip_values(
    skipper: &dyn Skipper,
    count: usize,
    reader: &mut dyn Reader,
    session: &mut Session,
    mut read: usize,
) -> Result<usize> {
    for index in 0..count {
        let skipped =
            skipper.skip(reader, session).map_err(|e| e.offset_by(read))?;

        if skipped == 0 {
            tracing::trace!(
                "empty encoding, treating the last {} values as skipped",
                count - index
            );
            break;
        }

        read += skipped;
    }

    Ok(read)
}

/// Runs `validator`, if any, against `value`.
fn check<T: ?Sized>(
    validator: Option<&dyn Validator<T>>,
    value: &T,
) -> std::result::Result<(), ValidationError> {
    validator.map_or(Ok(()), |validator| validator.validate(value))
}

// =============================================================================
// Slices
// =============================================================================

/// Codec for `Vec<T>` (and `[T]` when encoding) with per-element codec `S`.
pub struct SliceSerializer<T, S> {
    element: S,
    length_validator: Option<Box<dyn Validator<usize>>>,
    element_validator: Option<Box<dyn Validator<T>>>,
    skipper: Option<Box<dyn Skipper>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S> SliceSerializer<T, S> {
    /// Creates a codec that handles each element with `element`.
    #[must_use]
    pub fn new(element: S) -> Self {
        Self {
            element,
            length_validator: None,
            element_validator: None,
            skipper: None,
            _marker: PhantomData,
        }
    }

    /// Checks the decoded length before any element is decoded.
    #[must_use]
    pub fn with_length_validator(
        mut self,
        validator: impl Validator<usize> + 'static,
    ) -> Self {
        self.length_validator = Some(Box::new(validator));
        self
    }

    /// Checks every decoded element.
    #[must_use]
    pub fn with_element_validator(
        mut self,
        validator: impl Validator<T> + 'static,
    ) -> Self {
        self.element_validator = Some(Box::new(validator));
        self
    }

    /// Skips the rest of the collection with `skipper` when a validator
    /// rejects, one call per remaining element.
    #[must_use]
    pub fn recover_with(mut self, skipper: impl Skipper + 'static) -> Self {
        self.skipper = Some(Box::new(skipper));
        self
    }

    /// Returns the element codec.
    #[must_use]
    pub const fn element(&self) -> &S { &self.element }
}

impl<T, S: fmt::Debug> fmt::Debug for SliceSerializer<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceSerializer")
            .field("element", &self.element)
            .field("length_validator", &self.length_validator.is_some())
            .field("element_validator", &self.element_validator.is_some())
            .field("skipper", &self.skipper.is_some())
            .finish()
    }
}

impl<T, S: Marshaler<T>> Marshaler<[T]> for SliceSerializer<T, S> {
    fn marshal(
        &self,
        value: &[T],
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize> {
        let mut written = write_length(value.len(), writer, session)?;

        for element in value {
            written += self
                .element
                .marshal(element, writer, session)
                .map_err(|e| e.offset_by(written))?;
        }

        Ok(written)
    }
}

impl<T, S: Marshaler<T>> Marshaler<Vec<T>> for SliceSerializer<T, S> {
    fn marshal(
        &self,
        value: &Vec<T>,
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize> {
        Marshaler::<[T]>::marshal(self, value, writer, session)
    }
}

impl<T, S: Unmarshaler<T>> Unmarshaler<Vec<T>> for SliceSerializer<T, S> {
    fn unmarshal(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<(Vec<T>, usize)> {
        let (len, mut read) = read_length(reader, session)?;

        if let Err(rejection) = check(self.length_validator.as_deref(), &len) {
            return Err(reject(
                rejection,
                self.skipper.as_deref(),
                len,
                reader,
                session,
                read,
            ));
        }

        let mut elements =
            Vec::with_capacity(len.min(session.preallocation_limit()));

        for index in 0..len {
            let (element, element_len) = self
                .element
                .unmarshal(reader, session)
                .map_err(|e| e.offset_by(read))?;
            read += element_len;

            if let Err(rejection) =
                check(self.element_validator.as_deref(), &element)
            {
                return Err(reject(
                    rejection,
                    self.skipper.as_deref(),
                    len - index - 1,
                    reader,
                    session,
                    read,
                ));
            }

            elements.push(element);
        }

        Ok((elements, read))
    }
}

impl<T, S: Sizer<T>> Sizer<[T]> for SliceSerializer<T, S> {
    fn size(&self, value: &[T], session: &mut Session) -> usize {
        value.iter().fold(length_size(value.len()), |size, element| {
            size + self.element.size(element, session)
        })
    }
}

impl<T, S: Sizer<T>> Sizer<Vec<T>> for SliceSerializer<T, S> {
    fn size(&self, value: &Vec<T>, session: &mut Session) -> usize {
        Sizer::<[T]>::size(self, value, session)
    }
}

impl<T, S: Skipper> Skipper for SliceSerializer<T, S> {
    fn skip(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<usize> {
        let (len, read) = read_length(reader, session)?;
        skip_values(&self.element, len, reader, session, read)
    }
}

// =============================================================================
// Arrays
// =============================================================================

/// Codec for `[T; N]`, with the same wire form as a slice of length `N`.
///
/// Decoding fails with [`ErrorKind::WrongFormat`] if the encoded length is
/// not `N`.
///
/// [`ErrorKind::WrongFormat`]: crate::error::ErrorKind::WrongFormat
pub struct ArraySerializer<T, S, const N: usize> {
    element: S,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S, const N: usize> ArraySerializer<T, S, N> {
    /// Creates a codec that handles each element with `element`.
    #[must_use]
    pub const fn new(element: S) -> Self {
        Self { element, _marker: PhantomData }
    }
}

impl<T, S: fmt::Debug, const N: usize> fmt::Debug for ArraySerializer<T, S, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArraySerializer")
            .field("element", &self.element)
            .field("len", &N)
            .finish()
    }
}

fn read_array_length<const N: usize>(
    reader: &mut dyn Reader,
    session: &mut Session,
) -> Result<usize> {
    let (len, read) = read_length(reader, session)?;

    if len != N {
        return Err(error::wrong_format(
            format!("expected an array of {N} elements, found {len}"),
            read,
        ));
    }

    Ok(read)
}

impl<T, S: Marshaler<T>, const N: usize> Marshaler<[T; N]>
    for ArraySerializer<T, S, N>
{
    fn marshal(
        &self,
        value: &[T; N],
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize> {
        let mut written = write_length(N, writer, session)?;

        for element in value {
            written += self
                .element
                .marshal(element, writer, session)
                .map_err(|e| e.offset_by(written))?;
        }

        Ok(written)
    }
}

impl<T, S: Unmarshaler<T>, const N: usize> Unmarshaler<[T; N]>
    for ArraySerializer<T, S, N>
{
    fn unmarshal(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<([T; N], usize)> {
        let mut read = read_array_length::<N>(reader, session)?;
        let mut elements = Vec::with_capacity(N);

        for _ in 0..N {
            let (element, element_len) = self
                .element
                .unmarshal(reader, session)
                .map_err(|e| e.offset_by(read))?;
            read += element_len;
            elements.push(element);
        }

        let array = <[T; N]>::try_from(elements).map_err(|_| {
            error::wrong_format("array length changed while decoding", read)
        })?;

        Ok((array, read))
    }
}

impl<T, S: Sizer<T>, const N: usize> Sizer<[T; N]>
    for ArraySerializer<T, S, N>
{
    fn size(&self, value: &[T; N], session: &mut Session) -> usize {
        value.iter().fold(length_size(N), |size, element| {
            size + self.element.size(element, session)
        })
    }
}

impl<T, S: Skipper, const N: usize> Skipper for ArraySerializer<T, S, N> {
    fn skip(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<usize> {
        let read = read_array_length::<N>(reader, session)?;
        skip_values(&self.element, N, reader, session, read)
    }
}

// =============================================================================
// Maps
// =============================================================================

/// Skips one key/value pair.
struct PairSkipper<'a> {
    key: &'a dyn Skipper,
    value: &'a dyn Skipper,
}

impl Skipper for PairSkipper<'_> {
    fn skip(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<usize> {
        let read = self.key.skip(reader, session)?;
        let value_len =
            self.value.skip(reader, session).map_err(|e| e.offset_by(read))?;

        Ok(read + value_len)
    }
}

/// Codec for `HashMap<K, V, H>` with key codec `KS` and value codec `VS`.
///
/// The hasher of decoded maps is `H::default()`; it defaults to
/// [`FxBuildHasher`].
pub struct MapSerializer<K, V, KS, VS, H = FxBuildHasher> {
    key: KS,
    value: VS,
    length_validator: Option<Box<dyn Validator<usize>>>,
    key_validator: Option<Box<dyn Validator<K>>>,
    value_validator: Option<Box<dyn Validator<V>>>,
    skippers: Option<(Box<dyn Skipper>, Box<dyn Skipper>)>,
    _marker: PhantomData<fn() -> (K, V, H)>,
}

impl<K, V, KS, VS> MapSerializer<K, V, KS, VS> {
    /// Creates a codec for maps hashed with [`FxBuildHasher`].
    #[must_use]
    pub fn new(key: KS, value: VS) -> Self { Self::with_hasher(key, value) }
}

impl<K, V, KS, VS, H> MapSerializer<K, V, KS, VS, H> {
    /// Creates a codec for maps hashed with `H`.
    #[must_use]
    pub fn with_hasher(key: KS, value: VS) -> Self {
        Self {
            key,
            value,
            length_validator: None,
            key_validator: None,
            value_validator: None,
            skippers: None,
            _marker: PhantomData,
        }
    }

    /// Checks the decoded pair count before any pair is decoded.
    #[must_use]
    pub fn with_length_validator(
        mut self,
        validator: impl Validator<usize> + 'static,
    ) -> Self {
        self.length_validator = Some(Box::new(validator));
        self
    }

    /// Checks every decoded key.
    #[must_use]
    pub fn with_key_validator(
        mut self,
        validator: impl Validator<K> + 'static,
    ) -> Self {
        self.key_validator = Some(Box::new(validator));
        self
    }

    /// Checks every decoded value.
    #[must_use]
    pub fn with_value_validator(
        mut self,
        validator: impl Validator<V> + 'static,
    ) -> Self {
        self.value_validator = Some(Box::new(validator));
        self
    }

    /// Skips the rest of the map with `key` and `value` when a validator
    /// rejects.
    #[must_use]
    pub fn recover_with(
        mut self,
        key: impl Skipper + 'static,
        value: impl Skipper + 'static,
    ) -> Self {
        self.skippers = Some((Box::new(key), Box::new(value)));
        self
    }

    fn pair_skipper(&self) -> Option<PairSkipper<'_>> {
        self.skippers.as_ref().map(|(key, value)| PairSkipper {
            key: key.as_ref(),
            value: value.as_ref(),
        })
    }
}

impl<K, V, KS: fmt::Debug, VS: fmt::Debug, H> fmt::Debug
    for MapSerializer<K, V, KS, VS, H>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapSerializer")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("length_validator", &self.length_validator.is_some())
            .field("key_validator", &self.key_validator.is_some())
            .field("value_validator", &self.value_validator.is_some())
            .field("skippers", &self.skippers.is_some())
            .finish()
    }
}

impl<K, V, KS, VS, H> Marshaler<HashMap<K, V, H>>
    for MapSerializer<K, V, KS, VS, H>
where
    KS: Marshaler<K>,
    VS: Marshaler<V>,
{
    fn marshal(
        &self,
        value: &HashMap<K, V, H>,
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize> {
        let mut written = write_length(value.len(), writer, session)?;

        for (k, v) in value {
            written += self
                .key
                .marshal(k, writer, session)
                .map_err(|e| e.offset_by(written))?;
            written += self
                .value
                .marshal(v, writer, session)
                .map_err(|e| e.offset_by(written))?;
        }

        Ok(written)
    }
}

impl<K, V, KS, VS, H> Unmarshaler<HashMap<K, V, H>>
    for MapSerializer<K, V, KS, VS, H>
where
    K: Eq + Hash,
    KS: Unmarshaler<K>,
    VS: Unmarshaler<V>,
    H: BuildHasher + Default,
{
    fn unmarshal(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<(HashMap<K, V, H>, usize)> {
        let (len, mut read) = read_length(reader, session)?;
        let pairs = self.pair_skipper();
        let pairs = pairs.as_ref().map(|skipper| skipper as &dyn Skipper);

        if let Err(rejection) = check(self.length_validator.as_deref(), &len) {
            return Err(reject(rejection, pairs, len, reader, session, read));
        }

        let mut map = HashMap::with_capacity_and_hasher(
            len.min(session.preallocation_limit()),
            H::default(),
        );

        for index in 0..len {
            let remaining = len - index - 1;

            let (k, key_len) = self
                .key
                .unmarshal(reader, session)
                .map_err(|e| e.offset_by(read))?;
            read += key_len;

            if let Err(rejection) = check(self.key_validator.as_deref(), &k) {
                // the value of the rejected key is still ahead in the stream
                if let Some((_, value_skipper)) = &self.skippers {
                    match value_skipper.skip(reader, session) {
                        Ok(skipped) => read += skipped,
                        Err(error) => return Err(error.offset_by(read)),
                    }
                }

                return Err(reject(
                    rejection, pairs, remaining, reader, session, read,
                ));
            }

            let (v, value_len) = self
                .value
                .unmarshal(reader, session)
                .map_err(|e| e.offset_by(read))?;
            read += value_len;

            if let Err(rejection) = check(self.value_validator.as_deref(), &v) {
                return Err(reject(
                    rejection, pairs, remaining, reader, session, read,
                ));
            }

            map.insert(k, v);
        }

        Ok((map, read))
    }
}

impl<K, V, KS, VS, H> Sizer<HashMap<K, V, H>> for MapSerializer<K, V, KS, VS, H>
where
    KS: Sizer<K>,
    VS: Sizer<V>,
{
    fn size(&self, value: &HashMap<K, V, H>, session: &mut Session) -> usize {
        value.iter().fold(length_size(value.len()), |size, (k, v)| {
            size + self.key.size(k, session) + self.value.size(v, session)
        })
    }
}

impl<K, V, KS: Skipper, VS: Skipper, H> Skipper
    for MapSerializer<K, V, KS, VS, H>
{
    fn skip(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<usize> {
        let (len, read) = read_length(reader, session)?;
        let pair = PairSkipper { key: &self.key, value: &self.value };

        skip_values(&pair, len, reader, session, read)
    }
}
