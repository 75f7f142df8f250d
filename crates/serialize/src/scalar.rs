//! Codecs for booleans, fixed-width numbers, strings and byte strings.
//!
//! | codec                | wire form                                  |
//! |----------------------|--------------------------------------------|
//! | [`Bool`]             | one byte, `00` or `01`                     |
//! | [`Raw`]              | the little-endian bytes of the number      |
//! | [`StringSerializer`] | length prefix, then the UTF-8 bytes        |
//! | [`BytesSerializer`]  | length prefix, then the bytes              |
//!
//! Length prefixes are the same [`PositiveVarint`] `i64` the collections
//! use.
//!
//! [`PositiveVarint`]: crate::varint::PositiveVarint

use std::{fmt, marker::PhantomData};

use crate::{
    collection::{length_size, read_length, write_length},
    error::{self, Result},
    serializer::{Marshaler, Sizer, Skipper, Unmarshaler},
    session::Session,
    stream::{Reader, Writer},
    validate::Validator,
};

// =============================================================================
// Bool
// =============================================================================

/// Codec for `bool` as a single `0` or `1` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Bool;

fn read_bool(reader: &mut dyn Reader) -> Result<bool> {
    match reader.read_byte()? {
        0 => Ok(false),
        1 => Ok(true),
        other => {
            Err(error::wrong_format(format!("invalid bool byte {other}"), 1))
        }
    }
}

impl Marshaler<bool> for Bool {
    fn marshal(
        &self,
        value: &bool,
        writer: &mut dyn Writer,
        _session: &mut Session,
    ) -> Result<usize> {
        writer.write_byte(u8::from(*value))?;
        Ok(1)
    }
}

impl Unmarshaler<bool> for Bool {
    fn unmarshal(
        &self,
        reader: &mut dyn Reader,
        _session: &mut Session,
    ) -> Result<(bool, usize)> {
        Ok((read_bool(reader)?, 1))
    }
}

impl Sizer<bool> for Bool {
    fn size(&self, _value: &bool, _session: &mut Session) -> usize { 1 }
}

impl Skipper for Bool {
    fn skip(
        &self,
        reader: &mut dyn Reader,
        _session: &mut Session,
    ) -> Result<usize> {
        read_bool(reader)?;
        Ok(1)
    }
}

// =============================================================================
// Raw
// =============================================================================

/// Codec for numbers as their fixed-width little-endian bytes.
///
/// Implemented for `u8`, `i8`, `u16`, `i16`, `u32`, `i32`, `u64`, `i64`,
/// `f32` and `f64`. The type parameter fixes the width, which is what lets
/// the codec skip a value without knowing it.
pub struct Raw<T>(PhantomData<fn() -> T>);

impl<T> Raw<T> {
    /// Creates the codec.
    #[must_use]
    pub const fn new() -> Self { Self(PhantomData) }
}

impl<T> Default for Raw<T> {
    fn default() -> Self { Self::new() }
}

impl<T> Clone for Raw<T> {
    fn clone(&self) -> Self { *self }
}

impl<T> Copy for Raw<T> {}

impl<T> fmt::Debug for Raw<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Raw<{}>", std::any::type_name::<T>())
    }
}

macro_rules! impl_raw {
    ($($ty:ty),+) => {
        $(
            impl Marshaler<$ty> for Raw<$ty> {
                fn marshal(
                    &self,
                    value: &$ty,
                    writer: &mut dyn Writer,
                    _session: &mut Session,
                ) -> Result<usize> {
                    writer.write_bytes(&value.to_le_bytes())
                }
            }

            impl Unmarshaler<$ty> for Raw<$ty> {
                fn unmarshal(
                    &self,
                    reader: &mut dyn Reader,
                    _session: &mut Session,
                ) -> Result<($ty, usize)> {
                    let mut buf = [0u8; size_of::<$ty>()];
                    let read = reader.read_bytes(&mut buf)?;
                    Ok((<$ty>::from_le_bytes(buf), read))
                }
            }

            impl Sizer<$ty> for Raw<$ty> {
                fn size(&self, _value: &$ty, _session: &mut Session) -> usize {
                    size_of::<$ty>()
                }
            }

            impl Skipper for Raw<$ty> {
                fn skip(
                    &self,
                    reader: &mut dyn Reader,
                    _session: &mut Session,
                ) -> Result<usize> {
                    reader.skip_bytes(size_of::<$ty>())
                }
            }
        )+
    };
}

impl_raw!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

// =============================================================================
// Length-prefixed byte strings
// =============================================================================

/// The optional length check shared by strings and byte strings.
#[derive(Default)]
struct LengthCheck {
    validator: Option<Box<dyn Validator<usize>>>,
    skip_rejected: bool,
}

impl LengthCheck {
    /// Validates `len`; on rejection consumes the payload first if asked to.
    ///
    /// `read` is the size of the length prefix.
    fn run(
        &self,
        len: usize,
        reader: &mut dyn Reader,
        read: usize,
    ) -> Result<()> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let Err(rejection) = validator.validate(&len) else {
            return Ok(());
        };

        if !self.skip_rejected {
            tracing::debug!("{}, leaving {} bytes unread", rejection, len);
            return Err(error::rejected(rejection, read));
        }

        tracing::debug!("{}, skipping {} bytes", rejection, len);
        let skipped = reader.skip_bytes(len).map_err(|e| e.offset_by(read))?;

        Err(error::rejected(rejection, read + skipped))
    }
}

impl fmt::Debug for LengthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LengthCheck")
            .field("validator", &self.validator.is_some())
            .field("skip_rejected", &self.skip_rejected)
            .finish()
    }
}

/// Reads a length prefix and `len` payload bytes.
///
/// The buffer grows in steps of at most the session's preallocation limit,
/// so a hostile length fails on the stream running dry instead of on a huge
/// allocation.
fn read_payload(
    check: &LengthCheck,
    reader: &mut dyn Reader,
    session: &mut Session,
) -> Result<(Vec<u8>, usize)> {
    let (len, read) = read_length(reader, session)?;
    check.run(len, reader, read)?;

    let step = session.preallocation_limit().max(1);
    let mut bytes = Vec::new();

    while bytes.len() < len {
        let start = bytes.len();
        bytes.resize(start + (len - start).min(step), 0);
        reader
            .read_bytes(&mut bytes[start..])
            .map_err(|e| e.offset_by(read + start))?;
    }

    Ok((bytes, read + len))
}

fn skip_payload(
    reader: &mut dyn Reader,
    session: &mut Session,
) -> Result<usize> {
    let (len, read) = read_length(reader, session)?;
    let skipped = reader.skip_bytes(len).map_err(|e| e.offset_by(read))?;

    Ok(read + skipped)
}

fn write_payload(
    payload: &[u8],
    writer: &mut dyn Writer,
    session: &mut Session,
) -> Result<usize> {
    let written = write_length(payload.len(), writer, session)?;
    let payload =
        writer.write_bytes(payload).map_err(|e| e.offset_by(written))?;

    Ok(written + payload)
}

macro_rules! length_checked {
    ($name:ident) => {
        impl $name {
            /// Creates a codec without a length check.
            #[must_use]
            pub fn new() -> Self { Self::default() }

            /// Checks the decoded length before the payload is read.
            #[must_use]
            pub fn with_length_validator(
                mut self,
                validator: impl Validator<usize> + 'static,
            ) -> Self {
                self.check.validator = Some(Box::new(validator));
                self
            }

            /// When `skip` is set, a rejected length still consumes the
            /// payload, so the stream is left right after the value.
            #[must_use]
            pub fn skip_rejected(mut self, skip: bool) -> Self {
                self.check.skip_rejected = skip;
                self
            }
        }
    };
}

/// Codec for `String` (and `str` when encoding).
///
/// Decoding fails with [`ErrorKind::WrongFormat`] on invalid UTF-8, after
/// the whole payload was consumed. Skipping does not inspect the payload.
///
/// [`ErrorKind::WrongFormat`]: crate::error::ErrorKind::WrongFormat
#[derive(Debug, Default)]
pub struct StringSerializer {
    check: LengthCheck,
}

length_checked!(StringSerializer);

impl Marshaler<str> for StringSerializer {
    fn marshal(
        &self,
        value: &str,
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize> {
        write_payload(value.as_bytes(), writer, session)
    }
}

impl Marshaler<String> for StringSerializer {
    fn marshal(
        &self,
        value: &String,
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize> {
        write_payload(value.as_bytes(), writer, session)
    }
}

impl Unmarshaler<String> for StringSerializer {
    fn unmarshal(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<(String, usize)> {
        let (bytes, read) = read_payload(&self.check, reader, session)?;

        let value = String::from_utf8(bytes).map_err(|e| {
            let reason = format!("invalid UTF-8: {}", e.utf8_error());
            error::wrong_format(reason, read)
        })?;

        Ok((value, read))
    }
}

impl Sizer<str> for StringSerializer {
    fn size(&self, value: &str, _session: &mut Session) -> usize {
        length_size(value.len()) + value.len()
    }
}

impl Sizer<String> for StringSerializer {
    fn size(&self, value: &String, _session: &mut Session) -> usize {
        length_size(value.len()) + value.len()
    }
}

impl Skipper for StringSerializer {
    fn skip(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<usize> {
        skip_payload(reader, session)
    }
}

/// Codec for `Vec<u8>` (and `[u8]` when encoding) as one bulk payload.
#[derive(Debug, Default)]
pub struct BytesSerializer {
    check: LengthCheck,
}

length_checked!(BytesSerializer);

impl Marshaler<[u8]> for BytesSerializer {
    fn marshal(
        &self,
        value: &[u8],
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize> {
        write_payload(value, writer, session)
    }
}

impl Marshaler<Vec<u8>> for BytesSerializer {
    fn marshal(
        &self,
        value: &Vec<u8>,
        writer: &mut dyn Writer,
        session: &mut Session,
    ) -> Result<usize> {
        write_payload(value, writer, session)
    }
}

impl Unmarshaler<Vec<u8>> for BytesSerializer {
    fn unmarshal(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<(Vec<u8>, usize)> {
        read_payload(&self.check, reader, session)
    }
}

impl Sizer<[u8]> for BytesSerializer {
    fn size(&self, value: &[u8], _session: &mut Session) -> usize {
        length_size(value.len()) + value.len()
    }
}

impl Sizer<Vec<u8>> for BytesSerializer {
    fn size(&self, value: &Vec<u8>, _session: &mut Session) -> usize {
        length_size(value.len()) + value.len()
    }
}

impl Skipper for BytesSerializer {
    fn skip(
        &self,
        reader: &mut dyn Reader,
        session: &mut Session,
    ) -> Result<usize> {
        skip_payload(reader, session)
    }
}
