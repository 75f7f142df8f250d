//! Variable-length integer encoding.
//!
//! # Format Overview
//!
//! Unsigned integers use LEB128: each byte carries 7 data bits, least
//! significant group first, and the MSB is set on every byte except the last.
//! Small values are therefore compact: `0..=127` takes one byte, `128..=16383`
//! two, and so on.
//!
//! | value | bytes         |
//! |-------|---------------|
//! | 0     | `00`          |
//! | 127   | `7F`          |
//! | 128   | `80 01`       |
//! | 300   | `AC 02`       |
//!
//! Signed integers are never written directly. [`Varint`] zigzag-transforms
//! them first so that small negative numbers stay small on the wire, while
//! [`PositiveVarint`] reinterprets the two's complement bits unchanged, which
//! is cheaper for values that are non-negative by construction (lengths and
//! counts) and makes a negative value decode as negative again.
//!
//! # Overflow
//!
//! Every width has a maximum encoded length and a maximum value for the byte
//! found at that length:
//!
//! | width  | max length | max last byte |
//! |--------|------------|---------------|
//! | 8      | 2          | `0x01`        |
//! | 16     | 3          | `0x03`        |
//! | 32     | 5          | `0x0F`        |
//! | 64     | 10         | `0x01`        |
//!
//! Decoding fails with [`ErrorKind::Overflow`] once the maximum length is
//! reached and the byte there either continues or exceeds the mask. Skipping
//! applies the same rule, so skip and decode always agree on the byte count.
//!
//! [`ErrorKind::Overflow`]: crate::error::ErrorKind::Overflow

use std::{fmt, marker::PhantomData};

use crate::{
    error::{self, Result},
    serializer::{Marshaler, Sizer, Skipper, Unmarshaler},
    session::Session,
    stream::{Reader, Writer},
};

/// Maximum number of bytes any supported varint occupies.
pub const MAX_VARINT_BYTES: usize = 10;

/// Codec for integers: unsigned types as LEB128, signed types zigzag-encoded
/// first.
///
/// The type parameter fixes the width, so skipping applies the same overflow
/// limits as decoding. Signed types use the limits of their unsigned
/// counterpart.
pub struct Varint<T>(PhantomData<fn() -> T>);

/// Codec for signed integers that are non-negative in practice: the bits are
/// reinterpreted as the same-width unsigned type without zigzag.
///
/// Lengths use this encoding. A negative value is still representable; it
/// costs the width's maximum length and decodes back to the same negative
/// value.
pub struct PositiveVarint<T>(PhantomData<fn() -> T>);

macro_rules! marker_codec {
    ($($name:ident),+) => {
        $(
            impl<T> $name<T> {
                /// Creates the codec.
                #[must_use]
                pub const fn new() -> Self { Self(PhantomData) }
            }

            impl<T> Default for $name<T> {
                fn default() -> Self { Self::new() }
            }

            impl<T> Clone for $name<T> {
                fn clone(&self) -> Self { *self }
            }

            impl<T> Copy for $name<T> {}

            impl<T> fmt::Debug for $name<T> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(
                        f,
                        concat!(stringify!($name), "<{}>"),
                        std::any::type_name::<T>()
                    )
                }
            }
        )+
    };
}

marker_codec!(Varint, PositiveVarint);

/// An unsigned width that can be varint-encoded.
///
/// Values are widened to `u64` for the arithmetic; the width's limits make
/// sure a decoded value always narrows back without loss.
trait Width: Copy {
    const BITS: u32;
    const NAME: &'static str;

    /// Maximum number of bytes of an encoding of this width.
    const MAX_LEN: usize = Self::BITS.div_ceil(7) as usize;

    /// Maximum value of the byte at position `MAX_LEN - 1`.
    const MAX_LAST: u8 =
        ((1u16 << (Self::BITS - 7 * (Self::MAX_LEN as u32 - 1))) - 1) as u8;

    fn widen(self) -> u64;

    fn narrow(value: u64) -> Self;
}

macro_rules! impl_width {
    ($($ty:ty),+) => {
        $(
            impl Width for $ty {
                const BITS: u32 = <$ty>::BITS;
                const NAME: &'static str = stringify!($ty);

                #[allow(clippy::cast_lossless, clippy::unnecessary_cast)]
                fn widen(self) -> u64 { self as u64 }

                #[allow(clippy::cast_possible_truncation)]
                fn narrow(value: u64) -> Self { value as $ty }
            }
        )+
    };
}

impl_width!(u8, u16, u32, u64, usize);

/// Returns the number of bytes the varint encoding of `value` occupies.
#[must_use]
pub const fn size_of(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Encodes `value` into `buf`, returning the number of bytes used.
#[inline]
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub const fn encode(mut value: u64, buf: &mut [u8; MAX_VARINT_BYTES]) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

/// Writes the varint encoding of `value`.
fn write_unsigned(value: u64, writer: &mut dyn Writer) -> Result<usize> {
    let mut buf = [0u8; MAX_VARINT_BYTES];
    let len = encode(value, &mut buf);
    writer.write_bytes(&buf[..len])
}

/// Reads a varint of width `W`.
fn read_unsigned<W: Width>(reader: &mut dyn Reader) -> Result<(W, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    let mut read = 0;

    loop {
        let byte = reader.read_byte().map_err(|e| e.offset_by(read))?;
        read += 1;

        if byte < 0x80 {
            if read == W::MAX_LEN && byte > W::MAX_LAST {
                return Err(error::overflow(W::NAME, read));
            }
            value |= u64::from(byte) << shift;
            return Ok((W::narrow(value), read));
        }

        if read == W::MAX_LEN {
            return Err(error::overflow(W::NAME, read));
        }

        value |= u64::from(byte & 0x7F) << shift;
        shift += 7;
    }
}

/// Consumes a varint of width `W` without keeping its value.
fn skip_unsigned<W: Width>(reader: &mut dyn Reader) -> Result<usize> {
    let mut read = 0;

    loop {
        let byte = reader.read_byte().map_err(|e| e.offset_by(read))?;
        read += 1;

        if byte < 0x80 {
            if read == W::MAX_LEN && byte > W::MAX_LAST {
                return Err(error::overflow(W::NAME, read));
            }
            return Ok(read);
        }

        if read == W::MAX_LEN {
            return Err(error::overflow(W::NAME, read));
        }
    }
}

// =============================================================================
// Zigzag
// =============================================================================

macro_rules! zigzag {
    ($($signed:ty => $unsigned:ty, $zigzag:ident, $unzigzag:ident);+ $(;)?) => {
        $(
            #[doc = concat!(
                "Maps an `", stringify!($signed), "` onto an `",
                stringify!($unsigned), "` so that small magnitudes of either ",
                "sign map to small values: `0, -1, 1, -2, ..` become `0, 1, ",
                "2, 3, ..`."
            )]
            #[inline]
            #[must_use]
            #[allow(clippy::cast_sign_loss)]
            pub const fn $zigzag(value: $signed) -> $unsigned {
                ((value << 1) ^ (value >> (<$signed>::BITS - 1))) as $unsigned
            }

            #[doc = concat!("Inverse of [`", stringify!($zigzag), "`].")]
            #[inline]
            #[must_use]
            #[allow(clippy::cast_possible_wrap)]
            pub const fn $unzigzag(value: $unsigned) -> $signed {
                ((value >> 1) as $signed) ^ (-((value & 1) as $signed))
            }
        )+
    };
}

zigzag! {
    i8 => u8, zigzag_i8, unzigzag_i8;
    i16 => u16, zigzag_i16, unzigzag_i16;
    i32 => u32, zigzag_i32, unzigzag_i32;
    i64 => u64, zigzag_i64, unzigzag_i64;
}

// =============================================================================
// Codec implementations
// =============================================================================

macro_rules! impl_unsigned {
    ($($ty:ty),+) => {
        $(
            impl Marshaler<$ty> for Varint<$ty> {
                fn marshal(
                    &self,
                    value: &$ty,
                    writer: &mut dyn Writer,
                    _session: &mut Session,
                ) -> Result<usize> {
                    write_unsigned(value.widen(), writer)
                }
            }

            impl Unmarshaler<$ty> for Varint<$ty> {
                fn unmarshal(
                    &self,
                    reader: &mut dyn Reader,
                    _session: &mut Session,
                ) -> Result<($ty, usize)> {
                    read_unsigned::<$ty>(reader)
                }
            }

            impl Sizer<$ty> for Varint<$ty> {
                fn size(&self, value: &$ty, _session: &mut Session) -> usize {
                    size_of(value.widen())
                }
            }

            impl Skipper for Varint<$ty> {
                fn skip(
                    &self,
                    reader: &mut dyn Reader,
                    _session: &mut Session,
                ) -> Result<usize> {
                    skip_unsigned::<$ty>(reader)
                }
            }
        )+
    };
}

impl_unsigned!(u8, u16, u32, u64, usize);

macro_rules! impl_signed {
    ($($signed:ty => $unsigned:ty, $zigzag:ident, $unzigzag:ident);+ $(;)?) => {
        $(
            impl Marshaler<$signed> for Varint<$signed> {
                fn marshal(
                    &self,
                    value: &$signed,
                    writer: &mut dyn Writer,
                    _session: &mut Session,
                ) -> Result<usize> {
                    write_unsigned($zigzag(*value).widen(), writer)
                }
            }

            impl Unmarshaler<$signed> for Varint<$signed> {
                fn unmarshal(
                    &self,
                    reader: &mut dyn Reader,
                    _session: &mut Session,
                ) -> Result<($signed, usize)> {
                    let (value, read) = read_unsigned::<$unsigned>(reader)?;
                    Ok(($unzigzag(value), read))
                }
            }

            impl Sizer<$signed> for Varint<$signed> {
                fn size(
                    &self,
                    value: &$signed,
                    _session: &mut Session,
                ) -> usize {
                    size_of($zigzag(*value).widen())
                }
            }

            impl Skipper for Varint<$signed> {
                fn skip(
                    &self,
                    reader: &mut dyn Reader,
                    _session: &mut Session,
                ) -> Result<usize> {
                    skip_unsigned::<$unsigned>(reader)
                }
            }

            impl Marshaler<$signed> for PositiveVarint<$signed> {
                #[allow(clippy::cast_sign_loss)]
                fn marshal(
                    &self,
                    value: &$signed,
                    writer: &mut dyn Writer,
                    _session: &mut Session,
                ) -> Result<usize> {
                    write_unsigned((*value as $unsigned).widen(), writer)
                }
            }

            impl Unmarshaler<$signed> for PositiveVarint<$signed> {
                #[allow(clippy::cast_possible_wrap)]
                fn unmarshal(
                    &self,
                    reader: &mut dyn Reader,
                    _session: &mut Session,
                ) -> Result<($signed, usize)> {
                    let (value, read) = read_unsigned::<$unsigned>(reader)?;
                    Ok((value as $signed, read))
                }
            }

            impl Sizer<$signed> for PositiveVarint<$signed> {
                #[allow(clippy::cast_sign_loss)]
                fn size(
                    &self,
                    value: &$signed,
                    _session: &mut Session,
                ) -> usize {
                    size_of((*value as $unsigned).widen())
                }
            }

            impl Skipper for PositiveVarint<$signed> {
                fn skip(
                    &self,
                    reader: &mut dyn Reader,
                    _session: &mut Session,
                ) -> Result<usize> {
                    skip_unsigned::<$unsigned>(reader)
                }
            }
        )+
    };
}

#[inline]
#[allow(clippy::cast_sign_loss)]
const fn zigzag_isize(value: isize) -> usize {
    zigzag_i64(value as i64) as usize
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn unzigzag_isize(value: usize) -> isize {
    unzigzag_i64(value as u64) as isize
}

impl_signed! {
    i8 => u8, zigzag_i8, unzigzag_i8;
    i16 => u16, zigzag_i16, unzigzag_i16;
    i32 => u32, zigzag_i32, unzigzag_i32;
    i64 => u64, zigzag_i64, unzigzag_i64;
    isize => usize, zigzag_isize, unzigzag_isize;
}

#[cfg(test)]
mod test;
