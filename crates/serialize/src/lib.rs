//! Strand Serialization Library
//!
//! This crate provides composable codecs for a compact, streaming binary
//! format. Values are written to and read from any byte stream; no codec ever
//! seeks or rewinds.
//!
//! # Overview
//!
//! A codec is a value implementing up to four traits, one per operation:
//!
//! - [`Marshaler`]: writes a value and reports the bytes written
//! - [`Unmarshaler`]: reads a value and reports the bytes consumed
//! - [`Sizer`]: computes the encoded size without a stream
//! - [`Skipper`]: consumes one encoded value without building it
//!
//! A type implementing all four is a [`Serializer`]. Codecs compose by
//! holding other codecs:
//!
//! - [`Varint`] and [`PositiveVarint`]: LEB128 integers, zigzag for signed
//!   types
//! - [`SliceSerializer`], [`ArraySerializer`] and [`MapSerializer`]:
//!   length-prefixed collections with optional validation and recovery
//! - [`PointerSerializer`]: shared [`Ptr`] handles whose identity survives
//!   the round trip, cycles included
//! - [`Bool`], [`Raw`], [`StringSerializer`] and [`BytesSerializer`]: scalars
//!
//! Every operation receives the [`Session`] of the current top-level call,
//! which holds the pointer identity maps. [`Wrapper`] owns a session and
//! resets it after each call.
//!
//! # Errors
//!
//! Failures are reported as an [`Error`] carrying both what went wrong and
//! how many bytes were processed before it, so a caller reading a stream of
//! values knows where it stands after a failure.
//!
//! # Example
//!
//! ```ignore
//! struct Point { x: i32, y: i32 }
//!
//! fn marshal_point(
//!     point: &Point,
//!     writer: &mut dyn Writer,
//!     session: &mut Session,
//! ) -> Result<usize> {
//!     let coordinate = Varint::<i32>::new();
//!     let written = coordinate.marshal(&point.x, writer, session)?;
//!     let y = coordinate
//!         .marshal(&point.y, writer, session)
//!         .map_err(|e| e.offset_by(written))?;
//!     Ok(written + y)
//! }
//!
//! let points = SliceSerializer::new(MarshalFn(marshal_point));
//! let mut buffer = Vec::new();
//! let value = vec![Point { x: 1, y: -1 }];
//! points.marshal(&value, &mut buffer, &mut Session::new())?;
//! assert_eq!(buffer, [0x01, 0x02, 0x01]);
//! ```

pub mod collection;
pub mod config;
pub mod error;
pub mod pointer;
pub mod scalar;
pub mod serializer;
pub mod session;
pub mod stream;
pub mod validate;
pub mod varint;
pub mod wrapper;

// Re-export the main traits and codecs at the crate root for convenience
pub use collection::{ArraySerializer, MapSerializer, SliceSerializer};
pub use config::{Config, DefaultConfig};
pub use error::{Error, ErrorKind, Result, ValidationError};
pub use pointer::{PointerSerializer, Ptr};
pub use scalar::{Bool, BytesSerializer, Raw, StringSerializer};
pub use serializer::{
    Composite, MarshalFn, Marshaler, Serializer, SizeFn, Sizer, SkipFn,
    Skipper, UnmarshalFn, Unmarshaler, from_slice, to_vec,
};
pub use session::Session;
pub use stream::{Reader, Writer};
pub use validate::{MaxLength, Validator};
pub use varint::{PositiveVarint, Varint};
pub use wrapper::Wrapper;
