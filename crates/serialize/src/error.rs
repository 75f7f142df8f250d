//! Error types shared by every codec in the crate.
//!
//! Every failing operation reports an [`Error`] that carries two things: the
//! [`ErrorKind`] describing what went wrong, and the number of bytes that were
//! written or consumed before the failure. Callers that keep reading from the
//! same stream after an error use that count to decide how to resynchronize.

use std::{borrow::Cow, io};

/// The reason a [`Validator`](crate::validate::Validator) rejected a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation rejected: {reason}")]
pub struct ValidationError {
    reason: Cow<'static, str>,
}

impl ValidationError {
    /// Creates a rejection with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self { reason: reason.into() }
    }

    /// Returns the human readable reason of the rejection.
    #[must_use]
    pub fn reason(&self) -> &str { &self.reason }
}

/// Classification of a codec failure.
///
/// Only [`ErrorKind::Validation`] has a built-in recovery path; the other
/// kinds abort the current decode.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// A tag or discriminant byte was not in the expected set.
    #[error("wrong format: {0}")]
    WrongFormat(Cow<'static, str>),

    /// A decoded length was below zero.
    #[error("negative length: {0}")]
    NegativeLength(i64),

    /// A varint does not fit into the named target type.
    #[error("varint overflows {0}")]
    Overflow(&'static str),

    /// The value decoded fine but an application supplied validator rejected
    /// it.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The underlying stream failed.
    #[error("stream error: {0}")]
    Stream(#[from] io::Error),
}

/// A codec failure together with the byte count processed before it.
#[derive(Debug, thiserror::Error)]
#[error("{kind} (after {bytes} bytes)")]
pub struct Error {
    #[source]
    kind: ErrorKind,
    bytes: usize,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates an error of the given kind that occurred after `bytes` bytes.
    #[must_use]
    pub const fn new(kind: ErrorKind, bytes: usize) -> Self {
        Self { kind, bytes }
    }

    /// Returns what went wrong.
    #[must_use]
    pub const fn kind(&self) -> &ErrorKind { &self.kind }

    /// Consumes the error, returning its kind.
    #[must_use]
    pub fn into_kind(self) -> ErrorKind { self.kind }

    /// Returns the number of bytes written or consumed before the failure.
    #[must_use]
    pub const fn bytes(&self) -> usize { self.bytes }

    /// Accounts for `bytes` more bytes processed by an enclosing codec before
    /// it delegated to the operation that failed.
    ///
    /// Composite codecs call this on errors coming from nested codecs so the
    /// count they report covers everything from the start of their own
    /// encoding.
    #[must_use]
    pub fn offset_by(mut self, bytes: usize) -> Self {
        self.bytes += bytes;
        self
    }

    /// Returns `true` if this is a validator rejection.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self.kind, ErrorKind::Validation(_))
    }

    /// Returns `true` if this error reports a malformed encoding, as opposed
    /// to a stream failure or a validator rejection.
    #[must_use]
    pub const fn is_format(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::WrongFormat(_)
                | ErrorKind::NegativeLength(_)
                | ErrorKind::Overflow(_)
        )
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self { Self::new(kind, 0) }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self { Self::new(ErrorKind::Stream(error), 0) }
}

impl From<ValidationError> for Error {
    fn from(error: ValidationError) -> Self {
        Self::new(ErrorKind::Validation(error), 0)
    }
}

#[cold]
pub(crate) fn wrong_format(
    reason: impl Into<Cow<'static, str>>,
    bytes: usize,
) -> Error {
    Error::new(ErrorKind::WrongFormat(reason.into()), bytes)
}

#[cold]
pub(crate) const fn negative_length(length: i64, bytes: usize) -> Error {
    Error::new(ErrorKind::NegativeLength(length), bytes)
}

#[cold]
pub(crate) const fn overflow(type_name: &'static str, bytes: usize) -> Error {
    Error::new(ErrorKind::Overflow(type_name), bytes)
}

#[cold]
pub(crate) const fn rejected(error: ValidationError, bytes: usize) -> Error {
    Error::new(ErrorKind::Validation(error), bytes)
}
