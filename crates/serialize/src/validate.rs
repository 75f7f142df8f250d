//! Application supplied checks applied to decoded values.
//!
//! A [`Validator`] is a pure predicate: it never consumes stream bytes and
//! never mutates the value. Codecs that accept validators (collections,
//! strings, byte strings) run them right after the checked part is decoded,
//! and can recover from a rejection by skipping the rest of the encoding so
//! the stream stays positioned at the next value.
//!
//! Any closure of the right shape is a validator:
//!
//! ```ignore
//! use strand_serialize::error::ValidationError;
//!
//! let even = |value: &u32| {
//!     if value % 2 == 0 {
//!         Ok(())
//!     } else {
//!         Err(ValidationError::new("odd value"))
//!     }
//! };
//! ```

use crate::error::ValidationError;

/// Accepts or rejects values of type `T`.
pub trait Validator<T: ?Sized> {
    /// Checks `value`.
    ///
    /// # Errors
    ///
    /// Returns the reason `value` is rejected.
    fn validate(&self, value: &T) -> Result<(), ValidationError>;
}

impl<T: ?Sized, F> Validator<T> for F
where
    F: Fn(&T) -> Result<(), ValidationError>,
{
    fn validate(&self, value: &T) -> Result<(), ValidationError> {
        self(value)
    }
}

/// Rejects lengths above a maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaxLength(pub usize);

impl Validator<usize> for MaxLength {
    fn validate(&self, value: &usize) -> Result<(), ValidationError> {
        if *value > self.0 {
            return Err(ValidationError::new(format!(
                "length {value} exceeds the maximum of {}",
                self.0
            )));
        }
        Ok(())
    }
}
