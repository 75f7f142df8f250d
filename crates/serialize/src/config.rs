//! Configuration for decoding limits and identity map sizing.
//!
//! The [`Config`] trait groups the few knobs a [`Session`] reads when it is
//! created. Every method has a default, so a custom configuration only
//! overrides what it needs:
//!
//! ```ignore
//! use strand_serialize::{config::Config, wrapper::Wrapper};
//!
//! struct Tight;
//!
//! impl Config for Tight {
//!     // Never reserve room for more than 64 elements up front.
//!     fn preallocation_limit() -> usize { 64 }
//! }
//!
//! let wrapper = Wrapper::with_config::<Tight>(serializer);
//! ```
//!
//! [`Session`]: crate::session::Session

/// Tuning parameters of a [`Session`](crate::session::Session).
///
/// None of these change the wire format; they only bound the resources spent
/// before the encoded data has proven itself.
pub trait Config {
    /// The maximum number of elements reserved for a decoded collection
    /// before any element has actually been read.
    ///
    /// A length prefix is untrusted input. Collections grow past this limit
    /// normally as elements are decoded, so a hostile length costs at most
    /// this much memory until the stream runs dry.
    ///
    /// # Default Value
    ///
    /// 4096 elements.
    #[must_use]
    fn preallocation_limit() -> usize { 4096 }

    /// The initial capacity of the pointer identity maps.
    ///
    /// Raise this when every top-level value is known to contain many shared
    /// pointers.
    ///
    /// # Default Value
    ///
    /// 0, the maps allocate on first use.
    #[must_use]
    fn pointer_map_capacity() -> usize { 0 }
}

/// The configuration used by [`Session::new`](crate::session::Session::new).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DefaultConfig;

impl Config for DefaultConfig {}
