//! Stateless helpers that are commonly used together with the cache.
//!
//! None of these are used by the cache itself. They are handy for deriving namespaces
//! ([`sha1`], [`random_bytes`]) and for combining configuration-like values ([`merge_deep`]).

#![warn(missing_docs)]

mod hash;
mod merge;

pub use hash::*;
pub use merge::*;
