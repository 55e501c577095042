//! An in-memory, namespace keyed cache for asynchronous computations.
//!
//! The [`NamespaceCache`] does request coalescing ("single-flight"): while a value for a
//! namespace is being computed, every other request for the same namespace waits for that
//! computation instead of starting its own. Successful results are kept until they are
//! explicitly cleared.
//!
//! ```
//! use flightcache::{GetOptions, NamespaceCache};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), flightcache::CacheError> {
//! let cache = NamespaceCache::new("example");
//!
//! let value = cache.get("foo", GetOptions::default(), || async { Ok(1) })?.await?;
//! assert_eq!(value, 1);
//!
//! // served from the cache, the computation is not invoked
//! let value = cache.get("foo", GetOptions::default(), || async { Ok(2) })?.await?;
//! assert_eq!(value, 1);
//!
//! cache.clear(Some("foo"));
//! let value = cache.get("foo", GetOptions::default(), || async { Ok(2) })?.await?;
//! assert_eq!(value, 2);
//! # Ok(())
//! # }
//! ```

#[macro_use]
pub mod metrics;

mod cache;
pub mod config;
mod error;
pub mod global;
pub mod logging;
mod namespace;

pub use cache::{GetOptions, NamespaceCache};
pub use error::{CacheError, CacheResult};
pub use namespace::Namespace;
