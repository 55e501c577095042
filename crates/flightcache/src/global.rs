//! A process-wide default cache.
//!
//! Values are stored as [`serde_json::Value`], so that unrelated call sites can share the
//! instance without agreeing on a common type. Code that wants its own typed cache should
//! construct a [`NamespaceCache`] instead.

use std::future::Future;
use std::sync::OnceLock;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::cache::{GetOptions, NamespaceCache};
use crate::error::CacheResult;

static GLOBAL_CACHE: OnceLock<NamespaceCache<Value>> = OnceLock::new();

/// Returns a handle to the process-wide cache.
pub fn cache() -> &'static NamespaceCache<Value> {
    GLOBAL_CACHE.get_or_init(|| NamespaceCache::new("global"))
}

/// Looks up `namespace` in the process-wide cache.
///
/// See [`NamespaceCache::get`].
pub fn get<F, Fut>(
    namespace: &str,
    options: GetOptions,
    compute: F,
) -> CacheResult<BoxFuture<'static, CacheResult<Value>>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    cache().get(namespace, options, compute)
}

/// Clears one or all namespaces of the process-wide cache.
///
/// See [`NamespaceCache::clear`].
pub fn clear(namespace: Option<&str>) {
    cache().clear(namespace)
}
