use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flightcache::NamespaceCache;
use flightcache_test as test;

/// Setup tests and create a fresh cache.
pub fn setup_cache<T>() -> NamespaceCache<T> {
    test::setup();
    NamespaceCache::new("integration")
}

/// Counts how often computations created through it were invoked.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}
