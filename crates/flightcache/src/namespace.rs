use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use crate::error::CacheError;

/// The key of a single cache slot.
///
/// A namespace is always a non-empty string. Cloning is cheap.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Namespace(Arc<str>);

impl Namespace {
    pub(crate) const INVALID: &'static str = "expected namespace to be a non-empty string";

    /// Validates `namespace` and wraps it.
    pub fn new(namespace: &str) -> Result<Self, CacheError> {
        if namespace.is_empty() {
            return Err(CacheError::InvalidArgument(Self::INVALID));
        }
        Ok(Self(namespace.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Namespace {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Namespace {
    type Error = CacheError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
