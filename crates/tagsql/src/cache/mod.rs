//! Module: cache
//! Responsibility: the tag identifier cache contract (`signature -> id`)
//! and its in-process and key-value-backed implementations.
//! Does not own: tag persistence. Entries are written strictly after the
//! store commits the tag row.

pub mod kv;
pub mod memory;

#[cfg(test)]
mod tests;

use crate::tag::{TagId, TagSignature};
use std::collections::HashMap;
use thiserror::Error as ThisError;

// re-exports
pub use kv::{KeyValueStore, KeyValueTagIdCache, MemoryKeyValueStore, StoreError};
pub use memory::MemoryTagIdCache;

///
/// CacheError
///
/// `NotFound` is the only kind callers treat as a query-level condition;
/// every other kind is an infrastructure fault.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CacheError {
    #[error("no tag id cached for '{signature}'")]
    NotFound { signature: TagSignature },

    #[error("tag id cache unavailable: {message}")]
    Unavailable { message: String },

    #[error("tag id cache has not been initialized")]
    NotReady,

    #[error("cache entry for '{key}' is not a tag id: '{value}'")]
    InvalidEntry { key: String, value: String },
}

impl CacheError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

///
/// TagIdCache
///
/// Capability for resolving tag signatures to persistent ids.
///
/// Implementations are shared across request handlers, so every method
/// takes `&self` and the trait requires `Send + Sync`.
///

pub trait TagIdCache: Send + Sync {
    /// Bulk-load entries and mark the cache ready. Entries merge into
    /// whatever is already cached.
    fn init(&self, entries: Vec<(TagSignature, TagId)>) -> Result<(), CacheError>;

    /// Resolve one signature.
    fn lookup(&self, signature: &TagSignature) -> Result<TagId, CacheError>;

    /// Resolve a batch. Absent signatures are missing from the result;
    /// infrastructure faults propagate.
    fn lookup_many(
        &self,
        signatures: &[TagSignature],
    ) -> Result<HashMap<TagSignature, TagId>, CacheError> {
        let mut resolved = HashMap::with_capacity(signatures.len());
        for signature in signatures {
            match self.lookup(signature) {
                Ok(id) => {
                    resolved.insert(signature.clone(), id);
                }
                Err(CacheError::NotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }

        Ok(resolved)
    }

    /// Record a newly created tag. Idempotent upsert, accepted before `init`.
    fn on_tag_created(&self, signature: TagSignature, id: TagId) -> Result<(), CacheError>;
}

impl<C: TagIdCache + ?Sized> TagIdCache for &C {
    fn init(&self, entries: Vec<(TagSignature, TagId)>) -> Result<(), CacheError> {
        (**self).init(entries)
    }

    fn lookup(&self, signature: &TagSignature) -> Result<TagId, CacheError> {
        (**self).lookup(signature)
    }

    fn lookup_many(
        &self,
        signatures: &[TagSignature],
    ) -> Result<HashMap<TagSignature, TagId>, CacheError> {
        (**self).lookup_many(signatures)
    }

    fn on_tag_created(&self, signature: TagSignature, id: TagId) -> Result<(), CacheError> {
        (**self).on_tag_created(signature, id)
    }
}
