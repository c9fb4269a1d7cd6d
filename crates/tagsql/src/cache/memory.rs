use crate::{
    cache::{CacheError, TagIdCache},
    tag::{TagId, TagSignature},
};
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

///
/// MemoryTagIdCache
///
/// In-process cache for single-node deployments and tests.
/// Writes are accepted at any time; lookups wait for the first `init`.
///

#[derive(Debug, Default)]
pub struct MemoryTagIdCache {
    entries: RwLock<HashMap<TagSignature, TagId>>,
    ready: AtomicBool,
}

impl MemoryTagIdCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_ready(&self) -> Result<(), CacheError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(CacheError::NotReady)
        }
    }
}

impl TagIdCache for MemoryTagIdCache {
    // merges; tags are immutable and never deleted
    fn init(&self, entries: Vec<(TagSignature, TagId)>) -> Result<(), CacheError> {
        self.entries.write().extend(entries);
        self.ready.store(true, Ordering::Release);

        Ok(())
    }

    fn lookup(&self, signature: &TagSignature) -> Result<TagId, CacheError> {
        self.ensure_ready()?;

        self.entries
            .read()
            .get(signature)
            .copied()
            .ok_or_else(|| CacheError::NotFound {
                signature: signature.clone(),
            })
    }

    fn lookup_many(
        &self,
        signatures: &[TagSignature],
    ) -> Result<HashMap<TagSignature, TagId>, CacheError> {
        self.ensure_ready()?;
        let entries = self.entries.read();

        Ok(signatures
            .iter()
            .filter_map(|signature| entries.get(signature).map(|id| (signature.clone(), *id)))
            .collect())
    }

    fn on_tag_created(&self, signature: TagSignature, id: TagId) -> Result<(), CacheError> {
        self.entries.write().insert(signature, id);

        Ok(())
    }
}
