use crate::{
    cache::{CacheError, TagIdCache},
    config::CacheConfig,
    tag::{TagId, TagSignature},
};
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};
use thiserror::Error as ThisError;

///
/// StoreError
///
/// The key-value store could not be reached or refused the operation.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        Self::Unavailable {
            message: err.message,
        }
    }
}

///
/// KeyValueStore
///
/// Minimal string key-value seam for a networked store.
/// `get_many` returns one slot per requested key, in request order.
///

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    fn set(&self, key: String, value: String) -> Result<(), StoreError>;

    fn set_many(&self, entries: Vec<(String, String)>) -> Result<(), StoreError> {
        entries
            .into_iter()
            .try_for_each(|(key, value)| self.set(key, value))
    }
}

///
/// MemoryKeyValueStore
///

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        let entries = self.entries.read();

        Ok(keys.iter().map(|key| entries.get(key).cloned()).collect())
    }

    fn set(&self, key: String, value: String) -> Result<(), StoreError> {
        self.entries.write().insert(key, value);

        Ok(())
    }

    fn set_many(&self, entries: Vec<(String, String)>) -> Result<(), StoreError> {
        self.entries.write().extend(entries);

        Ok(())
    }
}

///
/// KeyValueTagIdCache
///
/// Stores `"<prefix><signature>" -> "<decimal id>"` in a shared store.
/// Every lookup goes to the store; there is no in-process layer.
/// Writes are accepted before `init` since the store outlives this process.
///

#[derive(Debug)]
pub struct KeyValueTagIdCache<S: KeyValueStore> {
    store: S,
    prefix: String,
    ready: AtomicBool,
}

impl<S: KeyValueStore> KeyValueTagIdCache<S> {
    pub fn new(store: S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            ready: AtomicBool::new(false),
        }
    }

    pub fn from_config(store: S, config: &CacheConfig) -> Self {
        Self::new(store, config.key_prefix.clone())
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn entry_key(&self, signature: &TagSignature) -> String {
        format!("{}{signature}", self.prefix)
    }

    fn ensure_ready(&self) -> Result<(), CacheError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(CacheError::NotReady)
        }
    }
}

impl<S: KeyValueStore> TagIdCache for KeyValueTagIdCache<S> {
    fn init(&self, entries: Vec<(TagSignature, TagId)>) -> Result<(), CacheError> {
        let entries = entries
            .into_iter()
            .map(|(signature, id)| (self.entry_key(&signature), id.to_string()))
            .collect::<Vec<_>>();

        if !entries.is_empty() {
            self.store.set_many(entries)?;
        }
        self.ready.store(true, Ordering::Release);

        Ok(())
    }

    fn lookup(&self, signature: &TagSignature) -> Result<TagId, CacheError> {
        self.ensure_ready()?;

        let key = self.entry_key(signature);
        match self.store.get(&key)? {
            Some(value) => parse_id(key, value),
            None => Err(CacheError::NotFound {
                signature: signature.clone(),
            }),
        }
    }

    fn lookup_many(
        &self,
        signatures: &[TagSignature],
    ) -> Result<HashMap<TagSignature, TagId>, CacheError> {
        self.ensure_ready()?;
        if signatures.is_empty() {
            return Ok(HashMap::new());
        }

        let keys = signatures
            .iter()
            .map(|signature| self.entry_key(signature))
            .collect::<Vec<_>>();
        let values = self.store.get_many(&keys)?;
        if values.len() != keys.len() {
            return Err(CacheError::Unavailable {
                message: format!(
                    "store answered {} of {} keys",
                    values.len(),
                    keys.len()
                ),
            });
        }

        let mut resolved = HashMap::with_capacity(signatures.len());
        for ((signature, key), value) in signatures.iter().zip(keys).zip(values) {
            if let Some(value) = value {
                resolved.insert(signature.clone(), parse_id(key, value)?);
            }
        }

        Ok(resolved)
    }

    fn on_tag_created(&self, signature: TagSignature, id: TagId) -> Result<(), CacheError> {
        self.store
            .set(self.entry_key(&signature), id.to_string())
            .map_err(CacheError::from)
    }
}

fn parse_id(key: String, value: String) -> Result<TagId, CacheError> {
    value
        .parse::<i64>()
        .map(TagId)
        .map_err(|_| CacheError::InvalidEntry { key, value })
}
