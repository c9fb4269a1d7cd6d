//! Module: tag
//! Responsibility: tag identity vocabulary shared by the cache, compiler and repository.
//! Does not own: tag persistence or id allocation.

use crate::db::executor::{FromRow, Row, RowDecodeError};
use derive_more::{Deref, Display, From};
use serde::{Deserialize, Serialize};

///
/// TagSignature
///
/// Canonical string identity of a tag: `key` for bare tags, `key:value`
/// for meta tags. Two tags are the same iff their signatures are equal.
///

#[derive(Clone, Debug, Deref, Display, Eq, From, Hash, Ord, PartialEq, PartialOrd)]
pub struct TagSignature(String);

impl TagSignature {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TagSignature {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

///
/// TagId
///
/// Persistent numeric tag identifier assigned by the primary store.
///

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, From, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct TagId(pub i64);

impl TagId {
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

///
/// TagType
///
/// Namespace classifier distinguishing user tags from system-generated ones.
/// Orthogonal to filtering.
///

#[derive(Clone, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
pub struct TagType(String);

impl TagType {
    pub const DEFAULT: &'static str = "default";
    pub const META: &'static str = "meta";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn meta() -> Self {
        Self::new(Self::META)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TagType {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

///
/// Tag
///
/// A bare (`key`) or valued (`key:value`) tag as referenced by callers.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Tag {
    pub key: String,
    pub value: Option<String>,
}

impl Tag {
    pub fn bare(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn meta(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Normalize raw user text into a tag.
    ///
    /// Splits on the first `:` and trims both halves. An empty value after
    /// trimming yields a bare tag; any further `:` stays inside the value.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((key, value)) => {
                let value = value.trim();
                Self {
                    key: key.trim().to_string(),
                    value: (!value.is_empty()).then(|| value.to_string()),
                }
            }
            None => Self::bare(raw.trim()),
        }
    }

    #[must_use]
    pub fn signature(&self) -> TagSignature {
        match &self.value {
            Some(value) => TagSignature(format!("{}:{value}", self.key)),
            None => TagSignature(self.key.clone()),
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.signature())
    }
}

///
/// NewTag
///
/// A tag plus the classifier to persist it with.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewTag {
    pub tag: Tag,
    pub tag_type: TagType,
}

impl NewTag {
    #[must_use]
    pub fn new(tag: Tag, tag_type: TagType) -> Self {
        Self { tag, tag_type }
    }
}

impl From<Tag> for NewTag {
    fn from(tag: Tag) -> Self {
        Self::new(tag, TagType::default())
    }
}

///
/// TagRecord
///
/// Persisted tag row. Immutable once created.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TagRecord {
    pub id: TagId,
    pub key: String,
    pub value: Option<String>,
    pub tag_type: TagType,
}

impl TagRecord {
    #[must_use]
    pub fn tag(&self) -> Tag {
        Tag {
            key: self.key.clone(),
            value: self.value.clone(),
        }
    }

    #[must_use]
    pub fn signature(&self) -> TagSignature {
        self.tag().signature()
    }
}

impl FromRow for TagRecord {
    fn from_row(row: &Row) -> Result<Self, RowDecodeError> {
        Ok(Self {
            id: TagId(row.try_get("id")?),
            key: row.try_get("key")?,
            value: row.try_get("value")?,
            tag_type: TagType::new(row.try_get::<String>("type")?),
        })
    }
}

///
/// TagWithCount
///
/// Tag record plus the number of entities it is attached to.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TagWithCount {
    pub record: TagRecord,
    pub usage_count: i64,
}

impl FromRow for TagWithCount {
    fn from_row(row: &Row) -> Result<Self, RowDecodeError> {
        Ok(Self {
            record: TagRecord::from_row(row)?,
            usage_count: row.try_get("usage_count")?,
        })
    }
}

///
/// TESTS
///
