//! Module: config
//! Responsibility: trusted table/column naming and dialect selection.
//! Boundary: every identifier that is written into SQL text comes from here
//! and is validated on load.

use serde::Deserialize;
use std::{fs, path::Path};
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid sql identifier for {field}: '{value}'")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("entity table must select at least one column")]
    NoEntityColumns,
}

///
/// Dialect
///
/// Target SQL dialect. Controls the positional placeholder form and the
/// store-specific spellings the renderer needs.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Function used for `ORDER BY` on the random sort key.
    #[must_use]
    pub const fn random_function(self) -> &'static str {
        match self {
            Self::Postgres | Self::Sqlite => "RANDOM()",
        }
    }

    /// Case-insensitive pattern match operator.
    #[must_use]
    pub const fn case_insensitive_like(self) -> &'static str {
        match self {
            Self::Postgres => "ILIKE",
            // sqlite LIKE is already case-insensitive for ASCII
            Self::Sqlite => "LIKE",
        }
    }

    /// Positional placeholder for the 1-based parameter `index`.
    #[must_use]
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${index}"),
            Self::Sqlite => format!("?{index}"),
        }
    }
}

///
/// TagSqlConfig
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TagSqlConfig {
    pub dialect: Dialect,
    pub entity: EntityTableConfig,
    pub tags: TagTableConfig,
    pub association: AssociationTableConfig,
    pub cache: CacheConfig,
}

impl TagSqlConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;

        Self::from_toml_str(&source)
    }

    /// Check every identifier that will be written into SQL text.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_identifier("entity.table", &self.entity.table)?;
        check_identifier("entity.id_column", &self.entity.id_column)?;
        check_identifier("entity.created_column", &self.entity.created_column)?;
        if self.entity.columns.is_empty() {
            return Err(ConfigError::NoEntityColumns);
        }
        for column in &self.entity.columns {
            check_identifier("entity.columns", column)?;
        }

        check_identifier("tags.table", &self.tags.table)?;
        check_identifier("association.table", &self.association.table)?;
        check_identifier("association.entity_column", &self.association.entity_column)?;
        check_identifier("association.tag_column", &self.association.tag_column)?;

        Ok(())
    }
}

///
/// EntityTableConfig
///
/// The taggable entity table. `created_column` drives creation-order sorts.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EntityTableConfig {
    pub table: String,
    pub id_column: String,
    pub created_column: String,
    pub columns: Vec<String>,
}

impl Default for EntityTableConfig {
    fn default() -> Self {
        Self {
            table: "documents".to_string(),
            id_column: "id".to_string(),
            created_column: "created_at".to_string(),
            columns: vec!["id".to_string()],
        }
    }
}

///
/// TagTableConfig
///
/// Columns are fixed: `id`, `key`, `value`, `type`.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TagTableConfig {
    pub table: String,
}

impl Default for TagTableConfig {
    fn default() -> Self {
        Self {
            table: "tags".to_string(),
        }
    }
}

///
/// AssociationTableConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AssociationTableConfig {
    pub table: String,
    pub entity_column: String,
    pub tag_column: String,
}

impl Default for AssociationTableConfig {
    fn default() -> Self {
        Self {
            table: "entity_tags".to_string(),
            entity_column: "entity_id".to_string(),
            tag_column: "tag_id".to_string(),
        }
    }
}

///
/// CacheConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Prefix for key-value cache entries: `<prefix><signature>`.
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: "tag:".to_string(),
        }
    }
}

// Identifiers are plain or schema-qualified names; nothing else is allowed
// into SQL text from configuration.
fn check_identifier(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let valid = !value.is_empty()
        && value.split('.').all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            field,
            value: value.to_string(),
        })
    }
}

///
/// TESTS
///
