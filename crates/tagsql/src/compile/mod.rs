//! Module: compile
//! Responsibility: filter trees and tag operations to statement models.
//! Does not own: rendering, binding, or execution.
//!
//! Compilation is stateless: every call returns its predicate, sort and
//! parameters by value. Signature resolution happens once per compile,
//! before the fold, with a single `lookup_many`.

mod predicate;


use crate::{
    TOTAL_COLUMN,
    cache::TagIdCache,
    config::TagSqlConfig,
    db::response::PageSpec,
    error::Error,
    filter::Filter,
    sql::{
        Bound, DeleteStatement, InsertStatement, Join, JoinKind, NullsOrder, OnConflict, Params,
        SelectStatement, SortDirection, SortField, SortKey, Statement,
    },
    tag::{NewTag, Tag, TagId, TagSignature},
};
use predicate::{PredicateFold, collect_signatures, validate_tag};
use std::collections::{HashMap, HashSet};
use thiserror::Error as ThisError;

///
/// CompileError
///
/// The filter or tag cannot be turned into a statement. Always the
/// caller's fault; never retried.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CompileError {
    #[error("unknown tag '{signature}'")]
    UnknownTag { signature: TagSignature },

    #[error("invalid tag '{key}': {reason}")]
    InvalidTag { key: String, reason: &'static str },
}

///
/// SortBy
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SortBy {
    #[default]
    CreationOrder,
    Random,
}

///
/// SortSpec
///
/// Ordering selected by `sort:*` directives. Newest first by default.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SortSpec {
    pub by: SortBy,
    pub direction: SortDirection,
}

impl SortSpec {
    #[must_use]
    pub const fn new(by: SortBy, direction: SortDirection) -> Self {
        Self { by, direction }
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::new(SortBy::CreationOrder, SortDirection::Desc)
    }
}

///
/// CompileStats
///
/// Resolution counters for one compile.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CompileStats {
    /// Distinct signatures the filter references.
    pub signatures: usize,
    /// Signatures the cache resolved.
    pub resolved: usize,
    /// Distinct bare keys compiled to a family existence test.
    pub family_fallbacks: usize,
}

///
/// CompileResult
///

#[derive(Clone, Debug, PartialEq)]
pub struct CompileResult {
    pub predicate: String,
    pub sort: SortSpec,
    pub params: Params,
    pub stats: CompileStats,
}

///
/// CompiledStatement
///
/// A statement model plus the named parameters its placeholders expect.
///

#[derive(Clone, Debug, PartialEq)]
pub struct CompiledStatement {
    pub statement: Statement,
    pub params: Params,
}

impl CompiledStatement {
    pub fn new(statement: impl Into<Statement>, params: Params) -> Self {
        Self {
            statement: statement.into(),
            params,
        }
    }
}

///
/// TagSqlCompiler
///
/// Builds statement models against the configured schema. Holds only
/// configuration; safe to share.
///

#[derive(Clone, Debug, Default)]
pub struct TagSqlCompiler {
    config: TagSqlConfig,
}

impl TagSqlCompiler {
    #[must_use]
    pub const fn new(config: TagSqlConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &TagSqlConfig {
        &self.config
    }

    ///
    /// FILTERS
    ///

    /// Compile a filter tree into a HAVING predicate and sort spec.
    ///
    /// Every referenced signature is resolved with one `lookup_many`.
    /// A tree with no tag leaves never touches the cache.
    pub fn compile_filter<C: TagIdCache + ?Sized>(
        &self,
        filter: &Filter,
        cache: &C,
    ) -> Result<CompileResult, Error> {
        let signatures = collect_signatures(filter)?;
        let resolved = if signatures.is_empty() {
            HashMap::new()
        } else {
            cache.lookup_many(&signatures)?
        };

        let mut fold = PredicateFold::new(&self.config, &resolved);
        let predicate = fold.fold(filter)?;
        let stats = CompileStats {
            signatures: signatures.len(),
            resolved: resolved.len(),
            family_fallbacks: fold.family_count(),
        };

        tracing::debug!(
            predicate = %predicate,
            sort = ?fold.sort,
            signatures = stats.signatures,
            family_fallbacks = stats.family_fallbacks,
            "compiled filter"
        );

        Ok(CompileResult {
            predicate,
            sort: fold.sort,
            params: fold.params,
            stats,
        })
    }

    /// Compile a filter into the paginated entity listing.
    pub fn compile_list_query<C: TagIdCache + ?Sized>(
        &self,
        filter: &Filter,
        page: PageSpec,
        cache: &C,
    ) -> Result<CompiledStatement, Error> {
        let compiled = self.compile_filter(filter, cache)?;

        Ok(self.list_query(compiled, page))
    }

    /// Wrap an already compiled filter in the entity listing statement.
    #[must_use]
    pub fn list_query(&self, compiled: CompileResult, page: PageSpec) -> CompiledStatement {
        let entity = &self.config.entity;
        let assoc = &self.config.association;

        let mut select = entity
            .columns
            .iter()
            .map(|column| format!("e.{column}"))
            .collect::<Vec<_>>();
        select.push(total_column());

        let statement = SelectStatement {
            select,
            from: format!("{} e", entity.table),
            joins: vec![Join {
                kind: JoinKind::Left,
                table: format!("{} et", assoc.table),
                on: format!("e.{} = et.{}", entity.id_column, assoc.entity_column),
            }],
            where_clause: None,
            group_by: Some(format!("e.{}", entity.id_column)),
            having: Some(compiled.predicate),
            sort: self.sort_fields(compiled.sort),
            limit: Some(Bound::Param("limit".to_string())),
            offset: Some(Bound::Param("offset".to_string())),
        };

        let mut params = compiled.params;
        params.set("limit", page.limit);
        params.set("offset", page.offset);

        CompiledStatement::new(statement, params)
    }

    // Creation order breaks ties on the id so pages never overlap.
    fn sort_fields(&self, sort: SortSpec) -> Vec<SortField> {
        let entity = &self.config.entity;

        match sort.by {
            SortBy::Random => vec![SortField {
                key: SortKey::Random,
                direction: None,
                nulls: None,
            }],
            SortBy::CreationOrder => vec![
                SortField {
                    key: SortKey::Column(format!("e.{}", entity.created_column)),
                    direction: Some(sort.direction),
                    nulls: None,
                },
                SortField {
                    key: SortKey::Column(format!("e.{}", entity.id_column)),
                    direction: Some(sort.direction),
                    nulls: None,
                },
            ],
        }
    }

    ///
    /// TAG LISTINGS
    ///

    /// Paginated tag search with usage counts.
    ///
    /// A bare query matches keys by substring. A valued query matches the
    /// key exactly and the value by substring. Matching is case-insensitive
    /// and `%`, `_` and `\` in the input match literally.
    #[must_use]
    pub fn compile_tags_query(&self, query: &Tag, page: PageSpec) -> CompiledStatement {
        let assoc = &self.config.association;
        let like = self.config.dialect.case_insensitive_like();

        let mut params = Params::new();
        let where_clause = match &query.value {
            None => {
                params.set("key_pattern", contains_pattern(&query.key));
                format!("t.key {like} $key_pattern ESCAPE '\\'")
            }
            Some(value) => {
                params.set("tag_key", query.key.as_str());
                params.set("value_pattern", contains_pattern(value));
                format!("t.key = $tag_key AND t.value {like} $value_pattern ESCAPE '\\'")
            }
        };
        params.set("limit", page.limit);
        params.set("offset", page.offset);

        let mut select = tag_columns();
        select.push(format!("COUNT(et.{}) AS usage_count", assoc.entity_column));
        select.push(total_column());

        let statement = SelectStatement {
            select,
            from: format!("{} t", self.config.tags.table),
            joins: vec![Join {
                kind: JoinKind::Left,
                table: format!("{} et", assoc.table),
                on: format!("t.id = et.{}", assoc.tag_column),
            }],
            where_clause: Some(where_clause),
            group_by: Some("t.id".to_string()),
            having: None,
            sort: vec![
                column_sort("usage_count", SortDirection::Desc, None),
                column_sort("t.key", SortDirection::Asc, None),
                column_sort("t.value", SortDirection::Asc, Some(NullsOrder::First)),
            ],
            limit: Some(Bound::Param("limit".to_string())),
            offset: Some(Bound::Param("offset".to_string())),
        };

        CompiledStatement::new(statement, params)
    }

    /// Tags attached to one entity, each with its global usage count.
    #[must_use]
    pub fn compile_entity_tags_query(&self, entity_id: i64) -> CompiledStatement {
        let assoc = &self.config.association;

        let mut select = tag_columns();
        select.push(format!("COUNT(uc.{}) AS usage_count", assoc.entity_column));

        let statement = SelectStatement {
            select,
            from: format!("{} t", self.config.tags.table),
            joins: vec![
                Join {
                    kind: JoinKind::Inner,
                    table: format!("{} et", assoc.table),
                    on: format!("t.id = et.{}", assoc.tag_column),
                },
                Join {
                    kind: JoinKind::Left,
                    table: format!("{} uc", assoc.table),
                    on: format!("t.id = uc.{}", assoc.tag_column),
                },
            ],
            where_clause: Some(format!("et.{} = $entity_id", assoc.entity_column)),
            group_by: Some("t.id".to_string()),
            having: None,
            sort: vec![
                column_sort("t.key", SortDirection::Asc, None),
                column_sort("t.value", SortDirection::Asc, Some(NullsOrder::First)),
            ],
            limit: None,
            offset: None,
        };

        CompiledStatement::new(statement, Params::new().with("entity_id", entity_id))
    }

    /// Every tag record in id order; feeds cache warm-up.
    #[must_use]
    pub fn compile_enumerate_tags(&self) -> CompiledStatement {
        let statement = SelectStatement {
            select: tag_columns(),
            from: format!("{} t", self.config.tags.table),
            sort: vec![column_sort("t.id", SortDirection::Asc, None)],
            ..SelectStatement::default()
        };

        CompiledStatement::new(statement, Params::new())
    }

    ///
    /// ASSOCIATIONS
    ///

    /// Attach a known tag to an entity. Re-adding is a no-op.
    pub fn compile_add_tag<C: TagIdCache + ?Sized>(
        &self,
        entity_id: i64,
        tag: &Tag,
        cache: &C,
    ) -> Result<CompiledStatement, Error> {
        let id = resolve_one(tag, cache)?;
        let assoc = &self.config.association;

        let statement = InsertStatement {
            table: assoc.table.clone(),
            columns: vec![assoc.entity_column.clone(), assoc.tag_column.clone()],
            rows: vec![vec!["$entity_id".to_string(), id.to_string()]],
            on_conflict: Some(OnConflict::DoNothing),
            returning: Vec::new(),
        };

        Ok(CompiledStatement::new(
            statement,
            Params::new().with("entity_id", entity_id),
        ))
    }

    /// Detach a known tag from an entity. Removing an absent pair
    /// deletes nothing.
    pub fn compile_remove_tag<C: TagIdCache + ?Sized>(
        &self,
        entity_id: i64,
        tag: &Tag,
        cache: &C,
    ) -> Result<CompiledStatement, Error> {
        let id = resolve_one(tag, cache)?;
        let assoc = &self.config.association;

        let statement = DeleteStatement {
            table: assoc.table.clone(),
            where_clause: Some(format!(
                "{} = $entity_id AND {} = {id}",
                assoc.entity_column, assoc.tag_column
            )),
        };

        Ok(CompiledStatement::new(
            statement,
            Params::new().with("entity_id", entity_id),
        ))
    }

    ///
    /// TAG CREATION
    ///

    /// Multi-row insert of new tag records returning only the rows the
    /// store actually created. Repeated signatures in `tags` are inserted
    /// once. `None` when there is nothing to insert.
    pub fn compile_create_tags(
        &self,
        tags: &[NewTag],
    ) -> Result<Option<CompiledStatement>, CompileError> {
        let mut seen = HashSet::new();
        let mut params = Params::new();
        let mut rows = Vec::with_capacity(tags.len());

        for new in tags {
            validate_tag(&new.tag)?;
            if !seen.insert(new.tag.signature()) {
                continue;
            }

            let index = rows.len();
            params.set(format!("key_{index}"), new.tag.key.as_str());
            params.set(format!("value_{index}"), new.tag.value.clone());
            params.set(format!("type_{index}"), new.tag_type.as_str());
            rows.push(vec![
                format!("$key_{index}"),
                format!("$value_{index}"),
                format!("$type_{index}"),
            ]);
        }

        if rows.is_empty() {
            return Ok(None);
        }

        let statement = InsertStatement {
            table: self.config.tags.table.clone(),
            columns: vec!["key".to_string(), "value".to_string(), "type".to_string()],
            rows,
            on_conflict: Some(OnConflict::DoNothing),
            returning: ["id", "key", "value", "type"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        };

        Ok(Some(CompiledStatement::new(statement, params)))
    }
}

fn resolve_one<C: TagIdCache + ?Sized>(tag: &Tag, cache: &C) -> Result<TagId, Error> {
    validate_tag(tag)?;

    Ok(cache.lookup(&tag.signature())?)
}

fn tag_columns() -> Vec<String> {
    ["t.id", "t.key", "t.value", "t.type"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn total_column() -> String {
    format!("COUNT(*) OVER() AS {TOTAL_COLUMN}")
}

fn column_sort(column: &str, direction: SortDirection, nulls: Option<NullsOrder>) -> SortField {
    SortField {
        key: SortKey::Column(column.to_string()),
        direction: Some(direction),
        nulls,
    }
}

/// `%<input>%` with LIKE metacharacters escaped by `\`.
#[must_use]
pub fn contains_pattern(input: &str) -> String {
    let mut pattern = String::with_capacity(input.len() + 2);
    pattern.push('%');
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');

    pattern
}
