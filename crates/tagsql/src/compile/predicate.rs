//! Filter folding: signature collection and the predicate fold.

use crate::{
    compile::{CompileError, SortBy, SortSpec},
    config::TagSqlConfig,
    filter::Filter,
    sql::{Params, SortDirection},
    tag::{Tag, TagId, TagSignature},
};
use std::collections::{HashMap, HashSet};

/// Prefix of the parameters carrying family-fallback keys.
pub(crate) const FAMILY_PARAM_PREFIX: &str = "family_";

const TAUTOLOGY: &str = "1=1";

/// Reject keys that cannot round-trip through a signature.
pub(crate) fn validate_key(key: &str) -> Result<(), CompileError> {
    let reason = if key.is_empty() {
        "key is empty"
    } else if key.contains(':') {
        "key contains ':'"
    } else {
        return Ok(());
    };

    Err(CompileError::InvalidTag {
        key: key.to_string(),
        reason,
    })
}

/// Reject tags with an invalid key or an empty value.
pub(crate) fn validate_tag(tag: &Tag) -> Result<(), CompileError> {
    validate_key(&tag.key)?;
    if tag.value.as_deref().is_some_and(str::is_empty) {
        return Err(CompileError::InvalidTag {
            key: tag.key.clone(),
            reason: "value is empty",
        });
    }

    Ok(())
}

/// Validate the tree and collect every signature it references,
/// deduplicated in first-visit order. Sort directives are skipped.
pub(crate) fn collect_signatures(filter: &Filter) -> Result<Vec<TagSignature>, CompileError> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    collect(filter, &mut seen, &mut out)?;

    Ok(out)
}

fn collect(
    filter: &Filter,
    seen: &mut HashSet<TagSignature>,
    out: &mut Vec<TagSignature>,
) -> Result<(), CompileError> {
    match filter {
        Filter::True => {}
        Filter::Tag { key } => {
            let tag = Tag::bare(key.as_str());
            validate_tag(&tag)?;
            push_unique(tag.signature(), seen, out);
        }
        Filter::MetaTag { .. } if filter.is_sort_directive() => {}
        Filter::MetaTag { key, value } => {
            let tag = Tag::meta(key.as_str(), value.as_str());
            validate_tag(&tag)?;
            push_unique(tag.signature(), seen, out);
        }
        Filter::And(left, right) | Filter::Or(left, right) => {
            collect(left, seen, out)?;
            collect(right, seen, out)?;
        }
        Filter::Not(inner) => collect(inner, seen, out)?,
    }

    Ok(())
}

fn push_unique(
    signature: TagSignature,
    seen: &mut HashSet<TagSignature>,
    out: &mut Vec<TagSignature>,
) {
    if seen.insert(signature.clone()) {
        out.push(signature);
    }
}

///
/// PredicateFold
///
/// Single-pass fold of a validated tree into a HAVING predicate.
/// Owns everything the fold produces; nothing survives between compiles.
///

pub(crate) struct PredicateFold<'a> {
    config: &'a TagSqlConfig,
    resolved: &'a HashMap<TagSignature, TagId>,
    pub(crate) params: Params,
    pub(crate) sort: SortSpec,
    families: Vec<String>,
}

impl<'a> PredicateFold<'a> {
    pub(crate) fn new(
        config: &'a TagSqlConfig,
        resolved: &'a HashMap<TagSignature, TagId>,
    ) -> Self {
        Self {
            config,
            resolved,
            params: Params::new(),
            sort: SortSpec::default(),
            families: Vec::new(),
        }
    }

    /// Number of distinct family-fallback keys emitted so far.
    pub(crate) const fn family_count(&self) -> usize {
        self.families.len()
    }

    pub(crate) fn fold(&mut self, filter: &Filter) -> Result<String, CompileError> {
        match filter {
            Filter::True => Ok(tautology()),
            Filter::Tag { key } => {
                let signature = Tag::bare(key.as_str()).signature();
                Ok(match self.resolved.get(&signature) {
                    Some(id) => self.tag_condition(*id),
                    None => self.family_condition(key),
                })
            }
            Filter::MetaTag { value, .. } if filter.is_sort_directive() => {
                self.apply_sort_directive(value);
                Ok(tautology())
            }
            Filter::MetaTag { key, value } => {
                let signature = Tag::meta(key.as_str(), value.as_str()).signature();
                match self.resolved.get(&signature) {
                    Some(id) => Ok(self.tag_condition(*id)),
                    None => Err(CompileError::UnknownTag { signature }),
                }
            }
            Filter::And(left, right) => {
                let left = self.fold(left)?;
                let right = self.fold(right)?;
                Ok(format!("({left} AND {right})"))
            }
            Filter::Or(left, right) => {
                let left = self.fold(left)?;
                let right = self.fold(right)?;
                Ok(format!("({left} OR {right})"))
            }
            Filter::Not(inner) => Ok(format!("NOT ({})", self.fold(inner)?)),
        }
    }

    // Aggregated membership test over the grouped association rows.
    fn tag_condition(&self, id: TagId) -> String {
        format!(
            "SUM(CASE WHEN et.{} = {id} THEN 1 ELSE 0 END) > 0",
            self.config.association.tag_column
        )
    }

    // Any tag of this key, valued or not, is attached to the entity.
    fn family_condition(&mut self, key: &str) -> String {
        let index = match self.families.iter().position(|known| known == key) {
            Some(index) => index,
            None => {
                self.families.push(key.to_string());
                self.families.len() - 1
            }
        };
        let param = format!("{FAMILY_PARAM_PREFIX}{index}");
        self.params.set(param.clone(), key);

        let assoc = &self.config.association;
        let entity = &self.config.entity;
        format!(
            "EXISTS (SELECT 1 FROM {} fet INNER JOIN {} ft ON ft.id = fet.{} \
             WHERE fet.{} = e.{} AND ft.key = ${param})",
            assoc.table,
            self.config.tags.table,
            assoc.tag_column,
            assoc.entity_column,
            entity.id_column,
        )
    }

    fn apply_sort_directive(&mut self, value: &str) {
        self.sort = match value {
            // random ordering keeps whatever direction was already chosen
            "random" => SortSpec::new(SortBy::Random, self.sort.direction),
            "oldest" => SortSpec::new(SortBy::CreationOrder, SortDirection::Asc),
            "newest" => SortSpec::new(SortBy::CreationOrder, SortDirection::Desc),
            other => {
                tracing::debug!(value = other, "ignoring unknown sort directive");
                return;
            }
        };
    }
}

fn tautology() -> String {
    TAUTOLOGY.to_string()
}
