use crate::{SORT_DIRECTIVE_KEY, tag::Tag};
use std::ops::{BitAnd, BitOr, Not};

///
/// Filter AST
///
/// Pure representation of a boolean tag filter as produced by an external
/// query parser. This layer contains no tag resolution or SQL semantics;
/// the compiler interprets it in a single pass.
///
/// The tree is finite and owns its children, so plain recursion is safe.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Filter {
    True,
    Tag { key: String },
    MetaTag { key: String, value: String },
    And(Box<Self>, Box<Self>),
    Or(Box<Self>, Box<Self>),
    Not(Box<Self>),
}

impl Filter {
    pub fn tag(key: impl Into<String>) -> Self {
        Self::Tag { key: key.into() }
    }

    pub fn meta(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::MetaTag {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Build a `sort:<value>` directive node.
    pub fn sort(value: impl Into<String>) -> Self {
        Self::meta(SORT_DIRECTIVE_KEY, value)
    }

    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn not(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Fold a list of filters with `And`, left-associated. Empty is `True`.
    #[must_use]
    pub fn all(filters: impl IntoIterator<Item = Self>) -> Self {
        filters
            .into_iter()
            .reduce(Self::and)
            .unwrap_or(Self::True)
    }

    /// Leaf constructor from a parsed tag: bare tags become `Tag`,
    /// valued tags become `MetaTag`.
    #[must_use]
    pub fn from_tag(tag: Tag) -> Self {
        match tag.value {
            Some(value) => Self::MetaTag {
                key: tag.key,
                value,
            },
            None => Self::Tag { key: tag.key },
        }
    }

    /// True when this node is a `sort:*` directive rather than a predicate.
    #[must_use]
    pub fn is_sort_directive(&self) -> bool {
        matches!(self, Self::MetaTag { key, .. } if key == SORT_DIRECTIVE_KEY)
    }

    /// Number of leaf nodes (tags, meta tags, and `True`).
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::True | Self::Tag { .. } | Self::MetaTag { .. } => 1,
            Self::And(left, right) | Self::Or(left, right) => {
                left.leaf_count() + right.leaf_count()
            }
            Self::Not(inner) => inner.leaf_count(),
        }
    }
}

impl From<Tag> for Filter {
    fn from(tag: Tag) -> Self {
        Self::from_tag(tag)
    }
}

impl BitAnd for Filter {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::and(self, rhs)
    }
}

impl BitOr for Filter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::or(self, rhs)
    }
}

impl Not for Filter {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::Not(Box::new(self))
    }
}

///
/// TESTS
///
