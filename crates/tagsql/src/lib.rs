//! Core runtime for TagSQL: filter trees, the tag id cache, statement
//! models and renderers, and the repository that ties them to an executor.

// public exports are one module level down
pub mod cache;
pub mod compile;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod obs;
pub mod sql;
pub mod tag;

///
/// CONSTANTS
///

/// Reserved meta-tag key that controls ordering instead of filtering.
pub const SORT_DIRECTIVE_KEY: &str = "sort";

/// Name of the window-function column carrying the full match count.
pub const TOTAL_COLUMN: &str = "__total";

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No executors, caches, or renderers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::response::{Page, PageSpec},
        filter::Filter,
        tag::{Tag, TagId, TagRecord, TagSignature, TagType, TagWithCount},
    };
}
