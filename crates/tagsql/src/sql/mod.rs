//! Statement model, rendering, and parameter binding.

pub mod bind;
pub mod render;
pub mod statement;
pub mod value;


// re-exports
pub use bind::{BoundStatement, Params, bind};
pub use render::{render, render_delete, render_insert, render_on_conflict, render_select};
pub use statement::{
    Bound, DeleteStatement, InsertStatement, Join, JoinKind, NullsOrder, OnConflict,
    SelectStatement, SortDirection, SortField, SortKey, Statement,
};
pub use value::SqlValue;
