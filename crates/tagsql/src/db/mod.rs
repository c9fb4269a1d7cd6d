//! Module: db
//! Responsibility: executor contract, pagination envelope, and the tag
//! repository that drives compiler, cache and executor together.
//! Does not own: connection management or schema migrations.

pub mod executor;
pub mod repository;
pub mod response;
#[cfg(feature = "sqlite")]
pub mod sqlite;

// re-exports
pub use executor::{
    Expect, FromRow, FromSqlValue, Row, RowDecodeError, StatementExecutor, StatementRunner,
    StorageFault,
};
pub use repository::TagRepository;
pub use response::{Page, PageSpec};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteExecutor;
