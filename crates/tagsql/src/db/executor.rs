//! Module: db::executor
//! Responsibility: the executor capability, row decoding, and row-count
//! contracts for rendered statements.
//! Does not own: connections or transactions. Callers hand in an executor
//! already bound to a connection.

use crate::{
    config::Dialect,
    db::response::Page,
    sql::{BoundStatement, Params, SqlValue, Statement, bind, render},
};
use thiserror::Error as ThisError;

///
/// StorageFault
///
/// The executor failed or returned rows that violate the statement
/// contract. Always a server-side fault.
///

#[derive(Debug, ThisError)]
pub enum StorageFault {
    #[error("invalid row count: {found}, expected between {min} and {}", describe_max(.max))]
    RowCount {
        found: usize,
        min: usize,
        max: Option<usize>,
    },

    #[error("row does not match shape: {0}")]
    RowShape(#[from] RowDecodeError),

    #[error("statement references unbound parameter '${name}'")]
    UnboundParameter { name: String },

    #[error("driver error: {message}")]
    Driver { message: String },
}

fn describe_max(max: &Option<usize>) -> String {
    max.map_or_else(|| "unbounded".to_string(), |max| max.to_string())
}

impl StorageFault {
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }
}

///
/// RowDecodeError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum RowDecodeError {
    #[error("missing column '{column}'")]
    MissingColumn { column: String },

    #[error("column '{column}' expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("column '{column}' is invalid: {message}")]
    Invalid { column: String, message: String },
}

///
/// StatementExecutor
///
/// Runs one bound statement. Implementations map driver failures to
/// [`StorageFault::Driver`].
///

pub trait StatementExecutor {
    /// Run a statement that yields rows.
    fn query(&self, statement: &BoundStatement) -> Result<Vec<Row>, StorageFault>;

    /// Run a statement for its side effect, returning the affected row count.
    fn execute(&self, statement: &BoundStatement) -> Result<u64, StorageFault>;
}

impl<X: StatementExecutor + ?Sized> StatementExecutor for &X {
    fn query(&self, statement: &BoundStatement) -> Result<Vec<Row>, StorageFault> {
        (**self).query(statement)
    }

    fn execute(&self, statement: &BoundStatement) -> Result<u64, StorageFault> {
        (**self).execute(statement)
    }
}

///
/// Row
///
/// One result row as ordered `(column, value)` pairs.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    #[must_use]
    pub const fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Decode one column.
    pub fn try_get<T: FromSqlValue>(&self, column: &str) -> Result<T, RowDecodeError> {
        let value = self
            .get(column)
            .ok_or_else(|| RowDecodeError::MissingColumn {
                column: column.to_string(),
            })?;

        T::from_sql_value(value).ok_or_else(|| RowDecodeError::TypeMismatch {
            column: column.to_string(),
            expected: T::EXPECTED,
            found: value.kind(),
        })
    }

    /// Remove a column, returning its value.
    pub fn remove(&mut self, column: &str) -> Option<SqlValue> {
        let index = self.columns.iter().position(|(name, _)| name == column)?;

        Some(self.columns.remove(index).1)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<N: Into<String>, V: Into<SqlValue>> FromIterator<(N, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

///
/// FromSqlValue
///
/// Scalar decoding. `None` means the value has the wrong type.
///

pub trait FromSqlValue: Sized {
    const EXPECTED: &'static str;

    fn from_sql_value(value: &SqlValue) -> Option<Self>;
}

impl FromSqlValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Integer(value) => Some(*value),
            _ => None,
        }
    }
}

impl FromSqlValue for f64 {
    const EXPECTED: &'static str = "real";

    #[expect(clippy::cast_precision_loss)]
    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Real(value) => Some(*value),
            SqlValue::Integer(value) => Some(*value as Self),
            _ => None,
        }
    }
}

impl FromSqlValue for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Integer(0) => Some(false),
            SqlValue::Integer(1) => Some(true),
            _ => None,
        }
    }
}

impl FromSqlValue for String {
    const EXPECTED: &'static str = "text";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Text(value) => Some(value.clone()),
            _ => None,
        }
    }
}

impl FromSqlValue for SqlValue {
    const EXPECTED: &'static str = "any";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Null => Some(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

///
/// FromRow
///
/// Row shape validation: decode a typed value from one row.
///

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self, RowDecodeError>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self, RowDecodeError> {
        Ok(row.clone())
    }
}

///
/// Expect
///
/// Row-count contract for one statement.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Expect {
    One,
    OneOrNone,
    Many,
    Any,
}

impl Expect {
    #[must_use]
    pub const fn bounds(self) -> (usize, Option<usize>) {
        match self {
            Self::One => (1, Some(1)),
            Self::OneOrNone => (0, Some(1)),
            Self::Many => (1, None),
            Self::Any => (0, None),
        }
    }

    // Check a row count against this contract.
    fn check(self, found: usize) -> Result<(), StorageFault> {
        let (min, max) = self.bounds();
        if found < min || max.is_some_and(|max| found > max) {
            Err(StorageFault::RowCount { found, min, max })
        } else {
            Ok(())
        }
    }
}

///
/// StatementRunner
///
/// Renders, binds and runs statement models against an executor, enforcing
/// row-count contracts and decoding rows. Every fault is logged together
/// with the rendered statement; the fault itself carries no SQL.
///

pub struct StatementRunner<'a, X: StatementExecutor + ?Sized> {
    executor: &'a X,
    dialect: Dialect,
}

impl<'a, X: StatementExecutor + ?Sized> StatementRunner<'a, X> {
    #[must_use]
    pub const fn new(executor: &'a X, dialect: Dialect) -> Self {
        Self { executor, dialect }
    }

    /// Run a row-yielding statement and check its row count.
    pub fn fetch(
        &self,
        statement: &Statement,
        params: &Params,
        expect: Expect,
    ) -> Result<Vec<Row>, StorageFault> {
        let sql = render(statement, self.dialect);

        let result = bind(&sql, params, self.dialect).and_then(|bound| {
            tracing::debug!(sql = %bound.sql, params = bound.values.len(), "query");
            let rows = self.executor.query(&bound)?;
            expect.check(rows.len())?;

            Ok(rows)
        });

        result.inspect_err(|err| log_fault(&sql, err))
    }

    /// Exactly one row.
    pub fn one<T: FromRow>(
        &self,
        statement: &Statement,
        params: &Params,
    ) -> Result<T, StorageFault> {
        let rows = self.fetch(statement, params, Expect::One)?;

        self.decode(statement, &rows[0])
    }

    /// Zero or one row.
    pub fn one_or_none<T: FromRow>(
        &self,
        statement: &Statement,
        params: &Params,
    ) -> Result<Option<T>, StorageFault> {
        let rows = self.fetch(statement, params, Expect::OneOrNone)?;

        rows.first().map(|row| self.decode(statement, row)).transpose()
    }

    /// One or more rows.
    pub fn many<T: FromRow>(
        &self,
        statement: &Statement,
        params: &Params,
    ) -> Result<Vec<T>, StorageFault> {
        let rows = self.fetch(statement, params, Expect::Many)?;

        rows.iter().map(|row| self.decode(statement, row)).collect()
    }

    /// Any number of rows.
    pub fn any<T: FromRow>(
        &self,
        statement: &Statement,
        params: &Params,
    ) -> Result<Vec<T>, StorageFault> {
        let rows = self.fetch(statement, params, Expect::Any)?;

        rows.iter().map(|row| self.decode(statement, row)).collect()
    }

    /// Any number of rows carrying the total-count sentinel column.
    pub fn page<T: FromRow>(
        &self,
        statement: &Statement,
        params: &Params,
    ) -> Result<Page<T>, StorageFault> {
        let rows = self.fetch(statement, params, Expect::Any)?;

        Page::from_rows(rows).inspect_err(|err| log_fault(&render(statement, self.dialect), err))
    }

    /// Run for side effects only; returns the affected row count.
    pub fn none(&self, statement: &Statement, params: &Params) -> Result<u64, StorageFault> {
        let sql = render(statement, self.dialect);

        let result = bind(&sql, params, self.dialect).and_then(|bound| {
            tracing::debug!(sql = %bound.sql, params = bound.values.len(), "execute");
            self.executor.execute(&bound)
        });

        result.inspect_err(|err| log_fault(&sql, err))
    }

    fn decode<T: FromRow>(&self, statement: &Statement, row: &Row) -> Result<T, StorageFault> {
        T::from_row(row).map_err(|err| {
            let err = StorageFault::from(err);
            log_fault(&render(statement, self.dialect), &err);
            err
        })
    }
}

fn log_fault(sql: &str, err: &StorageFault) {
    tracing::error!(sql = %sql, error = %err, "statement failed");
}

///
/// TESTS
///
