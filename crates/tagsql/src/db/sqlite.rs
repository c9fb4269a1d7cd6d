//! Module: db::sqlite
//! Responsibility: `StatementExecutor` over a borrowed `rusqlite::Connection`.
//! Does not own: the connection, its schema, or transactions.

use crate::{
    db::executor::{Row, StatementExecutor, StorageFault},
    sql::{BoundStatement, SqlValue},
};
use rusqlite::{Connection, params_from_iter, types::Value};

///
/// SqliteExecutor
///

pub struct SqliteExecutor<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteExecutor<'c> {
    #[must_use]
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl StatementExecutor for SqliteExecutor<'_> {
    fn query(&self, statement: &BoundStatement) -> Result<Vec<Row>, StorageFault> {
        let mut stmt = self.conn.prepare(&statement.sql).map_err(driver_fault)?;
        let names = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let rows = stmt
            .query_map(params_from_iter(statement.values.iter().map(to_sqlite)), |row| {
                let mut columns = Vec::with_capacity(names.len());
                for (index, name) in names.iter().enumerate() {
                    let value: Value = row.get(index)?;
                    columns.push((name.clone(), from_sqlite(value)));
                }

                Ok(Row::new(columns))
            })
            .map_err(driver_fault)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(driver_fault)
    }

    fn execute(&self, statement: &BoundStatement) -> Result<u64, StorageFault> {
        let changed = self
            .conn
            .execute(
                &statement.sql,
                params_from_iter(statement.values.iter().map(to_sqlite)),
            )
            .map_err(driver_fault)?;

        Ok(u64::try_from(changed).unwrap_or(u64::MAX))
    }
}

fn to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(value) => Value::Integer(*value),
        SqlValue::Real(value) => Value::Real(*value),
        SqlValue::Text(value) => Value::Text(value.clone()),
    }
}

fn from_sqlite(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(value) => SqlValue::Integer(value),
        Value::Real(value) => SqlValue::Real(value),
        Value::Text(value) => SqlValue::Text(value),
        // no blob columns in the tag schema; keep the bytes readable
        Value::Blob(bytes) => SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

fn driver_fault(err: rusqlite::Error) -> StorageFault {
    StorageFault::driver(err.to_string())
}
