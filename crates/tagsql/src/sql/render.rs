//! Module: sql::render
//! Responsibility: pure statement-model to SQL text rendering.
//! Does not own: placeholder binding (see `sql::bind`).

use crate::{
    config::Dialect,
    sql::statement::{
        Bound, DeleteStatement, InsertStatement, JoinKind, NullsOrder, OnConflict,
        SelectStatement, SortDirection, SortField, SortKey, Statement,
    },
};

/// Render any statement for `dialect`.
#[must_use]
pub fn render(statement: &Statement, dialect: Dialect) -> String {
    match statement {
        Statement::Select(stmt) => render_select(stmt, dialect),
        Statement::Insert(stmt) => render_insert(stmt),
        Statement::Delete(stmt) => render_delete(stmt),
    }
}

/// Render a SELECT. Absent clauses are omitted; clauses are separated by a
/// single space.
#[must_use]
pub fn render_select(stmt: &SelectStatement, dialect: Dialect) -> String {
    let mut parts = vec![
        format!("SELECT {}", stmt.select.join(", ")),
        format!("FROM {}", stmt.from),
    ];

    for join in &stmt.joins {
        let kind = match join.kind {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
        };
        parts.push(format!("{kind} JOIN {} ON {}", join.table, join.on));
    }

    if let Some(where_clause) = &stmt.where_clause {
        parts.push(format!("WHERE {where_clause}"));
    }
    if let Some(group_by) = &stmt.group_by {
        parts.push(format!("GROUP BY {group_by}"));
    }
    if let Some(having) = &stmt.having {
        parts.push(format!("HAVING {having}"));
    }
    if !stmt.sort.is_empty() {
        let fields = stmt
            .sort
            .iter()
            .map(|field| render_sort_field(field, dialect))
            .collect::<Vec<_>>();
        parts.push(format!("ORDER BY {}", fields.join(", ")));
    }
    if let Some(limit) = &stmt.limit {
        parts.push(format!("LIMIT {}", render_bound(limit)));
    }
    if let Some(offset) = &stmt.offset {
        parts.push(format!("OFFSET {}", render_bound(offset)));
    }

    parts.join(" ")
}

/// Render an INSERT, including every VALUES tuple.
#[must_use]
pub fn render_insert(stmt: &InsertStatement) -> String {
    let rows = stmt
        .rows
        .iter()
        .map(|row| format!("({})", row.join(", ")))
        .collect::<Vec<_>>();

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        stmt.table,
        stmt.columns.join(", "),
        rows.join(", ")
    );

    if let Some(action) = &stmt.on_conflict {
        sql.push_str(" ON CONFLICT ");
        sql.push_str(&render_on_conflict(action));
    }
    if !stmt.returning.is_empty() {
        sql.push_str(" RETURNING ");
        sql.push_str(&stmt.returning.join(", "));
    }

    sql
}

/// Render a DELETE.
#[must_use]
pub fn render_delete(stmt: &DeleteStatement) -> String {
    match &stmt.where_clause {
        Some(where_clause) => format!("DELETE FROM {} WHERE {where_clause}", stmt.table),
        None => format!("DELETE FROM {}", stmt.table),
    }
}

/// Render the action following `ON CONFLICT`.
#[must_use]
pub fn render_on_conflict(action: &OnConflict) -> String {
    match action {
        OnConflict::DoNothing => "DO NOTHING".to_string(),
        OnConflict::DoUpdate { target, set } => {
            let assignments = set
                .iter()
                .map(|(column, value)| format!("{column} = {value}"))
                .collect::<Vec<_>>()
                .join(", ");

            if target.is_empty() {
                format!("DO UPDATE SET {assignments}")
            } else {
                format!("({}) DO UPDATE SET {assignments}", target.join(", "))
            }
        }
    }
}

fn render_sort_field(field: &SortField, dialect: Dialect) -> String {
    let column = match &field.key {
        // direction and nulls ordering are meaningless for random order
        SortKey::Random => return dialect.random_function().to_string(),
        SortKey::Column(column) => column,
    };

    let mut sql = column.clone();
    match field.direction {
        Some(SortDirection::Asc) => sql.push_str(" ASC"),
        Some(SortDirection::Desc) => sql.push_str(" DESC"),
        None => {}
    }
    match field.nulls {
        Some(NullsOrder::First) => sql.push_str(" NULLS FIRST"),
        Some(NullsOrder::Last) => sql.push_str(" NULLS LAST"),
        None => {}
    }

    sql
}

fn render_bound(bound: &Bound) -> String {
    match bound {
        Bound::Literal(value) => value.to_string(),
        Bound::Param(name) => format!("${name}"),
    }
}
