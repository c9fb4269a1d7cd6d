//! Module: sql::statement
//! Responsibility: plain, non-executable statement descriptions.
//! Does not own: rendering, binding, or execution.
//!
//! Fragments held here are structural SQL built from trusted configuration
//! and resolved tag ids. User-supplied values only ever appear as `$name`
//! placeholders.

///
/// Statement
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Delete(DeleteStatement),
}

impl From<SelectStatement> for Statement {
    fn from(stmt: SelectStatement) -> Self {
        Self::Select(stmt)
    }
}

impl From<InsertStatement> for Statement {
    fn from(stmt: InsertStatement) -> Self {
        Self::Insert(stmt)
    }
}

impl From<DeleteStatement> for Statement {
    fn from(stmt: DeleteStatement) -> Self {
        Self::Delete(stmt)
    }
}

///
/// SelectStatement
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SelectStatement {
    pub select: Vec<String>,
    pub from: String,
    pub joins: Vec<Join>,
    pub where_clause: Option<String>,
    pub group_by: Option<String>,
    pub having: Option<String>,
    pub sort: Vec<SortField>,
    pub limit: Option<Bound>,
    pub offset: Option<Bound>,
}

///
/// JoinKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

///
/// Join
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub on: String,
}

///
/// SortKey
///
/// `Random` renders to the dialect's random-ordering function.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SortKey {
    Random,
    Column(String),
}

///
/// SortDirection
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

///
/// NullsOrder
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NullsOrder {
    First,
    Last,
}

///
/// SortField
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SortField {
    pub key: SortKey,
    pub direction: Option<SortDirection>,
    pub nulls: Option<NullsOrder>,
}

///
/// Bound
///
/// LIMIT / OFFSET operand: an inline literal or a named placeholder.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Bound {
    Literal(u64),
    Param(String),
}

///
/// InsertStatement
///
/// Each entry of `rows` is one VALUES tuple of SQL expressions, in
/// `columns` order.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub on_conflict: Option<OnConflict>,
    pub returning: Vec<String>,
}

///
/// OnConflict
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OnConflict {
    DoNothing,
    DoUpdate {
        target: Vec<String>,
        set: Vec<(String, String)>,
    },
}

///
/// DeleteStatement
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub where_clause: Option<String>,
}
