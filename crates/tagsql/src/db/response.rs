//! Module: db::response
//! Responsibility: the pagination envelope around sentinel-carrying rows.
//! Does not own: LIMIT/OFFSET planning (see `compile`).

use crate::{
    TOTAL_COLUMN,
    db::executor::{FromRow, Row, RowDecodeError, StorageFault},
    sql::SqlValue,
};
use serde::{Deserialize, Serialize};

///
/// PageSpec
///
/// Requested window over a result set.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PageSpec {
    pub limit: u32,
    pub offset: u32,
}

impl PageSpec {
    #[must_use]
    pub const fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    /// The first page of `limit` rows.
    #[must_use]
    pub const fn first(limit: u32) -> Self {
        Self::new(limit, 0)
    }

    /// The page following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self::new(self.limit, self.offset.saturating_add(self.limit))
    }
}

///
/// Page
///
/// One page of items plus the total number of matches across all pages.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: FromRow> Page<T> {
    /// Build a page from rows that carry the total-count sentinel.
    ///
    /// The total comes from the first row (0 when there are none) and is
    /// never derived from the number of rows. The sentinel is stripped
    /// before items are decoded.
    pub fn from_rows(rows: Vec<Row>) -> Result<Self, StorageFault> {
        let mut total = None;
        let mut items = Vec::with_capacity(rows.len());

        for mut row in rows {
            let row_total = take_total(&mut row)?;
            match total {
                None => total = Some(row_total),
                Some(expected) if expected != row_total => {
                    return Err(RowDecodeError::Invalid {
                        column: TOTAL_COLUMN.to_string(),
                        message: format!("rows disagree on total ({expected} vs {row_total})"),
                    }
                    .into());
                }
                Some(_) => {}
            }

            items.push(T::from_row(&row)?);
        }

        Ok(Self::new(items, total.unwrap_or(0)))
    }
}

fn take_total(row: &mut Row) -> Result<u64, RowDecodeError> {
    match row.remove(TOTAL_COLUMN) {
        Some(SqlValue::Integer(total)) => {
            u64::try_from(total).map_err(|_| RowDecodeError::Invalid {
                column: TOTAL_COLUMN.to_string(),
                message: format!("negative total {total}"),
            })
        }
        Some(other) => Err(RowDecodeError::TypeMismatch {
            column: TOTAL_COLUMN.to_string(),
            expected: "integer",
            found: other.kind(),
        }),
        None => Err(RowDecodeError::MissingColumn {
            column: TOTAL_COLUMN.to_string(),
        }),
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, total: i64) -> Row {
        [("id", id), (TOTAL_COLUMN, total)].into_iter().collect()
    }

    #[test]
    fn total_comes_from_sentinel_not_row_count() {
        let page = Page::<Row>::from_rows(vec![row(1, 137), row(2, 137)]).unwrap();

        assert_eq!(page.total, 137);
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn sentinel_is_stripped_from_items() {
        let page = Page::<Row>::from_rows(vec![row(5, 1)]).unwrap();

        assert_eq!(page.items[0].get(TOTAL_COLUMN), None);
        assert_eq!(page.items[0].len(), 1);
        assert_eq!(page.items[0].get("id"), Some(&SqlValue::Integer(5)));
    }

    #[test]
    fn empty_result_has_zero_total() {
        let page = Page::<Row>::from_rows(Vec::new()).unwrap();

        assert_eq!(page, Page::new(Vec::new(), 0));
    }

    #[test]
    fn missing_sentinel_is_a_shape_fault() {
        let rows = vec![[("id", 1_i64)].into_iter().collect::<Row>()];
        let err = Page::<Row>::from_rows(rows).expect_err("missing sentinel must fail");

        assert!(matches!(
            err,
            StorageFault::RowShape(RowDecodeError::MissingColumn { .. })
        ));
    }

    #[test]
    fn disagreeing_totals_are_a_shape_fault() {
        let err = Page::<Row>::from_rows(vec![row(1, 10), row(2, 11)])
            .expect_err("totals must agree");

        assert!(matches!(
            err,
            StorageFault::RowShape(RowDecodeError::Invalid { .. })
        ));
    }

    #[test]
    fn negative_total_is_rejected() {
        assert!(Page::<Row>::from_rows(vec![row(1, -1)]).is_err());
    }

    #[test]
    fn page_spec_steps_forward() {
        let spec = PageSpec::first(20);

        assert_eq!(spec.next(), PageSpec::new(20, 20));
        assert_eq!(spec.next().next().offset, 40);
    }
}
