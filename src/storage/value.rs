//! CQL values, bound parameters and result rows.

use std::fmt;

use chrono::NaiveDate;
use uuid::Uuid;

use super::schema::Column;
use super::{Result, StorageError};

/// A non-null scalar CQL value.
///
/// Only the scalar types used by the reservation tables are modelled.
/// Values order by variant first, then by payload; key columns always hold a
/// single variant so the ordering within a key column matches CQL ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CqlValue {
    Text(String),
    Date(NaiveDate),
    SmallInt(i16),
    Uuid(Uuid),
}

impl CqlValue {
    /// CQL type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            CqlValue::Text(_) => "text",
            CqlValue::Date(_) => "date",
            CqlValue::SmallInt(_) => "smallint",
            CqlValue::Uuid(_) => "uuid",
        }
    }
}

impl fmt::Display for CqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CqlValue::Text(s) => write!(f, "'{}'", s),
            CqlValue::Date(d) => write!(f, "'{}'", d),
            CqlValue::SmallInt(n) => write!(f, "{}", n),
            CqlValue::Uuid(u) => write!(f, "{}", u),
        }
    }
}

/// A value bound to a statement parameter.
///
/// `Unset` leaves the column untouched on write; `Null` writes a tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundValue {
    Set(CqlValue),
    Null,
    Unset,
}

impl BoundValue {
    /// Bind an optional field: `None` becomes `Unset`, never `Null`.
    pub fn unset_if_none<T: Into<CqlValue>>(value: Option<T>) -> Self {
        match value {
            Some(v) => BoundValue::Set(v.into()),
            None => BoundValue::Unset,
        }
    }

    pub fn as_value(&self) -> Option<&CqlValue> {
        match self {
            BoundValue::Set(v) => Some(v),
            BoundValue::Null | BoundValue::Unset => None,
        }
    }
}

impl From<String> for CqlValue {
    fn from(value: String) -> Self {
        CqlValue::Text(value)
    }
}

impl From<&str> for CqlValue {
    fn from(value: &str) -> Self {
        CqlValue::Text(value.to_string())
    }
}

impl From<NaiveDate> for CqlValue {
    fn from(value: NaiveDate) -> Self {
        CqlValue::Date(value)
    }
}

impl From<i16> for CqlValue {
    fn from(value: i16) -> Self {
        CqlValue::SmallInt(value)
    }
}

impl From<Uuid> for CqlValue {
    fn from(value: Uuid) -> Self {
        CqlValue::Uuid(value)
    }
}

/// A result row: the selected columns and their values.
///
/// A column that was not selected, or is null in storage, is simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: Vec<(Column, CqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cell, replacing any previous value of the column.
    pub fn with(mut self, column: Column, value: impl Into<CqlValue>) -> Self {
        self.set(column, value.into());
        self
    }

    pub fn set(&mut self, column: Column, value: CqlValue) {
        match self.cells.iter_mut().find(|(c, _)| *c == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn get(&self, column: Column) -> Option<&CqlValue> {
        self.cells
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.cells.iter().map(|(c, _)| *c)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get_text(&self, column: Column) -> Result<Option<String>> {
        match self.get(column) {
            None => Ok(None),
            Some(CqlValue::Text(s)) => Ok(Some(s.clone())),
            Some(other) => Err(type_mismatch(column, "text", other)),
        }
    }

    pub fn get_date(&self, column: Column) -> Result<Option<NaiveDate>> {
        match self.get(column) {
            None => Ok(None),
            Some(CqlValue::Date(d)) => Ok(Some(*d)),
            Some(other) => Err(type_mismatch(column, "date", other)),
        }
    }

    pub fn get_small_int(&self, column: Column) -> Result<Option<i16>> {
        match self.get(column) {
            None => Ok(None),
            Some(CqlValue::SmallInt(n)) => Ok(Some(*n)),
            Some(other) => Err(type_mismatch(column, "smallint", other)),
        }
    }

    pub fn get_uuid(&self, column: Column) -> Result<Option<Uuid>> {
        match self.get(column) {
            None => Ok(None),
            Some(CqlValue::Uuid(u)) => Ok(Some(*u)),
            Some(other) => Err(type_mismatch(column, "uuid", other)),
        }
    }
}

fn type_mismatch(column: Column, expected: &'static str, actual: &CqlValue) -> StorageError {
    StorageError::ColumnType {
        column: column.name(),
        expected,
        actual: actual.type_name(),
    }
}

/// Rows returned by a single request, in engine order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// First row, if any.
    pub fn one(self) -> Option<Row> {
        self.rows.into_iter().next()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_if_none() {
        assert_eq!(BoundValue::unset_if_none::<i16>(None), BoundValue::Unset);
        assert_eq!(
            BoundValue::unset_if_none(Some(42i16)),
            BoundValue::Set(CqlValue::SmallInt(42))
        );
    }

    #[test]
    fn test_row_set_replaces_existing_cell() {
        let row = Row::new()
            .with(Column::HotelId, "a")
            .with(Column::HotelId, "b");
        assert_eq!(row.len(), 1);
        assert_eq!(row.get_text(Column::HotelId).unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn test_typed_getter_absent_is_none() {
        let row = Row::new();
        assert_eq!(row.get_uuid(Column::GuestId).unwrap(), None);
        assert_eq!(row.get_date(Column::StartDate).unwrap(), None);
    }

    #[test]
    fn test_typed_getter_rejects_wrong_type() {
        let row = Row::new().with(Column::RoomNumber, "forty-two");
        let err = row.get_small_int(Column::RoomNumber).unwrap_err();
        match err {
            StorageError::ColumnType {
                column,
                expected,
                actual,
            } => {
                assert_eq!(column, "room_number");
                assert_eq!(expected, "smallint");
                assert_eq!(actual, "text");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
