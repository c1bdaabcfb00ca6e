//! Statement templates.
//!
//! A [`StatementTemplate`] is derived from a [`TableDef`] and carries enough
//! structure for any engine to execute it: the CQL text (rendered with
//! `sea-query`, bind markers as `?`) and the ordered list of bind columns.
//! Engines prepare a template once and bind values per request.

use sea_query::{Alias, Asterisk, Expr, Query, SimpleExpr, SqliteQueryBuilder, Value};

use super::schema::{Column, TableDef};
use super::value::BoundValue;

/// Selected columns of a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Columns(Vec<Column>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// Read rows; each restriction is an equality on a key column.
    Select {
        projection: Projection,
        restrictions: Vec<Column>,
    },
    /// Upsert one row.
    Insert { columns: Vec<Column> },
    /// Remove rows matching equality restrictions on key columns.
    Delete { restrictions: Vec<Column> },
}

/// A parameterized statement against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTemplate {
    keyspace: String,
    table: &'static TableDef,
    kind: StatementKind,
}

impl StatementTemplate {
    pub fn new(keyspace: impl Into<String>, table: &'static TableDef, kind: StatementKind) -> Self {
        Self {
            keyspace: keyspace.into(),
            table,
            kind,
        }
    }

    /// `SELECT * FROM table`: unbounded scan.
    pub fn select_all(keyspace: impl Into<String>, table: &'static TableDef) -> Self {
        Self::new(
            keyspace,
            table,
            StatementKind::Select {
                projection: Projection::All,
                restrictions: Vec::new(),
            },
        )
    }

    /// `SELECT * ... WHERE <partition key> = ?`: one partition.
    pub fn select_by_partition(keyspace: impl Into<String>, table: &'static TableDef) -> Self {
        Self::new(
            keyspace,
            table,
            StatementKind::Select {
                projection: Projection::All,
                restrictions: table.partition_key.to_vec(),
            },
        )
    }

    /// `SELECT <projection> ... WHERE <primary key> = ?`: at most one row.
    pub fn select_by_primary_key(
        keyspace: impl Into<String>,
        table: &'static TableDef,
        projection: Projection,
    ) -> Self {
        Self::new(
            keyspace,
            table,
            StatementKind::Select {
                projection,
                restrictions: table.primary_key(),
            },
        )
    }

    /// `INSERT INTO table (<all columns>) VALUES (?, ...)`.
    pub fn insert_all(keyspace: impl Into<String>, table: &'static TableDef) -> Self {
        Self::new(
            keyspace,
            table,
            StatementKind::Insert {
                columns: table.column_names().collect(),
            },
        )
    }

    /// `DELETE FROM table WHERE <primary key> = ?`.
    pub fn delete_by_primary_key(keyspace: impl Into<String>, table: &'static TableDef) -> Self {
        Self::new(
            keyspace,
            table,
            StatementKind::Delete {
                restrictions: table.primary_key(),
            },
        )
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn table(&self) -> &'static TableDef {
        self.table
    }

    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    /// Columns whose values are bound, in bind-marker order.
    pub fn bind_columns(&self) -> &[Column] {
        match &self.kind {
            StatementKind::Select { restrictions, .. } => restrictions,
            StatementKind::Insert { columns } => columns,
            StatementKind::Delete { restrictions } => restrictions,
        }
    }

    /// CQL text with `?` bind markers.
    pub fn cql(&self) -> String {
        let table = (Alias::new(self.keyspace.as_str()), self.table.table);
        match &self.kind {
            StatementKind::Select {
                projection,
                restrictions,
            } => {
                let mut query = Query::select();
                match projection {
                    Projection::All => {
                        query.column(Asterisk);
                    }
                    Projection::Columns(columns) => {
                        query.columns(columns.iter().copied());
                    }
                }
                query.from(table);
                for column in restrictions {
                    query.and_where(Expr::col(*column).eq(bind_marker()));
                }
                query.build(SqliteQueryBuilder).0
            }
            StatementKind::Insert { columns } => {
                Query::insert()
                    .into_table(table)
                    .columns(columns.iter().copied())
                    .values_panic(columns.iter().map(|_| bind_marker()))
                    .build(SqliteQueryBuilder)
                    .0
            }
            StatementKind::Delete { restrictions } => {
                let mut query = Query::delete();
                query.from_table(table);
                for column in restrictions {
                    query.and_where(Expr::col(*column).eq(bind_marker()));
                }
                query.build(SqliteQueryBuilder).0
            }
        }
    }
}

/// A query parameter. Built with the SQLite builder, each one renders as a
/// bare `?` marker; the value itself is discarded.
fn bind_marker() -> SimpleExpr {
    SimpleExpr::Value(Value::Bool(Some(false)))
}

/// Number of `?` bind markers in rendered CQL, outside quoted identifiers
/// and string literals.
pub fn bind_marker_count(cql: &str) -> usize {
    let mut count = 0;
    let mut quote = None;
    for c in cql.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '?') => count += 1,
            _ => {}
        }
    }
    count
}

/// Statements executed as one logged batch: all or nothing.
#[derive(Debug, Clone)]
pub struct LoggedBatch<P> {
    statements: Vec<(P, Vec<BoundValue>)>,
}

impl<P> Default for LoggedBatch<P> {
    fn default() -> Self {
        Self {
            statements: Vec::new(),
        }
    }
}

impl<P> LoggedBatch<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, statement: P, values: Vec<BoundValue>) {
        self.statements.push((statement, values));
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statements(&self) -> &[(P, Vec<BoundValue>)] {
        &self.statements
    }

    pub fn into_statements(self) -> Vec<(P, Vec<BoundValue>)> {
        self.statements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::{RESERVATIONS_BY_CONFIRMATION, RESERVATIONS_BY_HOTEL_DATE};

    #[test]
    fn test_exists_query() {
        let stmt = StatementTemplate::select_by_primary_key(
            "reservation",
            &RESERVATIONS_BY_CONFIRMATION,
            Projection::Columns(vec![Column::ConfirmationNumber]),
        );
        assert_eq!(
            stmt.cql(),
            r#"SELECT "confirmation_number" FROM "reservation"."reservations_by_confirmation" WHERE "confirmation_number" = ?"#
        );
        assert_eq!(stmt.bind_columns(), &[Column::ConfirmationNumber]);
    }

    #[test]
    fn test_select_by_partition_binds_partition_key() {
        let stmt = StatementTemplate::select_by_partition("reservation", &RESERVATIONS_BY_HOTEL_DATE);
        assert_eq!(
            stmt.cql(),
            r#"SELECT * FROM "reservation"."reservations_by_hotel_date" WHERE "hotel_id" = ? AND "start_date" = ?"#
        );
        assert_eq!(stmt.bind_columns(), &[Column::HotelId, Column::StartDate]);
    }

    #[test]
    fn test_select_all_has_no_restrictions() {
        let stmt = StatementTemplate::select_all("reservation", &RESERVATIONS_BY_CONFIRMATION);
        assert_eq!(
            stmt.cql(),
            r#"SELECT * FROM "reservation"."reservations_by_confirmation""#
        );
        assert!(stmt.bind_columns().is_empty());
    }

    #[test]
    fn test_insert_all_columns_in_declaration_order() {
        let stmt = StatementTemplate::insert_all("reservation", &RESERVATIONS_BY_HOTEL_DATE);
        assert_eq!(
            stmt.cql(),
            r#"INSERT INTO "reservation"."reservations_by_hotel_date" ("hotel_id", "start_date", "end_date", "room_number", "confirmation_number", "guest_id") VALUES (?, ?, ?, ?, ?, ?)"#
        );
        assert_eq!(stmt.bind_columns().len(), 6);
    }

    #[test]
    fn test_delete_by_primary_key() {
        let stmt = StatementTemplate::delete_by_primary_key("reservation", &RESERVATIONS_BY_HOTEL_DATE);
        assert_eq!(
            stmt.cql(),
            r#"DELETE FROM "reservation"."reservations_by_hotel_date" WHERE "hotel_id" = ? AND "start_date" = ? AND "room_number" = ?"#
        );
        assert_eq!(
            stmt.bind_columns(),
            &[Column::HotelId, Column::StartDate, Column::RoomNumber]
        );
    }

    #[test]
    fn test_restrictions_use_bare_bind_markers() {
        let templates = [
            StatementTemplate::select_by_primary_key(
                "reservation",
                &RESERVATIONS_BY_CONFIRMATION,
                Projection::All,
            ),
            StatementTemplate::select_by_primary_key(
                "reservation",
                &RESERVATIONS_BY_HOTEL_DATE,
                Projection::Columns(vec![Column::ConfirmationNumber]),
            ),
            StatementTemplate::select_by_partition("reservation", &RESERVATIONS_BY_HOTEL_DATE),
            StatementTemplate::delete_by_primary_key("reservation", &RESERVATIONS_BY_CONFIRMATION),
            StatementTemplate::delete_by_primary_key("reservation", &RESERVATIONS_BY_HOTEL_DATE),
            StatementTemplate::insert_all("reservation", &RESERVATIONS_BY_CONFIRMATION),
        ];
        for stmt in templates {
            let cql = stmt.cql();
            assert!(!cql.contains("(?)"), "tuple bind marker in {}", cql);
            assert_eq!(bind_marker_count(&cql), stmt.bind_columns().len(), "{}", cql);
        }
    }

    #[test]
    fn test_bind_marker_count_skips_quoted_text() {
        assert_eq!(bind_marker_count(r#"SELECT "a?" FROM t WHERE x = ? AND y = '?'"#), 1);
        assert_eq!(bind_marker_count("INSERT INTO t (a, b) VALUES (?, ?)"), 2);
        assert_eq!(bind_marker_count("SELECT * FROM t"), 0);
    }

    #[test]
    fn test_logged_batch_preserves_order() {
        let mut batch = LoggedBatch::new();
        assert!(batch.is_empty());
        batch.add("first", vec![BoundValue::Null]);
        batch.add("second", vec![]);
        assert_eq!(batch.len(), 2);
        let names: Vec<_> = batch.into_statements().into_iter().map(|(p, _)| p).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
