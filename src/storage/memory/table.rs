//! Column-family table storage.
//!
//! Rows live in partitions keyed by the partition-key values. Within a
//! partition, rows are ordered by their clustering key honoring each
//! clustering column's declared sort order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::storage::schema::{ClusteringOrder, Column, TableDef};
use crate::storage::statement::{Projection, StatementKind, StatementTemplate};
use crate::storage::value::{BoundValue, CqlValue, Row};
use crate::storage::{Result, StorageError};

/// Clustering-key values paired with their sort order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ClusteringKey(Vec<(ClusteringOrder, CqlValue)>);

impl ClusteringKey {
    fn starts_with(&self, prefix: &[CqlValue]) -> bool {
        self.0.len() >= prefix.len() && self.0.iter().zip(prefix).all(|((_, v), p)| v == p)
    }
}

impl Ord for ClusteringKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for ((order, a), (_, b)) in self.0.iter().zip(&other.0) {
            let ord = match order {
                ClusteringOrder::Asc => a.cmp(b),
                ClusteringOrder::Desc => b.cmp(a),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl PartialOrd for ClusteringKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

type Cells = BTreeMap<Column, CqlValue>;

#[derive(Debug, Clone)]
pub(super) struct MemoryTable {
    def: &'static TableDef,
    partitions: BTreeMap<Vec<CqlValue>, BTreeMap<ClusteringKey, Cells>>,
}

impl MemoryTable {
    pub(super) fn new(def: &'static TableDef) -> Self {
        Self {
            def,
            partitions: BTreeMap::new(),
        }
    }

    pub(super) fn def(&self) -> &'static TableDef {
        self.def
    }

    /// Check that a statement can run against this table.
    pub(super) fn check(&self, template: &StatementTemplate) -> Result<()> {
        match template.kind() {
            StatementKind::Select {
                projection,
                restrictions,
            } => {
                if let Projection::Columns(columns) = projection {
                    for column in columns {
                        self.require_column(*column)?;
                    }
                }
                if restrictions.is_empty() {
                    return Ok(());
                }
                self.check_key_restrictions(restrictions)
            }
            StatementKind::Insert { columns } => {
                for column in columns {
                    self.require_column(*column)?;
                }
                match self
                    .def
                    .primary_key()
                    .into_iter()
                    .find(|key| !columns.contains(key))
                {
                    Some(missing) => Err(StorageError::InvalidQuery(format!(
                        "Some primary key parts are missing: {}",
                        missing.name()
                    ))),
                    None => Ok(()),
                }
            }
            StatementKind::Delete { restrictions } => self.check_key_restrictions(restrictions),
        }
    }

    fn check_key_restrictions(&self, restrictions: &[Column]) -> Result<()> {
        let partition = self.def.partition_key;
        let clustering: Vec<Column> = self.def.clustering_columns().collect();
        let valid = restrictions.len() >= partition.len()
            && restrictions[..partition.len()] == *partition
            && clustering.starts_with(&restrictions[partition.len()..]);
        if valid {
            Ok(())
        } else {
            Err(StorageError::InvalidQuery(format!(
                "Restrictions on {} must cover the partition key followed by a clustering prefix",
                self.def.name()
            )))
        }
    }

    fn require_column(&self, column: Column) -> Result<()> {
        match self.def.column_type(column) {
            Some(_) => Ok(()),
            None => Err(StorageError::InvalidQuery(format!(
                "Undefined column name {} in table {}",
                column.name(),
                self.def.name()
            ))),
        }
    }

    pub(super) fn check_type(&self, column: Column, value: &CqlValue) -> Result<()> {
        self.require_column(column)?;
        match self.def.column_type(column) {
            Some(column_type) if column_type.accepts(value) => Ok(()),
            Some(column_type) => Err(StorageError::InvalidQuery(format!(
                "Invalid {} value for column {} of type {}",
                value.type_name(),
                column.name(),
                column_type.cql()
            ))),
            None => Ok(()),
        }
    }

    /// Write one row. `Set` overwrites a cell, `Null` clears it and `Unset`
    /// leaves it untouched.
    pub(super) fn upsert(&mut self, cells: Vec<(Column, BoundValue)>) -> Result<()> {
        for (column, value) in &cells {
            self.require_column(*column)?;
            if let BoundValue::Set(v) = value {
                self.check_type(*column, v)?;
            }
        }

        let key_value = |column: Column| -> Result<CqlValue> {
            match cells.iter().find(|(c, _)| *c == column).map(|(_, v)| v) {
                Some(BoundValue::Set(v)) => Ok(v.clone()),
                _ => Err(StorageError::InvalidQuery(format!(
                    "Invalid null or unset value for primary key column {}",
                    column.name()
                ))),
            }
        };
        let partition = self
            .def
            .partition_key
            .iter()
            .map(|c| key_value(*c))
            .collect::<Result<Vec<_>>>()?;
        let clustering = ClusteringKey(
            self.def
                .clustering_key
                .iter()
                .map(|(c, order)| Ok((*order, key_value(*c)?)))
                .collect::<Result<Vec<_>>>()?,
        );

        let row = self
            .partitions
            .entry(partition)
            .or_default()
            .entry(clustering)
            .or_default();
        for (column, value) in cells {
            match value {
                BoundValue::Set(v) => {
                    row.insert(column, v);
                }
                BoundValue::Null => {
                    row.remove(&column);
                }
                BoundValue::Unset => {}
            }
        }
        Ok(())
    }

    /// Delete by partition key plus an optional clustering prefix.
    pub(super) fn delete(&mut self, key: &[CqlValue]) {
        let (partition, prefix) = key.split_at(self.def.partition_key.len().min(key.len()));
        let Some(rows) = self.partitions.get_mut(partition) else {
            return;
        };
        rows.retain(|clustering, _| !clustering.starts_with(prefix));
        if rows.is_empty() {
            self.partitions.remove(partition);
        }
    }

    /// Read rows matching a key prefix; an empty key scans the table.
    pub(super) fn select(&self, key: &[CqlValue], projection: &Projection) -> Vec<Row> {
        let columns: Vec<Column> = match projection {
            Projection::All => self.def.column_names().collect(),
            Projection::Columns(columns) => columns.clone(),
        };
        let project = |cells: &Cells| {
            let mut row = Row::new();
            for column in &columns {
                if let Some(value) = cells.get(column) {
                    row.set(*column, value.clone());
                }
            }
            row
        };

        if key.is_empty() {
            return self
                .partitions
                .values()
                .flat_map(|rows| rows.values())
                .map(project)
                .collect();
        }

        let (partition, prefix) = key.split_at(self.def.partition_key.len().min(key.len()));
        match self.partitions.get(partition) {
            Some(rows) => rows
                .iter()
                .filter(|(clustering, _)| clustering.starts_with(prefix))
                .map(|(_, cells)| project(cells))
                .collect(),
            None => Vec::new(),
        }
    }

    pub(super) fn len(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::{
        ColumnType, Table, RESERVATIONS_BY_CONFIRMATION, RESERVATIONS_BY_HOTEL_DATE,
    };

    static DESC_TABLE: TableDef = TableDef {
        table: Table::ReservationsByGuest,
        partition_key: &[Column::GuestLastName],
        clustering_key: &[(Column::RoomNumber, ClusteringOrder::Desc)],
        columns: &[
            (Column::GuestLastName, ColumnType::Text),
            (Column::RoomNumber, ColumnType::SmallInt),
        ],
        comment: None,
    };

    fn hotel_row(room: i16, confirmation: &str) -> Vec<(Column, BoundValue)> {
        vec![
            (Column::HotelId, BoundValue::Set("h1".into())),
            (
                Column::StartDate,
                BoundValue::Set(chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().into()),
            ),
            (Column::RoomNumber, BoundValue::Set(room.into())),
            (Column::ConfirmationNumber, BoundValue::Set(confirmation.into())),
        ]
    }

    fn hotel_partition() -> Vec<CqlValue> {
        vec![
            "h1".into(),
            chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().into(),
        ]
    }

    #[test]
    fn test_rows_ordered_by_clustering_key() {
        let mut table = MemoryTable::new(&RESERVATIONS_BY_HOTEL_DATE);
        table.upsert(hotel_row(43, "b")).unwrap();
        table.upsert(hotel_row(7, "c")).unwrap();
        table.upsert(hotel_row(42, "a")).unwrap();

        let rooms: Vec<i16> = table
            .select(&hotel_partition(), &Projection::All)
            .iter()
            .map(|r| r.get_small_int(Column::RoomNumber).unwrap().unwrap())
            .collect();
        assert_eq!(rooms, vec![7, 42, 43]);
    }

    #[test]
    fn test_descending_clustering_order() {
        let mut table = MemoryTable::new(&DESC_TABLE);
        for room in [1i16, 3, 2] {
            table
                .upsert(vec![
                    (Column::GuestLastName, BoundValue::Set("Nguyen".into())),
                    (Column::RoomNumber, BoundValue::Set(room.into())),
                ])
                .unwrap();
        }
        let rooms: Vec<i16> = table
            .select(&["Nguyen".into()], &Projection::All)
            .iter()
            .map(|r| r.get_small_int(Column::RoomNumber).unwrap().unwrap())
            .collect();
        assert_eq!(rooms, vec![3, 2, 1]);
    }

    #[test]
    fn test_unset_keeps_cell_and_null_clears_it() {
        let mut table = MemoryTable::new(&RESERVATIONS_BY_HOTEL_DATE);
        let mut cells = hotel_row(42, "a");
        cells.push((Column::GuestId, BoundValue::Set(uuid::Uuid::nil().into())));
        table.upsert(cells).unwrap();

        let mut unset = hotel_row(42, "a");
        unset.push((Column::GuestId, BoundValue::Unset));
        table.upsert(unset).unwrap();
        let rows = table.select(&hotel_partition(), &Projection::All);
        assert_eq!(rows[0].get_uuid(Column::GuestId).unwrap(), Some(uuid::Uuid::nil()));

        let mut null = hotel_row(42, "a");
        null.push((Column::GuestId, BoundValue::Null));
        table.upsert(null).unwrap();
        let rows = table.select(&hotel_partition(), &Projection::All);
        assert_eq!(rows[0].get_uuid(Column::GuestId).unwrap(), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_upsert_rejects_missing_key() {
        let mut table = MemoryTable::new(&RESERVATIONS_BY_HOTEL_DATE);
        let mut cells = hotel_row(42, "a");
        cells[2].1 = BoundValue::Unset;
        let err = table.upsert(cells).unwrap_err();
        assert!(matches!(err, StorageError::InvalidQuery(_)));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_upsert_rejects_wrong_type() {
        let mut table = MemoryTable::new(&RESERVATIONS_BY_HOTEL_DATE);
        let mut cells = hotel_row(42, "a");
        cells[3].1 = BoundValue::Set(CqlValue::SmallInt(1));
        assert!(matches!(
            table.upsert(cells),
            Err(StorageError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_delete_row_and_empty_partition() {
        let mut table = MemoryTable::new(&RESERVATIONS_BY_HOTEL_DATE);
        table.upsert(hotel_row(42, "a")).unwrap();
        table.upsert(hotel_row(43, "b")).unwrap();

        let mut key = hotel_partition();
        key.push(CqlValue::SmallInt(42));
        table.delete(&key);
        assert_eq!(table.len(), 1);

        table.delete(&hotel_partition());
        assert_eq!(table.len(), 0);
        assert!(table.partitions.is_empty());
    }

    #[test]
    fn test_projection_selects_only_requested_columns() {
        let mut table = MemoryTable::new(&RESERVATIONS_BY_HOTEL_DATE);
        table.upsert(hotel_row(42, "a")).unwrap();
        let rows = table.select(
            &hotel_partition(),
            &Projection::Columns(vec![Column::ConfirmationNumber]),
        );
        assert_eq!(rows[0].len(), 1);
        assert_eq!(
            rows[0].get_text(Column::ConfirmationNumber).unwrap().as_deref(),
            Some("a")
        );
    }

    #[test]
    fn test_check_rejects_restriction_on_non_key() {
        let table = MemoryTable::new(&RESERVATIONS_BY_CONFIRMATION);
        let template = StatementTemplate::new(
            "ks",
            &RESERVATIONS_BY_CONFIRMATION,
            StatementKind::Select {
                projection: Projection::All,
                restrictions: vec![Column::HotelId],
            },
        );
        assert!(matches!(
            table.check(&template),
            Err(StorageError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_check_rejects_insert_without_full_key() {
        let table = MemoryTable::new(&RESERVATIONS_BY_HOTEL_DATE);
        let template = StatementTemplate::new(
            "ks",
            &RESERVATIONS_BY_HOTEL_DATE,
            StatementKind::Insert {
                columns: vec![Column::HotelId, Column::StartDate],
            },
        );
        assert!(table.check(&template).is_err());
        assert!(table
            .check(&StatementTemplate::insert_all("ks", &RESERVATIONS_BY_HOTEL_DATE))
            .is_ok());
    }
}
