//! Keyspace schema definitions.
//!
//! Table and column identifiers implement [`sea_query::Iden`] for type-safe
//! statement building. Each [`TableDef`] records the primary-key layout of one
//! denormalized table; statement builders and schema bootstrap both derive
//! their CQL from these definitions.

use std::fmt::{self, Write as _};

use sea_query::Iden;

use super::value::CqlValue;
use super::{Result, StorageError};

/// Tables of the reservation keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Iden)]
pub enum Table {
    #[iden = "reservations_by_confirmation"]
    ReservationsByConfirmation,
    #[iden = "reservations_by_hotel_date"]
    ReservationsByHotelDate,
    #[iden = "reservations_by_guest"]
    ReservationsByGuest,
    #[iden = "guests"]
    Guests,
}

/// Columns used across the reservation keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    ConfirmationNumber,
    HotelId,
    StartDate,
    EndDate,
    RoomNumber,
    GuestId,
    GuestLastName,
    FirstName,
    LastName,
    Title,
    Emails,
    PhoneNumbers,
    Addresses,
}

impl Column {
    pub const ALL: [Column; 13] = [
        Column::ConfirmationNumber,
        Column::HotelId,
        Column::StartDate,
        Column::EndDate,
        Column::RoomNumber,
        Column::GuestId,
        Column::GuestLastName,
        Column::FirstName,
        Column::LastName,
        Column::Title,
        Column::Emails,
        Column::PhoneNumbers,
        Column::Addresses,
    ];

    /// CQL column name.
    pub fn name(&self) -> &'static str {
        match self {
            Column::ConfirmationNumber => "confirmation_number",
            Column::HotelId => "hotel_id",
            Column::StartDate => "start_date",
            Column::EndDate => "end_date",
            Column::RoomNumber => "room_number",
            Column::GuestId => "guest_id",
            Column::GuestLastName => "guest_last_name",
            Column::FirstName => "first_name",
            Column::LastName => "last_name",
            Column::Title => "title",
            Column::Emails => "emails",
            Column::PhoneNumbers => "phone_numbers",
            Column::Addresses => "addresses",
        }
    }

    /// Resolve a column from its CQL name.
    pub fn from_name(name: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl Iden for Column {
    fn unquoted(&self, s: &mut dyn fmt::Write) {
        let _ = s.write_str(self.name());
    }
}

/// CQL column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Date,
    SmallInt,
    Uuid,
    Set(&'static ColumnType),
    List(&'static ColumnType),
    Map(&'static ColumnType, &'static ColumnType),
    /// A frozen user-defined type, by name.
    Frozen(&'static str),
}

impl ColumnType {
    /// CQL type expression, e.g. `map<text, frozen<address>>`.
    pub fn cql(&self) -> String {
        match self {
            ColumnType::Text => "text".to_string(),
            ColumnType::Date => "date".to_string(),
            ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::Uuid => "uuid".to_string(),
            ColumnType::Set(inner) => format!("set<{}>", inner.cql()),
            ColumnType::List(inner) => format!("list<{}>", inner.cql()),
            ColumnType::Map(key, value) => format!("map<{}, {}>", key.cql(), value.cql()),
            ColumnType::Frozen(udt) => format!("frozen<{}>", udt),
        }
    }

    /// Whether a scalar value can be stored in a column of this type.
    pub fn accepts(&self, value: &CqlValue) -> bool {
        matches!(
            (self, value),
            (ColumnType::Text, CqlValue::Text(_))
                | (ColumnType::Date, CqlValue::Date(_))
                | (ColumnType::SmallInt, CqlValue::SmallInt(_))
                | (ColumnType::Uuid, CqlValue::Uuid(_))
        )
    }
}

/// Sort order of a clustering column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusteringOrder {
    Asc,
    Desc,
}

impl ClusteringOrder {
    fn cql(&self) -> &'static str {
        match self {
            ClusteringOrder::Asc => "ASC",
            ClusteringOrder::Desc => "DESC",
        }
    }
}

/// Layout of one table: key structure and column types.
#[derive(Debug, PartialEq, Eq)]
pub struct TableDef {
    pub table: Table,
    /// Partition-key columns, in key order.
    pub partition_key: &'static [Column],
    /// Clustering columns, in key order, with their sort order.
    pub clustering_key: &'static [(Column, ClusteringOrder)],
    /// Every column of the table (keys included) in declaration order.
    pub columns: &'static [(Column, ColumnType)],
    pub comment: Option<&'static str>,
}

impl TableDef {
    pub fn name(&self) -> String {
        self.table.to_string()
    }

    pub fn column_type(&self, column: Column) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, t)| *t)
    }

    pub fn column_names(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().map(|(c, _)| *c)
    }

    pub fn is_partition_key(&self, column: Column) -> bool {
        self.partition_key.contains(&column)
    }

    /// Clustering columns without their sort order.
    pub fn clustering_columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.clustering_key.iter().map(|(c, _)| *c)
    }

    /// Partition key followed by clustering columns.
    pub fn primary_key(&self) -> Vec<Column> {
        self.partition_key
            .iter()
            .copied()
            .chain(self.clustering_columns())
            .collect()
    }

    pub fn is_primary_key(&self, column: Column) -> bool {
        self.is_partition_key(column) || self.clustering_columns().any(|c| c == column)
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this table.
    pub fn create_cql(&self, keyspace: &str) -> String {
        let mut cql = format!("CREATE TABLE IF NOT EXISTS {}.{} (\n", keyspace, self.name());
        for (column, column_type) in self.columns {
            let _ = writeln!(cql, "    {} {},", column.name(), column_type.cql());
        }

        let partition: Vec<&str> = self.partition_key.iter().map(|c| c.name()).collect();
        let mut key_parts = vec![match partition.as_slice() {
            [single] => (*single).to_owned(),
            many => format!("({})", many.join(", ")),
        }];
        key_parts.extend(self.clustering_columns().map(|c| c.name().to_string()));
        let _ = writeln!(cql, "    PRIMARY KEY ({})", key_parts.join(", "));
        cql.push(')');

        let mut options = Vec::new();
        if !self.clustering_key.is_empty() {
            let order: Vec<String> = self
                .clustering_key
                .iter()
                .map(|(c, o)| format!("{} {}", c.name(), o.cql()))
                .collect();
            options.push(format!("CLUSTERING ORDER BY ({})", order.join(", ")));
        }
        if let Some(comment) = self.comment {
            options.push(format!("comment = '{}'", comment.replace('\'', "''")));
        }
        if !options.is_empty() {
            cql.push_str(" WITH ");
            cql.push_str(&options.join(" AND "));
        }
        cql
    }
}

/// A user-defined type.
#[derive(Debug, PartialEq, Eq)]
pub struct UdtDef {
    pub name: &'static str,
    pub fields: &'static [(&'static str, ColumnType)],
}

impl UdtDef {
    /// `CREATE TYPE IF NOT EXISTS` statement for this type.
    pub fn create_cql(&self, keyspace: &str) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(name, t)| format!("    {} {}", name, t.cql()))
            .collect();
        format!(
            "CREATE TYPE IF NOT EXISTS {}.{} (\n{}\n)",
            keyspace,
            self.name,
            fields.join(",\n")
        )
    }
}

pub static ADDRESS_TYPE: UdtDef = UdtDef {
    name: "address",
    fields: &[
        ("street", ColumnType::Text),
        ("city", ColumnType::Text),
        ("state_or_province", ColumnType::Text),
        ("postal_code", ColumnType::Text),
        ("country", ColumnType::Text),
    ],
};

/// Point lookup and existence check by confirmation number.
pub static RESERVATIONS_BY_CONFIRMATION: TableDef = TableDef {
    table: Table::ReservationsByConfirmation,
    partition_key: &[Column::ConfirmationNumber],
    clustering_key: &[],
    columns: &[
        (Column::ConfirmationNumber, ColumnType::Text),
        (Column::HotelId, ColumnType::Text),
        (Column::StartDate, ColumnType::Date),
        (Column::EndDate, ColumnType::Date),
        (Column::RoomNumber, ColumnType::SmallInt),
        (Column::GuestId, ColumnType::Uuid),
    ],
    comment: None,
};

/// All reservations of a hotel on a start date, by room.
pub static RESERVATIONS_BY_HOTEL_DATE: TableDef = TableDef {
    table: Table::ReservationsByHotelDate,
    partition_key: &[Column::HotelId, Column::StartDate],
    clustering_key: &[(Column::RoomNumber, ClusteringOrder::Asc)],
    columns: &[
        (Column::HotelId, ColumnType::Text),
        (Column::StartDate, ColumnType::Date),
        (Column::EndDate, ColumnType::Date),
        (Column::RoomNumber, ColumnType::SmallInt),
        (Column::ConfirmationNumber, ColumnType::Text),
        (Column::GuestId, ColumnType::Uuid),
    ],
    comment: Some("Q7. Find reservations by hotel and date"),
};

pub static RESERVATIONS_BY_GUEST: TableDef = TableDef {
    table: Table::ReservationsByGuest,
    partition_key: &[Column::GuestLastName],
    clustering_key: &[(Column::HotelId, ClusteringOrder::Asc)],
    columns: &[
        (Column::GuestLastName, ColumnType::Text),
        (Column::HotelId, ColumnType::Text),
        (Column::StartDate, ColumnType::Date),
        (Column::EndDate, ColumnType::Date),
        (Column::RoomNumber, ColumnType::SmallInt),
        (Column::ConfirmationNumber, ColumnType::Text),
        (Column::GuestId, ColumnType::Uuid),
    ],
    comment: Some("Q8. Find reservations by guest name"),
};

pub static GUESTS: TableDef = TableDef {
    table: Table::Guests,
    partition_key: &[Column::GuestId],
    clustering_key: &[],
    columns: &[
        (Column::GuestId, ColumnType::Uuid),
        (Column::FirstName, ColumnType::Text),
        (Column::LastName, ColumnType::Text),
        (Column::Title, ColumnType::Text),
        (Column::Emails, ColumnType::Set(&ColumnType::Text)),
        (Column::PhoneNumbers, ColumnType::List(&ColumnType::Text)),
        (
            Column::Addresses,
            ColumnType::Map(&ColumnType::Text, &ColumnType::Frozen("address")),
        ),
        (Column::ConfirmationNumber, ColumnType::Text),
    ],
    comment: Some("Q9. Find guest by ID"),
};

/// Every table of the keyspace, in creation order.
pub static ALL_TABLES: [&TableDef; 4] = [
    &RESERVATIONS_BY_HOTEL_DATE,
    &RESERVATIONS_BY_CONFIRMATION,
    &RESERVATIONS_BY_GUEST,
    &GUESTS,
];

/// The denormalized tables kept in sync for every reservation write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservationTable {
    ByConfirmation,
    ByHotelDate,
}

impl ReservationTable {
    pub const ALL: [ReservationTable; 2] =
        [ReservationTable::ByConfirmation, ReservationTable::ByHotelDate];

    pub fn def(&self) -> &'static TableDef {
        match self {
            ReservationTable::ByConfirmation => &RESERVATIONS_BY_CONFIRMATION,
            ReservationTable::ByHotelDate => &RESERVATIONS_BY_HOTEL_DATE,
        }
    }
}

/// Maximum keyspace name length accepted by Cassandra.
const MAX_KEYSPACE_LEN: usize = 48;

/// Validate a keyspace name.
///
/// Names are restricted to lowercase ASCII letters, digits and underscores so
/// the quoted identifiers of prepared statements match the unquoted DDL.
pub fn validate_keyspace(keyspace: &str) -> Result<()> {
    let valid = !keyspace.is_empty()
        && keyspace.len() <= MAX_KEYSPACE_LEN
        && keyspace.starts_with(|c: char| c.is_ascii_lowercase())
        && keyspace
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidArgument(format!(
            "Invalid keyspace name '{}': expected 1-{} lowercase letters, digits or underscores",
            keyspace, MAX_KEYSPACE_LEN
        )))
    }
}
