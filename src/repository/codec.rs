//! Row codec: [`Reservation`] to and from table rows.

use crate::model::Reservation;
use crate::storage::schema::{Column, ReservationTable};
use crate::storage::value::{BoundValue, CqlValue, Row};
use crate::storage::{Result, StorageError};

/// Value a reservation binds to `column`. Absent fields are unset.
///
/// Columns a reservation does not carry (guest profile columns) are unset.
pub fn value_of(column: Column, reservation: &Reservation) -> BoundValue {
    match column {
        Column::ConfirmationNumber => {
            BoundValue::unset_if_none(reservation.confirmation_number.clone())
        }
        Column::HotelId => BoundValue::unset_if_none(reservation.hotel_id.clone()),
        Column::StartDate => BoundValue::unset_if_none(reservation.start_date),
        Column::EndDate => BoundValue::unset_if_none(reservation.end_date),
        Column::RoomNumber => BoundValue::unset_if_none(reservation.room_number),
        Column::GuestId => BoundValue::unset_if_none(reservation.guest_id),
        Column::GuestLastName
        | Column::FirstName
        | Column::LastName
        | Column::Title
        | Column::Emails
        | Column::PhoneNumbers
        | Column::Addresses => BoundValue::Unset,
    }
}

/// Values for a statement's bind columns, in order.
pub fn bind(columns: &[Column], reservation: &Reservation) -> Vec<BoundValue> {
    columns.iter().map(|c| value_of(*c, reservation)).collect()
}

/// The row a reservation projects to in one table, in declaration order.
pub fn to_projection(table: ReservationTable, reservation: &Reservation) -> Vec<(Column, BoundValue)> {
    table
        .def()
        .column_names()
        .map(|c| (c, value_of(c, reservation)))
        .collect()
}

/// Primary-key values of the row a reservation maps to in one table.
///
/// Every key component must be present; text components must be non-empty.
pub fn primary_key(table: ReservationTable, reservation: &Reservation) -> Result<Vec<BoundValue>> {
    let def = table.def();
    def.primary_key()
        .into_iter()
        .map(|column| match value_of(column, reservation) {
            BoundValue::Set(CqlValue::Text(s)) if s.is_empty() => {
                Err(StorageError::InvalidArgument(format!(
                    "{} must not be empty to write {}",
                    column.name(),
                    def.name()
                )))
            }
            BoundValue::Set(value) => Ok(BoundValue::Set(value)),
            BoundValue::Null | BoundValue::Unset => Err(StorageError::InvalidArgument(format!(
                "{} is required to write {}",
                column.name(),
                def.name()
            ))),
        })
        .collect()
}

/// Rebuild a reservation from a row of either reservation table.
///
/// Columns missing from the row leave the field `None`.
pub fn from_row(row: &Row) -> Result<Reservation> {
    Ok(Reservation {
        confirmation_number: row.get_text(Column::ConfirmationNumber)?,
        hotel_id: row.get_text(Column::HotelId)?,
        start_date: row.get_date(Column::StartDate)?,
        end_date: row.get_date(Column::EndDate)?,
        room_number: row.get_small_int(Column::RoomNumber)?,
        guest_id: row.get_uuid(Column::GuestId)?,
    })
}
