//! Reservation domain record.

use chrono::NaiveDate;
use uuid::Uuid;

/// A hotel room reservation.
///
/// Every field is optional at the type level. A `None` field is *unset*: it is
/// never written as a null, so upserting a partially populated record leaves
/// the stored value of that column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reservation {
    /// Globally unique identifier; generated on upsert when absent.
    pub confirmation_number: Option<String>,
    pub hotel_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub room_number: Option<i16>,
    pub guest_id: Option<Uuid>,
}

impl Reservation {
    /// Build a fully populated reservation without a confirmation number.
    pub fn new(
        hotel_id: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        room_number: i16,
        guest_id: Uuid,
    ) -> Self {
        Self {
            confirmation_number: None,
            hotel_id: Some(hotel_id.into()),
            start_date: Some(start_date),
            end_date: Some(end_date),
            room_number: Some(room_number),
            guest_id: Some(guest_id),
        }
    }

    pub fn with_confirmation_number(mut self, confirmation_number: impl Into<String>) -> Self {
        self.confirmation_number = Some(confirmation_number.into());
        self
    }

    /// Key of the `reservations_by_hotel_date` row this reservation maps to,
    /// if all of its components are known.
    pub fn hotel_date_key(&self) -> Option<(&str, NaiveDate, i16)> {
        Some((
            self.hotel_id.as_deref()?,
            self.start_date?,
            self.room_number?,
        ))
    }
}
