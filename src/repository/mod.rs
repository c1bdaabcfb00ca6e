//! Reservation repository.
//!
//! [`ReservationRepository`] is the facade the service layer calls. Its CQL
//! implementation keeps two denormalized tables in step:
//!
//! | Table | Partition key | Clustering key |
//! |---|---|---|
//! | `reservations_by_confirmation` | `confirmation_number` | |
//! | `reservations_by_hotel_date` | `(hotel_id, start_date)` | `room_number ASC` |
//!
//! Neither table is authoritative. Every write goes to both in one logged
//! batch through the [`MultiTableWriter`].

pub mod codec;
mod cql;
pub mod statements;
pub mod writer;


use async_trait::async_trait;
use chrono::NaiveDate;

use crate::model::Reservation;
use crate::storage::Result;

pub use cql::CqlReservationRepository;
pub use statements::{Prepared, ReservationStatements};
pub use writer::{BatchWriter, MultiTableWriter, PlannedWrite, WritePlan};

/// Reservation access operations.
///
/// Argument validation happens before any request reaches storage: an empty
/// confirmation number or hotel id is `StorageError::InvalidArgument`.
/// "Not found" is never an error.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Whether a reservation with this confirmation number exists.
    async fn exists(&self, confirmation_number: &str) -> Result<bool>;

    async fn find_by_confirmation(&self, confirmation_number: &str) -> Result<Option<Reservation>>;

    /// Insert or fully overwrite a reservation and return its confirmation
    /// number, generating one when absent.
    ///
    /// `None` fields are left unset, never nulled.
    async fn upsert(&self, reservation: Reservation) -> Result<String>;

    /// Delete a reservation. Deleting an unknown confirmation number is a no-op.
    async fn delete(&self, confirmation_number: &str) -> Result<()>;

    /// Reservations of a hotel starting on `date`, ordered by room number.
    async fn find_by_hotel_and_date(&self, hotel_id: &str, date: NaiveDate) -> Result<Vec<Reservation>>;

    /// Every reservation. Unbounded.
    async fn list_all(&self) -> Result<Vec<Reservation>>;
}
