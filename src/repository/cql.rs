//! CQL-backed reservation repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use crate::model::Reservation;
use crate::storage::session::CqlSession;
use crate::storage::value::{BoundValue, CqlValue};
use crate::storage::{Result, StorageError};

use super::codec;
use super::statements::ReservationStatements;
use super::writer::{BatchWriter, MultiTableWriter};
use super::ReservationRepository;

/// Reservation repository over any [`CqlSession`].
///
/// Holds one shared session and the statements prepared on it. Reads are
/// single statements; writes go through the [`BatchWriter`].
pub struct CqlReservationRepository<S: CqlSession> {
    session: Arc<S>,
    statements: Arc<ReservationStatements<S::Prepared>>,
    writer: BatchWriter<S>,
}

impl<S: CqlSession> CqlReservationRepository<S> {
    /// Prepare every statement against `keyspace`. The keyspace and its
    /// tables must already exist.
    pub async fn new(session: Arc<S>, keyspace: &str) -> Result<Self> {
        let statements = Arc::new(ReservationStatements::prepare(session.as_ref(), keyspace).await?);
        let writer = BatchWriter::new(Arc::clone(&session), Arc::clone(&statements));
        Ok(Self {
            session,
            statements,
            writer,
        })
    }

    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    pub fn writer(&self) -> &BatchWriter<S> {
        &self.writer
    }
}

fn require_non_empty(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidArgument(format!("{} must not be empty", name)));
    }
    Ok(())
}

fn text(value: &str) -> BoundValue {
    BoundValue::Set(CqlValue::from(value))
}

#[async_trait]
impl<S> ReservationRepository for CqlReservationRepository<S>
where
    S: CqlSession + 'static,
{
    async fn exists(&self, confirmation_number: &str) -> Result<bool> {
        require_non_empty("confirmation_number", confirmation_number)?;
        let rows = self
            .session
            .execute(self.statements.exists.handle(), vec![text(confirmation_number)])
            .await?;
        debug!(confirmation_number, found = !rows.is_empty(), "exists");
        Ok(!rows.is_empty())
    }

    async fn find_by_confirmation(&self, confirmation_number: &str) -> Result<Option<Reservation>> {
        require_non_empty("confirmation_number", confirmation_number)?;
        let row = self
            .session
            .execute(
                self.statements.find_by_confirmation.handle(),
                vec![text(confirmation_number)],
            )
            .await?
            .one();
        debug!(confirmation_number, found = row.is_some(), "find_by_confirmation");
        row.as_ref().map(codec::from_row).transpose()
    }

    async fn upsert(&self, reservation: Reservation) -> Result<String> {
        let confirmation_number = self.writer.upsert_atomic(reservation).await?;
        debug!(confirmation_number = %confirmation_number, "upsert");
        Ok(confirmation_number)
    }

    async fn delete(&self, confirmation_number: &str) -> Result<()> {
        require_non_empty("confirmation_number", confirmation_number)?;
        match self.find_by_confirmation(confirmation_number).await? {
            Some(reservation) => {
                self.writer.delete_atomic(&reservation).await?;
                debug!(confirmation_number, "delete");
            }
            None => {
                debug!(confirmation_number, "delete of unknown reservation ignored");
            }
        }
        Ok(())
    }

    async fn find_by_hotel_and_date(&self, hotel_id: &str, date: NaiveDate) -> Result<Vec<Reservation>> {
        require_non_empty("hotel_id", hotel_id)?;
        let rows = self
            .session
            .execute(
                self.statements.find_by_hotel_date.handle(),
                vec![text(hotel_id), BoundValue::Set(CqlValue::from(date))],
            )
            .await?;
        debug!(hotel_id, %date, rows = rows.len(), "find_by_hotel_and_date");
        rows.rows().iter().map(codec::from_row).collect()
    }

    async fn list_all(&self) -> Result<Vec<Reservation>> {
        let rows = self
            .session
            .execute(self.statements.list_all.handle(), Vec::new())
            .await?;
        debug!(rows = rows.len(), "list_all");
        rows.rows().iter().map(codec::from_row).collect()
    }
}
