//! Atomic multi-table writer.
//!
//! Every logical write of a reservation touches both denormalized tables and
//! is sent as exactly one logged batch. The batch contents are computed first
//! as a [`WritePlan`], a plain value, and only then bound to prepared
//! statements and executed.
//!
//! The engine offers no isolation: a concurrent reader may observe one table
//! updated before the other. Failures surface unmodified; there is no retry
//! and no compensation here.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::model::Reservation;
use crate::storage::schema::{Column, ReservationTable};
use crate::storage::session::CqlSession;
use crate::storage::statement::LoggedBatch;
use crate::storage::value::{BoundValue, CqlValue};
use crate::storage::{Result, StorageError};

use super::codec;
use super::statements::ReservationStatements;

/// One statement of a planned batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedWrite {
    /// Upsert the reservation's row of `table`.
    Insert {
        table: ReservationTable,
        row: Vec<(Column, BoundValue)>,
    },
    /// Remove the row of `table` at primary key `key`.
    Delete {
        table: ReservationTable,
        key: Vec<BoundValue>,
    },
}

impl PlannedWrite {
    pub fn table(&self) -> ReservationTable {
        match self {
            PlannedWrite::Insert { table, .. } | PlannedWrite::Delete { table, .. } => *table,
        }
    }
}

/// Statements of one logical write, executed as one logged batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WritePlan {
    writes: Vec<PlannedWrite>,
}

impl WritePlan {
    /// Insert the reservation into every maintained table.
    ///
    /// The confirmation number must already be assigned.
    pub fn upsert(reservation: &Reservation) -> Result<Self> {
        let mut writes = Vec::with_capacity(ReservationTable::ALL.len());
        for table in ReservationTable::ALL {
            codec::primary_key(table, reservation)?;
            writes.push(PlannedWrite::Insert {
                table,
                row: codec::to_projection(table, reservation),
            });
        }
        Ok(Self { writes })
    }

    /// Also remove the hotel/date row `previous` occupied, when its key
    /// differs from every row this plan inserts.
    pub fn relocate_from(&mut self, previous: &Reservation) -> Result<()> {
        let table = ReservationTable::ByHotelDate;
        let key = codec::primary_key(table, previous)?;
        let overwritten = self.writes.iter().any(|write| {
            matches!(write, PlannedWrite::Insert { table: t, row } if *t == table && primary_key_of_row(table, row) == key)
        });
        if !overwritten {
            self.writes.insert(0, PlannedWrite::Delete { table, key });
        }
        Ok(())
    }

    /// Delete the reservation from every maintained table.
    pub fn delete(reservation: &Reservation) -> Result<Self> {
        let writes = ReservationTable::ALL
            .into_iter()
            .map(|table| {
                Ok(PlannedWrite::Delete {
                    table,
                    key: codec::primary_key(table, reservation)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { writes })
    }

    /// Delete the reservation from `table` only.
    pub fn delete_from(table: ReservationTable, reservation: &Reservation) -> Result<Self> {
        Ok(Self {
            writes: vec![PlannedWrite::Delete {
                table,
                key: codec::primary_key(table, reservation)?,
            }],
        })
    }

    /// Drop every write to `table`.
    pub fn without(mut self, table: ReservationTable) -> Self {
        self.writes.retain(|write| write.table() != table);
        self
    }

    pub fn writes(&self) -> &[PlannedWrite] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_writes(self) -> Vec<PlannedWrite> {
        self.writes
    }
}

fn primary_key_of_row(table: ReservationTable, row: &[(Column, BoundValue)]) -> Vec<BoundValue> {
    table
        .def()
        .primary_key()
        .into_iter()
        .map(|column| {
            row.iter()
                .find(|(c, _)| *c == column)
                .map(|(_, v)| v.clone())
                .unwrap_or(BoundValue::Unset)
        })
        .collect()
}

/// Keeps the denormalized reservation tables consistent.
#[async_trait]
pub trait MultiTableWriter: Send + Sync {
    /// Write the reservation to every table in one atomic batch.
    ///
    /// Assigns a random v4 UUID confirmation number when none is set and
    /// returns the confirmation number written.
    async fn upsert_atomic(&self, reservation: Reservation) -> Result<String>;

    /// Remove the reservation from every table in one atomic batch.
    ///
    /// The reservation must carry a confirmation number. Without a complete
    /// hotel/date key only the confirmation row is deleted.
    async fn delete_atomic(&self, reservation: &Reservation) -> Result<()>;
}

/// [`MultiTableWriter`] over a CQL session with prepared statements.
pub struct BatchWriter<S: CqlSession> {
    session: Arc<S>,
    statements: Arc<ReservationStatements<S::Prepared>>,
}

impl<S: CqlSession> Clone for BatchWriter<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            statements: Arc::clone(&self.statements),
        }
    }
}

impl<S: CqlSession> BatchWriter<S> {
    pub fn new(session: Arc<S>, statements: Arc<ReservationStatements<S::Prepared>>) -> Self {
        Self {
            session,
            statements,
        }
    }

    /// Execute a plan as one logged batch.
    pub async fn execute(&self, plan: WritePlan) -> Result<()> {
        let mut batch = LoggedBatch::new();
        for write in plan.into_writes() {
            match write {
                PlannedWrite::Insert { table, row } => {
                    let insert = self.statements.insert(table);
                    batch.add(insert.handle().clone(), insert.bind_row(&row));
                }
                PlannedWrite::Delete { table, key } => {
                    batch.add(self.statements.delete(table).handle().clone(), key);
                }
            }
        }

        let statements = batch.len();
        self.session.batch(batch).await.inspect_err(|e| {
            error!(error = %e, statements, "Logged batch failed");
        })
    }

    /// Whether the hotel/date slot of `reservation` holds `confirmation_number`.
    async fn owns_hotel_date_slot(
        &self,
        reservation: &Reservation,
        confirmation_number: &str,
    ) -> Result<bool> {
        let key = codec::primary_key(ReservationTable::ByHotelDate, reservation)?;
        let owner = self
            .session
            .execute(self.statements.hotel_date_owner.handle(), key)
            .await?
            .one();
        match owner {
            Some(row) => Ok(row.get_text(Column::ConfirmationNumber)?.as_deref()
                == Some(confirmation_number)),
            None => Ok(false),
        }
    }

    /// The stored version of `reservation`, if its hotel/date row must move.
    async fn relocated(&self, reservation: &Reservation, confirmation_number: &str) -> Result<Option<Reservation>> {
        let stored = self
            .session
            .execute(
                self.statements.find_by_confirmation.handle(),
                vec![BoundValue::Set(CqlValue::from(confirmation_number))],
            )
            .await?
            .one();
        let Some(row) = stored else {
            return Ok(None);
        };

        let previous = codec::from_row(&row)?;
        if previous.hotel_date_key().is_none() || previous.hotel_date_key() == reservation.hotel_date_key() {
            return Ok(None);
        }

        if self.owns_hotel_date_slot(&previous, confirmation_number).await? {
            Ok(Some(previous))
        } else {
            warn!(
                confirmation_number,
                "Previous hotel/date slot is held by another reservation; leaving it in place"
            );
            Ok(None)
        }
    }
}

#[async_trait]
impl<S> MultiTableWriter for BatchWriter<S>
where
    S: CqlSession + 'static,
{
    async fn upsert_atomic(&self, mut reservation: Reservation) -> Result<String> {
        let (confirmation_number, generated) = match &reservation.confirmation_number {
            Some(id) => (id.clone(), false),
            None => {
                let id = Uuid::new_v4().to_string();
                reservation.confirmation_number = Some(id.clone());
                (id, true)
            }
        };

        let mut plan = WritePlan::upsert(&reservation)?;
        // A freshly generated id has no stored version to relocate from.
        if !generated {
            if let Some(previous) = self.relocated(&reservation, &confirmation_number).await? {
                debug!(confirmation_number = %confirmation_number, "Relocating hotel/date row");
                plan.relocate_from(&previous)?;
            }
        }

        self.execute(plan).await?;
        Ok(confirmation_number)
    }

    async fn delete_atomic(&self, reservation: &Reservation) -> Result<()> {
        let confirmation_number = reservation
            .confirmation_number
            .as_deref()
            .ok_or_else(|| StorageError::InvalidArgument("confirmation_number is required".to_string()))?;

        if reservation.hotel_date_key().is_none() {
            warn!(
                confirmation_number,
                "Reservation has no hotel/date key; deleting confirmation row only"
            );
            let plan = WritePlan::delete_from(ReservationTable::ByConfirmation, reservation)?;
            return self.execute(plan).await;
        }

        let plan = WritePlan::delete(reservation)?;

        let plan = if self.owns_hotel_date_slot(reservation, confirmation_number).await? {
            plan
        } else {
            warn!(
                confirmation_number,
                "Hotel/date slot is held by another reservation; deleting confirmation row only"
            );
            plan.without(ReservationTable::ByHotelDate)
        };
        self.execute(plan).await
    }
}
