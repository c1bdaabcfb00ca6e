//! Prepared statement set of the reservation repository.

use crate::model::Reservation;
use crate::storage::schema::{
    validate_keyspace, Column, ReservationTable, RESERVATIONS_BY_CONFIRMATION,
    RESERVATIONS_BY_HOTEL_DATE,
};
use crate::storage::session::CqlSession;
use crate::storage::statement::{Projection, StatementTemplate};
use crate::storage::value::BoundValue;
use crate::storage::Result;

use super::codec;

/// A statement prepared on a session, with the template it came from.
#[derive(Debug, Clone)]
pub struct Prepared<P> {
    handle: P,
    template: StatementTemplate,
}

impl<P> Prepared<P> {
    pub fn handle(&self) -> &P {
        &self.handle
    }

    pub fn template(&self) -> &StatementTemplate {
        &self.template
    }

    /// Bind a reservation's fields to this statement's markers.
    pub fn bind(&self, reservation: &Reservation) -> Vec<BoundValue> {
        codec::bind(self.template.bind_columns(), reservation)
    }

    /// Bind named values; columns without a value are unset.
    pub fn bind_row(&self, row: &[(Column, BoundValue)]) -> Vec<BoundValue> {
        self.template
            .bind_columns()
            .iter()
            .map(|column| {
                row.iter()
                    .find(|(c, _)| c == column)
                    .map(|(_, v)| v.clone())
                    .unwrap_or(BoundValue::Unset)
            })
            .collect()
    }
}

/// Every statement the repository issues, prepared once at construction and
/// reused for each call.
#[derive(Debug, Clone)]
pub struct ReservationStatements<P> {
    /// `SELECT confirmation_number` by confirmation number.
    pub exists: Prepared<P>,
    /// `SELECT *` by confirmation number.
    pub find_by_confirmation: Prepared<P>,
    /// `SELECT *` of one hotel/date partition, by room.
    pub find_by_hotel_date: Prepared<P>,
    /// `SELECT confirmation_number` of one hotel/date/room slot.
    pub hotel_date_owner: Prepared<P>,
    /// `SELECT *` of every reservation.
    pub list_all: Prepared<P>,
    insert_by_confirmation: Prepared<P>,
    insert_by_hotel_date: Prepared<P>,
    delete_by_confirmation: Prepared<P>,
    delete_by_hotel_date: Prepared<P>,
}

impl<P: Clone + Send + Sync> ReservationStatements<P> {
    /// Prepare the full statement set against `keyspace`.
    pub async fn prepare<S>(session: &S, keyspace: &str) -> Result<Self>
    where
        S: CqlSession<Prepared = P> + ?Sized,
    {
        validate_keyspace(keyspace)?;

        Ok(Self {
            exists: prepare(
                session,
                StatementTemplate::select_by_primary_key(
                    keyspace,
                    &RESERVATIONS_BY_CONFIRMATION,
                    Projection::Columns(vec![Column::ConfirmationNumber]),
                ),
            )
            .await?,
            find_by_confirmation: prepare(
                session,
                StatementTemplate::select_by_primary_key(
                    keyspace,
                    &RESERVATIONS_BY_CONFIRMATION,
                    Projection::All,
                ),
            )
            .await?,
            find_by_hotel_date: prepare(
                session,
                StatementTemplate::select_by_partition(keyspace, &RESERVATIONS_BY_HOTEL_DATE),
            )
            .await?,
            hotel_date_owner: prepare(
                session,
                StatementTemplate::select_by_primary_key(
                    keyspace,
                    &RESERVATIONS_BY_HOTEL_DATE,
                    Projection::Columns(vec![Column::ConfirmationNumber]),
                ),
            )
            .await?,
            list_all: prepare(
                session,
                StatementTemplate::select_all(keyspace, &RESERVATIONS_BY_CONFIRMATION),
            )
            .await?,
            insert_by_confirmation: prepare(
                session,
                StatementTemplate::insert_all(keyspace, ReservationTable::ByConfirmation.def()),
            )
            .await?,
            insert_by_hotel_date: prepare(
                session,
                StatementTemplate::insert_all(keyspace, ReservationTable::ByHotelDate.def()),
            )
            .await?,
            delete_by_confirmation: prepare(
                session,
                StatementTemplate::delete_by_primary_key(
                    keyspace,
                    ReservationTable::ByConfirmation.def(),
                ),
            )
            .await?,
            delete_by_hotel_date: prepare(
                session,
                StatementTemplate::delete_by_primary_key(
                    keyspace,
                    ReservationTable::ByHotelDate.def(),
                ),
            )
            .await?,
        })
    }
}

impl<P> ReservationStatements<P> {
    pub fn insert(&self, table: ReservationTable) -> &Prepared<P> {
        match table {
            ReservationTable::ByConfirmation => &self.insert_by_confirmation,
            ReservationTable::ByHotelDate => &self.insert_by_hotel_date,
        }
    }

    pub fn delete(&self, table: ReservationTable) -> &Prepared<P> {
        match table {
            ReservationTable::ByConfirmation => &self.delete_by_confirmation,
            ReservationTable::ByHotelDate => &self.delete_by_hotel_date,
        }
    }
}

async fn prepare<S, P>(session: &S, template: StatementTemplate) -> Result<Prepared<P>>
where
    S: CqlSession<Prepared = P> + ?Sized,
{
    let handle = session.prepare(&template).await?;
    Ok(Prepared { handle, template })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::storage::bootstrap::SchemaBootstrap;
    use crate::storage::memory::MemorySession;
    use crate::storage::StorageError;

    async fn prepared() -> ReservationStatements<crate::storage::memory::MemoryStatement> {
        let session = MemorySession::new();
        SchemaBootstrap::new("reservation").run(&session).await.unwrap();
        ReservationStatements::prepare(&session, "reservation")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_prepare_rejects_invalid_keyspace() {
        let session = MemorySession::new();
        let err = ReservationStatements::prepare(&session, "Bad Keyspace")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument(_)));
        assert_eq!(session.request_count(), 0);
    }

    #[tokio::test]
    async fn test_prepare_counts_one_request_per_statement() {
        let session = MemorySession::new();
        SchemaBootstrap::new("reservation").run(&session).await.unwrap();
        let before = session.request_count();
        ReservationStatements::prepare(&session, "reservation")
            .await
            .unwrap();
        assert_eq!(session.request_count() - before, 9);
    }

    #[tokio::test]
    async fn test_insert_and_delete_target_their_tables() {
        let statements = prepared().await;
        for table in ReservationTable::ALL {
            assert_eq!(statements.insert(table).template().table(), table.def());
            assert_eq!(statements.delete(table).template().table(), table.def());
        }
        assert_eq!(
            statements.delete(ReservationTable::ByHotelDate).template().cql(),
            r#"DELETE FROM "reservation"."reservations_by_hotel_date" WHERE "hotel_id" = ? AND "start_date" = ? AND "room_number" = ?"#
        );
    }

    #[tokio::test]
    async fn test_every_statement_binds_bare_markers() {
        let statements = prepared().await;
        let mut templates = vec![
            statements.exists.template(),
            statements.find_by_confirmation.template(),
            statements.find_by_hotel_date.template(),
            statements.hotel_date_owner.template(),
            statements.list_all.template(),
        ];
        for table in ReservationTable::ALL {
            templates.push(statements.insert(table).template());
            templates.push(statements.delete(table).template());
        }
        for template in templates {
            let cql = template.cql();
            assert!(!cql.contains("(?)"), "tuple bind marker in {}", cql);
            assert_eq!(
                crate::storage::statement::bind_marker_count(&cql),
                template.bind_columns().len(),
                "{}",
                cql
            );
        }
        assert_eq!(
            statements.hotel_date_owner.template().cql(),
            r#"SELECT "confirmation_number" FROM "reservation"."reservations_by_hotel_date" WHERE "hotel_id" = ? AND "start_date" = ? AND "room_number" = ?"#
        );
    }

    #[tokio::test]
    async fn test_bind_row_fills_missing_columns_with_unset() {
        let statements = prepared().await;
        let insert = statements.insert(ReservationTable::ByConfirmation);
        let values = insert.bind_row(&[
            (Column::RoomNumber, BoundValue::Set(7i16.into())),
            (Column::ConfirmationNumber, BoundValue::Set("c-1".into())),
        ]);
        assert_eq!(
            values,
            vec![
                BoundValue::Set("c-1".into()),
                BoundValue::Unset,
                BoundValue::Unset,
                BoundValue::Unset,
                BoundValue::Set(7i16.into()),
                BoundValue::Unset,
            ]
        );
    }

    #[tokio::test]
    async fn test_bind_uses_statement_columns() {
        let statements = prepared().await;
        let reservation = Reservation {
            hotel_id: Some("h1".into()),
            start_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..Default::default()
        };
        let values = statements.find_by_hotel_date.bind(&reservation);
        assert_eq!(values.len(), 2);
        assert!(values.iter().all(|v| v.as_value().is_some()));
    }
}
