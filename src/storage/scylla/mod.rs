//! ScyllaDB / Apache Cassandra engine.
//!
//! Wraps a driver [`Session`] behind [`CqlSession`]. Statement templates are
//! rendered to CQL and prepared on the cluster; bound values travel as
//! `MaybeUnset<Option<CqlValue>>` so unset fields never write tombstones.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta};
use scylla::client::execution_profile::ExecutionProfile;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::errors::{DbError, ExecutionError, PrepareError, RequestAttemptError, WriteType};
use scylla::policies::load_balancing::DefaultPolicy;
use scylla::statement::batch::{Batch, BatchType};
use scylla::statement::prepared::PreparedStatement;
use scylla::value::{CqlDate, CqlValue as DriverValue, MaybeUnset, Row as DriverRow};
use tracing::{debug, error, info};

use crate::config::ScyllaConfig;

use super::schema::Column;
use super::session::{CqlSession, SchemaChange};
use super::statement::{LoggedBatch, StatementKind, StatementTemplate};
use super::value::{BoundValue, CqlValue, ResultSet, Row};
use super::{Result, StorageError};

/// `CqlDate` counts days with the Unix epoch at 2^31.
const CQL_DATE_EPOCH_OFFSET: i64 = 1 << 31;

type DriverBinding = MaybeUnset<Option<DriverValue>>;

/// Statement prepared on a [`ScyllaSession`].
#[derive(Debug, Clone)]
pub struct ScyllaStatement {
    prepared: PreparedStatement,
    template: Arc<StatementTemplate>,
}

/// Shared connection to a ScyllaDB or Cassandra cluster.
pub struct ScyllaSession {
    session: Session,
}

impl ScyllaSession {
    /// Connect to the cluster described by `config`.
    pub async fn connect(config: &ScyllaConfig) -> Result<Self> {
        let nodes = config.known_nodes();
        info!(
            nodes = ?nodes,
            local_datacenter = ?config.local_datacenter,
            "Connecting to Scylla cluster"
        );

        let mut builder = SessionBuilder::new().known_nodes(&nodes);
        if let Some(datacenter) = &config.local_datacenter {
            let policy = DefaultPolicy::builder()
                .prefer_datacenter(datacenter.clone())
                .build();
            let profile = ExecutionProfile::builder()
                .load_balancing_policy(policy)
                .build();
            builder = builder.default_execution_profile_handle(profile.into_handle());
        }

        let session = builder.build().await.map_err(|e| {
            error!(error = %e, "Failed to connect to Scylla cluster");
            StorageError::Connection(e.to_string())
        })?;
        Ok(Self::from_session(session))
    }

    pub fn from_session(session: Session) -> Self {
        Self { session }
    }

    pub fn inner(&self) -> &Session {
        &self.session
    }
}

#[async_trait]
impl CqlSession for ScyllaSession {
    type Prepared = ScyllaStatement;

    async fn prepare(&self, template: &StatementTemplate) -> Result<ScyllaStatement> {
        let cql = template.cql();
        debug!(cql = %cql, "Preparing statement");
        let prepared = self.session.prepare(cql).await.map_err(prepare_error)?;
        Ok(ScyllaStatement {
            prepared,
            template: Arc::new(template.clone()),
        })
    }

    async fn execute(&self, statement: &ScyllaStatement, values: Vec<BoundValue>) -> Result<ResultSet> {
        let values = to_driver_values(values)?;
        let result = self
            .session
            .execute_unpaged(&statement.prepared, values)
            .await
            .map_err(execution_error)?;

        if !matches!(statement.template.kind(), StatementKind::Select { .. }) {
            return Ok(ResultSet::empty());
        }

        let rows = result
            .into_rows_result()
            .map_err(|e| StorageError::Driver(e.to_string()))?;
        let columns: Vec<Option<Column>> = rows
            .column_specs()
            .iter()
            .map(|spec| Column::from_name(spec.name()))
            .collect();

        let mut out = Vec::new();
        for row in rows
            .rows::<DriverRow>()
            .map_err(|e| StorageError::Driver(e.to_string()))?
        {
            let row = row.map_err(|e| StorageError::Driver(e.to_string()))?;
            out.push(from_driver_row(&columns, row)?);
        }
        Ok(ResultSet::new(out))
    }

    async fn batch(&self, batch: LoggedBatch<ScyllaStatement>) -> Result<()> {
        let mut logged = Batch::new(BatchType::Logged);
        let mut values = Vec::with_capacity(batch.len());
        for (statement, bound) in batch.into_statements() {
            logged.append_statement(statement.prepared);
            values.push(to_driver_values(bound)?);
        }
        self.session
            .batch(&logged, values)
            .await
            .map_err(batch_error)?;
        Ok(())
    }

    async fn apply_schema(&self, change: &SchemaChange) -> Result<()> {
        let cql = change.cql();
        debug!(cql = %cql, "Applying schema change");
        self.session
            .query_unpaged(cql, ())
            .await
            .map_err(execution_error)?;
        Ok(())
    }
}

fn to_driver_values(values: Vec<BoundValue>) -> Result<Vec<DriverBinding>> {
    values
        .into_iter()
        .map(|value| {
            Ok(match value {
                BoundValue::Set(v) => MaybeUnset::Set(Some(to_driver_value(v)?)),
                BoundValue::Null => MaybeUnset::Set(None),
                BoundValue::Unset => MaybeUnset::Unset,
            })
        })
        .collect()
}

fn to_driver_value(value: CqlValue) -> Result<DriverValue> {
    Ok(match value {
        CqlValue::Text(s) => DriverValue::Text(s),
        CqlValue::Date(d) => DriverValue::Date(to_cql_date(d)?),
        CqlValue::SmallInt(n) => DriverValue::SmallInt(n),
        CqlValue::Uuid(u) => DriverValue::Uuid(u),
    })
}

fn from_driver_row(columns: &[Option<Column>], row: DriverRow) -> Result<Row> {
    let mut out = Row::new();
    for (column, value) in columns.iter().zip(row.columns) {
        let (Some(column), Some(value)) = (column, value) else {
            continue;
        };
        out.set(*column, from_driver_value(*column, value)?);
    }
    Ok(out)
}

fn from_driver_value(column: Column, value: DriverValue) -> Result<CqlValue> {
    match value {
        DriverValue::Text(s) | DriverValue::Ascii(s) => Ok(CqlValue::Text(s)),
        DriverValue::Date(d) => Ok(CqlValue::Date(from_cql_date(d)?)),
        DriverValue::SmallInt(n) => Ok(CqlValue::SmallInt(n)),
        DriverValue::Uuid(u) => Ok(CqlValue::Uuid(u)),
        other => Err(StorageError::Driver(format!(
            "Unsupported value {:?} in column {}",
            other,
            column.name()
        ))),
    }
}

fn to_cql_date(date: NaiveDate) -> Result<CqlDate> {
    let days = date.signed_duration_since(NaiveDate::UNIX_EPOCH).num_days();
    u32::try_from(days + CQL_DATE_EPOCH_OFFSET)
        .map(CqlDate)
        .map_err(|_| StorageError::InvalidArgument(format!("Date {} out of CQL range", date)))
}

fn from_cql_date(date: CqlDate) -> Result<NaiveDate> {
    let days = i64::from(date.0) - CQL_DATE_EPOCH_OFFSET;
    TimeDelta::try_days(days)
        .and_then(|delta| NaiveDate::UNIX_EPOCH.checked_add_signed(delta))
        .ok_or_else(|| StorageError::Driver(format!("CQL date {} out of range", date.0)))
}

fn prepare_error(err: PrepareError) -> StorageError {
    match err {
        PrepareError::AllAttemptsFailed { first_attempt } => attempt_error(first_attempt),
        other => StorageError::Connection(other.to_string()),
    }
}

fn execution_error(err: ExecutionError) -> StorageError {
    match err {
        ExecutionError::LastAttemptError(attempt) => attempt_error(attempt),
        ExecutionError::RequestTimeout(elapsed) => {
            StorageError::Timeout(format!("Client timed out after {:?}", elapsed))
        }
        ExecutionError::ConnectionPoolError(e) => StorageError::Unavailable(e.to_string()),
        ExecutionError::BadQuery(e) => StorageError::InvalidQuery(e.to_string()),
        other => StorageError::Driver(other.to_string()),
    }
}

/// A logged batch that times out after reaching the coordinator may still apply.
fn batch_error(err: ExecutionError) -> StorageError {
    match err {
        ExecutionError::RequestTimeout(elapsed) => StorageError::WriteAmbiguous(format!(
            "Client timed out after {:?} waiting for logged batch",
            elapsed
        )),
        other => execution_error(other),
    }
}

fn attempt_error(err: RequestAttemptError) -> StorageError {
    match err {
        RequestAttemptError::DbError(db, message) => db_error(db, message),
        other => StorageError::Driver(other.to_string()),
    }
}

fn db_error(err: DbError, message: String) -> StorageError {
    match err {
        DbError::WriteTimeout {
            write_type: WriteType::Batch,
            ..
        } => StorageError::WriteAmbiguous(message),
        DbError::WriteTimeout { .. } | DbError::ReadTimeout { .. } => StorageError::Timeout(message),
        DbError::Unavailable { .. } | DbError::Overloaded | DbError::IsBootstrapping => {
            StorageError::Unavailable(message)
        }
        DbError::Invalid | DbError::SyntaxError | DbError::Unauthorized => {
            StorageError::InvalidQuery(message)
        }
        other => StorageError::Driver(format!("{}: {}", other, message)),
    }
}
