//! Storage implementations.
//!
//! The core talks to its column-family store through [`CqlSession`]. Two
//! engines implement it:
//! - [`MemorySession`]: in-memory engine, always available
//! - `ScyllaSession`: ScyllaDB / Cassandra, behind the `scylla` feature

use std::sync::Arc;

use tracing::{error, info};

use crate::config::{StorageConfig, StorageType};
use crate::repository::{CqlReservationRepository, ReservationRepository};

pub mod bootstrap;
pub mod memory;
pub mod schema;
pub mod session;
pub mod statement;
pub mod value;

#[cfg(feature = "scylla")]
pub mod scylla;

pub use bootstrap::SchemaBootstrap;
pub use memory::{Fault, MemorySession};
pub use schema::{Column, ReservationTable, TableDef};
pub use session::{CqlSession, SchemaChange};
pub use statement::{LoggedBatch, Projection, StatementTemplate};
pub use value::{BoundValue, CqlValue, ResultSet, Row};

#[cfg(feature = "scylla")]
pub use self::scylla::ScyllaSession;

/// Errors raised by the storage layer.
///
/// Retry guidance: `Timeout`, `Unavailable` and `WriteAmbiguous` are safe to
/// retry by repeating the whole logical operation, since upsert and delete are
/// idempotent by confirmation number. Everything else is permanent.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Not enough replicas available: {0}")]
    Unavailable(String),

    #[error("Batch outcome unknown, retry the operation: {0}")]
    WriteAmbiguous(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Unknown table: {keyspace}.{table}")]
    UnknownTable { keyspace: String, table: String },

    #[error("Column {column} holds a {actual} value, expected {expected}")]
    ColumnType {
        column: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Driver error: {0}")]
    Driver(String),
}

impl StorageError {
    /// Whether repeating the same logical operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::Timeout(_) | StorageError::Unavailable(_) | StorageError::WriteAmbiguous(_)
        )
    }

    /// Whether a write may have been partially applied.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, StorageError::WriteAmbiguous(_))
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Initialize the reservation repository based on configuration.
///
/// Opens the configured engine, runs schema bootstrap when enabled and
/// prepares the repository statements on the shared session.
pub async fn init_repository(config: &StorageConfig) -> Result<Arc<dyn ReservationRepository>> {
    info!(
        storage = ?config.storage_type,
        keyspace = %config.keyspace,
        "Initializing reservation storage"
    );

    match config.storage_type {
        StorageType::Memory => {
            let session = Arc::new(MemorySession::new());
            open_repository(session, config).await
        }
        #[cfg(feature = "scylla")]
        StorageType::Scylla => {
            let session = Arc::new(ScyllaSession::connect(&config.scylla).await?);
            open_repository(session, config).await
        }
        #[cfg(not(feature = "scylla"))]
        StorageType::Scylla => {
            error!("Scylla storage requested but 'scylla' feature is not enabled");
            Err(StorageError::Connection(
                "Scylla feature not enabled".to_string(),
            ))
        }
    }
}

async fn open_repository<S>(
    session: Arc<S>,
    config: &StorageConfig,
) -> Result<Arc<dyn ReservationRepository>>
where
    S: CqlSession + 'static,
{
    if config.schema.create {
        SchemaBootstrap::from_config(config)
            .run(session.as_ref())
            .await?;
    }

    let repository = CqlReservationRepository::new(session, &config.keyspace)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to prepare reservation statements"))?;
    Ok(Arc::new(repository))
}
