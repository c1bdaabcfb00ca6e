//! Storage-engine session interface.

use async_trait::async_trait;

use super::schema::{TableDef, UdtDef};
use super::statement::{LoggedBatch, StatementTemplate};
use super::value::{BoundValue, ResultSet};
use super::Result;

/// Keyspace layout change issued by schema bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    DropKeyspace {
        keyspace: String,
    },
    CreateKeyspace {
        keyspace: String,
        replication_factor: u8,
    },
    CreateType {
        keyspace: String,
        udt: &'static UdtDef,
    },
    CreateTable {
        keyspace: String,
        table: &'static TableDef,
    },
}

impl SchemaChange {
    /// CQL text of this change. Every statement is idempotent.
    pub fn cql(&self) -> String {
        match self {
            SchemaChange::DropKeyspace { keyspace } => {
                format!("DROP KEYSPACE IF EXISTS {}", keyspace)
            }
            SchemaChange::CreateKeyspace {
                keyspace,
                replication_factor,
            } => format!(
                "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = \
                 {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
                keyspace, replication_factor
            ),
            SchemaChange::CreateType { keyspace, udt } => udt.create_cql(keyspace),
            SchemaChange::CreateTable { keyspace, table } => table.create_cql(keyspace),
        }
    }
}

/// A long-lived, shared connection to a CQL storage engine.
///
/// One session is created at startup and shared by every repository
/// operation; implementations multiplex concurrent requests internally.
///
/// Implementations:
/// - `MemorySession`: in-memory column-family engine
/// - `ScyllaSession`: ScyllaDB / Cassandra over the native protocol
#[async_trait]
pub trait CqlSession: Send + Sync {
    /// Handle to a statement prepared on this session.
    type Prepared: Clone + Send + Sync;

    /// Prepare a statement once for repeated execution.
    async fn prepare(&self, template: &StatementTemplate) -> Result<Self::Prepared>;

    /// Execute a prepared statement with values for its bind markers.
    async fn execute(&self, statement: &Self::Prepared, values: Vec<BoundValue>)
        -> Result<ResultSet>;

    /// Execute statements as one logged batch.
    ///
    /// A logged batch is atomic (all statements eventually apply or none do)
    /// but not isolated. A timeout after the batch log was written leaves the
    /// outcome unknown and is reported as `StorageError::WriteAmbiguous`.
    async fn batch(&self, batch: LoggedBatch<Self::Prepared>) -> Result<()>;

    /// Apply a schema change.
    async fn apply_schema(&self, change: &SchemaChange) -> Result<()>;
}
