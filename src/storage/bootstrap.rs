//! Schema bootstrap.
//!
//! Creates the reservation keyspace layout. Every statement is idempotent, so
//! bootstrap can run on every startup.

use tracing::{info, warn};

use crate::config::StorageConfig;

use super::schema::{validate_keyspace, ADDRESS_TYPE, ALL_TABLES};
use super::session::{CqlSession, SchemaChange};
use super::Result;

/// Keyspace creation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaBootstrap {
    keyspace: String,
    replication_factor: u8,
    drop: bool,
}

impl SchemaBootstrap {
    pub fn new(keyspace: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            replication_factor: 1,
            drop: false,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.keyspace.clone())
            .with_replication_factor(config.schema.replication_factor)
            .with_drop(config.schema.drop)
    }

    pub fn with_replication_factor(mut self, replication_factor: u8) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    /// Drop the keyspace (and all its data) before creating it.
    pub fn with_drop(mut self, drop: bool) -> Self {
        self.drop = drop;
        self
    }

    /// Schema changes in execution order.
    pub fn changes(&self) -> Vec<SchemaChange> {
        let mut changes = Vec::with_capacity(ALL_TABLES.len() + 3);
        if self.drop {
            changes.push(SchemaChange::DropKeyspace {
                keyspace: self.keyspace.clone(),
            });
        }
        changes.push(SchemaChange::CreateKeyspace {
            keyspace: self.keyspace.clone(),
            replication_factor: self.replication_factor,
        });
        changes.push(SchemaChange::CreateType {
            keyspace: self.keyspace.clone(),
            udt: &ADDRESS_TYPE,
        });
        changes.extend(ALL_TABLES.iter().map(|table| SchemaChange::CreateTable {
            keyspace: self.keyspace.clone(),
            table,
        }));
        changes
    }

    pub async fn run<S: CqlSession + ?Sized>(&self, session: &S) -> Result<()> {
        validate_keyspace(&self.keyspace)?;

        if self.drop {
            warn!(keyspace = %self.keyspace, "Dropping keyspace before schema bootstrap");
        }

        for change in self.changes() {
            session.apply_schema(&change).await?;
        }

        info!(
            keyspace = %self.keyspace,
            replication_factor = self.replication_factor,
            tables = ALL_TABLES.len(),
            "Reservation schema ready"
        );
        Ok(())
    }
}
