//! In-memory CQL engine.
//!
//! Implements [`CqlSession`] with column-family semantics: partitioned tables,
//! clustering order, upsert-style inserts, unset-vs-null binding and logged
//! batches that apply all-or-nothing. Used by unit and contract tests and as
//! the `memory` storage type.
//!
//! Faults can be queued to simulate coordinator timeouts, unavailable
//! replicas and batches whose outcome is unknown to the client.

mod table;


use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use self::table::MemoryTable;
use super::schema::{ColumnType, TableDef};
use super::session::{CqlSession, SchemaChange};
use super::statement::{bind_marker_count, LoggedBatch, Projection, StatementKind, StatementTemplate};
use super::value::{BoundValue, CqlValue, ResultSet, Row};
use super::{Result, StorageError};

/// Failure injected into a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The coordinator timed out before anything was written.
    Timeout,
    /// Not enough live replicas; nothing was written.
    Unavailable,
    /// The batch log was written, then the batch timed out. The first
    /// `applied` statements take effect and the caller sees `WriteAmbiguous`.
    /// A single statement receiving this fault times out without applying.
    AmbiguousBatch { applied: usize },
}

#[derive(Debug, Clone, Default)]
struct Keyspace {
    replication_factor: u8,
    types: BTreeSet<&'static str>,
    tables: BTreeMap<String, MemoryTable>,
}

type Keyspaces = BTreeMap<String, Keyspace>;

/// Statement prepared on a [`MemorySession`].
#[derive(Debug, Clone)]
pub struct MemoryStatement {
    template: Arc<StatementTemplate>,
}

impl MemoryStatement {
    pub fn template(&self) -> &StatementTemplate {
        &self.template
    }
}

/// In-memory column-family engine.
#[derive(Debug, Default)]
pub struct MemorySession {
    keyspaces: RwLock<Keyspaces>,
    faults: Mutex<VecDeque<Fault>>,
    requests: AtomicUsize,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fault for the next execute, batch or schema request.
    pub async fn inject_fault(&self, fault: Fault) {
        self.faults.lock().await.push_back(fault);
    }

    pub async fn clear_faults(&self) {
        self.faults.lock().await.clear();
    }

    /// Number of requests that reached the engine, prepares included.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub async fn keyspace_names(&self) -> Vec<String> {
        self.keyspaces.read().await.keys().cloned().collect()
    }

    pub async fn replication_factor(&self, keyspace: &str) -> Option<u8> {
        self.keyspaces
            .read()
            .await
            .get(keyspace)
            .map(|ks| ks.replication_factor)
    }

    pub async fn table_names(&self, keyspace: &str) -> Vec<String> {
        self.keyspaces
            .read()
            .await
            .get(keyspace)
            .map(|ks| ks.tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every row of a table, all columns, in storage order.
    pub async fn rows(&self, keyspace: &str, table: &TableDef) -> Result<Vec<Row>> {
        let keyspaces = self.keyspaces.read().await;
        let stored = lookup(&keyspaces, keyspace, table)?;
        Ok(stored.select(&[], &Projection::All))
    }

    pub async fn row_count(&self, keyspace: &str, table: &TableDef) -> Result<usize> {
        let keyspaces = self.keyspaces.read().await;
        Ok(lookup(&keyspaces, keyspace, table)?.len())
    }

    async fn begin_request(&self) -> Option<Fault> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.faults.lock().await.pop_front()
    }
}

fn fault_error(fault: Fault, request: &str) -> StorageError {
    match fault {
        Fault::Timeout | Fault::AmbiguousBatch { .. } => StorageError::Timeout(format!(
            "Coordinator timed out waiting for replica responses to {}",
            request
        )),
        Fault::Unavailable => StorageError::Unavailable(format!(
            "Cannot achieve consistency level for {}",
            request
        )),
    }
}

fn lookup<'a>(keyspaces: &'a Keyspaces, keyspace: &str, table: &TableDef) -> Result<&'a MemoryTable> {
    keyspaces
        .get(keyspace)
        .and_then(|ks| ks.tables.get(&table.name()))
        .ok_or_else(|| unknown_table(keyspace, table))
}

fn lookup_mut<'a>(
    keyspaces: &'a mut Keyspaces,
    keyspace: &str,
    table: &TableDef,
) -> Result<&'a mut MemoryTable> {
    keyspaces
        .get_mut(keyspace)
        .and_then(|ks| ks.tables.get_mut(&table.name()))
        .ok_or_else(|| unknown_table(keyspace, table))
}

fn unknown_table(keyspace: &str, table: &TableDef) -> StorageError {
    StorageError::UnknownTable {
        keyspace: keyspace.to_string(),
        table: table.name(),
    }
}

/// The rendered CQL must restrict columns against bare `?` markers, one per
/// bind column. A parenthesized marker is a tuple literal in CQL.
fn check_markers(template: &StatementTemplate) -> Result<()> {
    let cql = template.cql();
    let markers = bind_marker_count(&cql);
    if markers != template.bind_columns().len() || cql.contains("= (") {
        return Err(StorageError::InvalidQuery(format!(
            "Statement renders {} bind markers for {} columns: {}",
            markers,
            template.bind_columns().len(),
            cql
        )));
    }
    Ok(())
}

fn check_arity(template: &StatementTemplate, values: &[BoundValue]) -> Result<()> {
    let expected = template.bind_columns().len();
    if values.len() == expected {
        Ok(())
    } else {
        Err(StorageError::InvalidQuery(format!(
            "Expected {} bound values, got {}",
            expected,
            values.len()
        )))
    }
}

/// Values of key restrictions: set and of the column's type.
fn key_values(
    table: &MemoryTable,
    template: &StatementTemplate,
    values: Vec<BoundValue>,
) -> Result<Vec<CqlValue>> {
    template
        .bind_columns()
        .iter()
        .zip(values)
        .map(|(column, value)| match value {
            BoundValue::Set(v) => {
                table.check_type(*column, &v)?;
                Ok(v)
            }
            BoundValue::Null | BoundValue::Unset => Err(StorageError::InvalidQuery(format!(
                "Invalid null or unset value for restriction on {}",
                column.name()
            ))),
        })
        .collect()
}

fn apply_write(
    keyspaces: &mut Keyspaces,
    template: &StatementTemplate,
    values: Vec<BoundValue>,
) -> Result<()> {
    check_arity(template, &values)?;
    let table = lookup_mut(keyspaces, template.keyspace(), template.table())?;
    match template.kind() {
        StatementKind::Insert { columns } => {
            table.upsert(columns.iter().copied().zip(values).collect())
        }
        StatementKind::Delete { .. } => {
            let key = key_values(table, template, values)?;
            table.delete(&key);
            Ok(())
        }
        StatementKind::Select { .. } => Err(StorageError::InvalidQuery(
            "Only INSERT and DELETE statements are allowed in a batch".to_string(),
        )),
    }
}

/// Name of the first user-defined type a column type refers to.
fn udt_reference(column_type: &ColumnType) -> Option<&'static str> {
    match column_type {
        ColumnType::Frozen(name) => Some(*name),
        ColumnType::Set(inner) | ColumnType::List(inner) => udt_reference(inner),
        ColumnType::Map(key, value) => udt_reference(key).or_else(|| udt_reference(value)),
        ColumnType::Text | ColumnType::Date | ColumnType::SmallInt | ColumnType::Uuid => None,
    }
}

fn missing_keyspace(keyspace: &str) -> StorageError {
    StorageError::InvalidQuery(format!("Keyspace {} does not exist", keyspace))
}

#[async_trait]
impl CqlSession for MemorySession {
    type Prepared = MemoryStatement;

    async fn prepare(&self, template: &StatementTemplate) -> Result<MemoryStatement> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let keyspaces = self.keyspaces.read().await;
        lookup(&keyspaces, template.keyspace(), template.table())?.check(template)?;
        check_markers(template)?;
        Ok(MemoryStatement {
            template: Arc::new(template.clone()),
        })
    }

    async fn execute(&self, statement: &MemoryStatement, values: Vec<BoundValue>) -> Result<ResultSet> {
        let template = statement.template();
        if let Some(fault) = self.begin_request().await {
            return Err(fault_error(fault, &template.table().name()));
        }

        match template.kind() {
            StatementKind::Select { projection, .. } => {
                check_arity(template, &values)?;
                let keyspaces = self.keyspaces.read().await;
                let table = lookup(&keyspaces, template.keyspace(), template.table())?;
                let key = key_values(table, template, values)?;
                let rows = table.select(&key, projection);
                debug!(table = %table.def().name(), rows = rows.len(), "Select");
                Ok(ResultSet::new(rows))
            }
            StatementKind::Insert { .. } | StatementKind::Delete { .. } => {
                let mut keyspaces = self.keyspaces.write().await;
                apply_write(&mut keyspaces, template, values)?;
                Ok(ResultSet::empty())
            }
        }
    }

    async fn batch(&self, batch: LoggedBatch<MemoryStatement>) -> Result<()> {
        let fault = self.begin_request().await;
        let statements = batch.into_statements();
        let limit = match fault {
            None => statements.len(),
            Some(Fault::AmbiguousBatch { applied }) => applied.min(statements.len()),
            Some(other) => return Err(fault_error(other, "logged batch")),
        };

        // Applied to a staged copy so a failing statement leaves no trace.
        let mut keyspaces = self.keyspaces.write().await;
        let mut staged = keyspaces.clone();
        for (statement, values) in statements.into_iter().take(limit) {
            apply_write(&mut staged, statement.template(), values)?;
        }
        *keyspaces = staged;
        debug!(statements = limit, "Applied logged batch");

        match fault {
            Some(Fault::AmbiguousBatch { .. }) => Err(StorageError::WriteAmbiguous(
                "Batch log written but the batch timed out".to_string(),
            )),
            _ => Ok(()),
        }
    }

    async fn apply_schema(&self, change: &SchemaChange) -> Result<()> {
        if let Some(fault) = self.begin_request().await {
            return Err(fault_error(fault, "schema change"));
        }

        let mut keyspaces = self.keyspaces.write().await;
        match change {
            SchemaChange::DropKeyspace { keyspace } => {
                keyspaces.remove(keyspace);
            }
            SchemaChange::CreateKeyspace {
                keyspace,
                replication_factor,
            } => {
                keyspaces
                    .entry(keyspace.clone())
                    .or_insert_with(|| Keyspace {
                        replication_factor: *replication_factor,
                        ..Default::default()
                    });
            }
            SchemaChange::CreateType { keyspace, udt } => {
                keyspaces
                    .get_mut(keyspace)
                    .ok_or_else(|| missing_keyspace(keyspace))?
                    .types
                    .insert(udt.name);
            }
            SchemaChange::CreateTable { keyspace, table } => {
                let ks = keyspaces
                    .get_mut(keyspace)
                    .ok_or_else(|| missing_keyspace(keyspace))?;
                for (column, column_type) in table.columns {
                    if let Some(udt) = udt_reference(column_type) {
                        if !ks.types.contains(udt) {
                            return Err(StorageError::InvalidQuery(format!(
                                "Unknown type {}.{} for column {}",
                                keyspace,
                                udt,
                                column.name()
                            )));
                        }
                    }
                }
                ks.tables
                    .entry(table.name())
                    .or_insert_with(|| MemoryTable::new(*table));
            }
        }
        Ok(())
    }
}
