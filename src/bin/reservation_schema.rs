//! reservation-schema: keyspace bootstrap
//!
//! Connects to the configured ScyllaDB / Cassandra cluster and creates the
//! reservation keyspace, the `address` type and every table. Safe to run
//! repeatedly.
//!
//! ## Configuration
//! - RESERVATIONS_CONFIG or `--config <path>`: YAML configuration file
//! - RESERVATIONS__STORAGE__KEYSPACE: keyspace name
//! - RESERVATIONS__STORAGE__SCYLLA__CONTACT_POINTS: comma separated hosts
//! - RESERVATIONS__STORAGE__SCHEMA__DROP: drop the keyspace first (destroys data)
//! - RESERVATIONS_LOG: log filter (default "info")

use tracing::{error, info};

use reservation_store::config::Config;
use reservation_store::storage::{SchemaBootstrap, ScyllaSession};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    reservation_store::utils::bootstrap::init_tracing();

    let config_path = reservation_store::utils::bootstrap::parse_config_path();
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(keyspace = %config.storage.keyspace, "Starting reservation-schema");

    let session = ScyllaSession::connect(&config.storage.scylla).await?;
    SchemaBootstrap::from_config(&config.storage)
        .run(&session)
        .await
        .map_err(|e| {
            error!("Schema bootstrap failed: {}", e);
            e
        })?;

    info!("Schema bootstrap complete");
    Ok(())
}
