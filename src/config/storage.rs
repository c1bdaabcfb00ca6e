//! Storage configuration types.

use std::net::Ipv6Addr;

use serde::Deserialize;

/// Default keyspace holding the reservation tables.
pub const DEFAULT_KEYSPACE: &str = "reservation";

/// Storage type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Memory,
    Scylla,
}

/// Storage configuration (discriminated union).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// Keyspace holding the reservation tables.
    pub keyspace: String,
    /// ScyllaDB / Cassandra connection settings.
    pub scylla: ScyllaConfig,
    /// Schema bootstrap settings.
    pub schema: SchemaConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Memory,
            keyspace: DEFAULT_KEYSPACE.to_string(),
            scylla: ScyllaConfig::default(),
            schema: SchemaConfig::default(),
        }
    }
}

/// ScyllaDB / Cassandra connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScyllaConfig {
    /// Contact point hosts; the driver discovers the rest of the ring.
    pub contact_points: Vec<String>,
    /// Native protocol port.
    pub port: u16,
    /// Datacenter to prefer when routing requests.
    pub local_datacenter: Option<String>,
}

impl Default for ScyllaConfig {
    fn default() -> Self {
        Self {
            contact_points: vec!["127.0.0.1".to_string()],
            port: 9042,
            local_datacenter: None,
        }
    }
}

impl ScyllaConfig {
    /// `host:port` node addresses. IPv6 literals are bracketed; a contact
    /// point that already names a port keeps it.
    pub fn known_nodes(&self) -> Vec<String> {
        self.contact_points
            .iter()
            .map(|host| {
                if let Some(bracketed) = host.strip_prefix('[') {
                    if bracketed.contains("]:") {
                        host.clone()
                    } else {
                        format!("{}:{}", host, self.port)
                    }
                } else if host.parse::<Ipv6Addr>().is_ok() {
                    format!("[{}]:{}", host, self.port)
                } else if host.contains(':') {
                    host.clone()
                } else {
                    format!("{}:{}", host, self.port)
                }
            })
            .collect()
    }
}

/// Schema bootstrap settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Create the keyspace, types and tables on startup.
    pub create: bool,
    /// Drop the keyspace before creating it. Destroys all data.
    pub drop: bool,
    /// SimpleStrategy replication factor for a newly created keyspace.
    pub replication_factor: u8,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            create: true,
            drop: false,
            replication_factor: 1,
        }
    }
}
