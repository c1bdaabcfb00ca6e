//! Reservation Store
//!
//! Data-access layer for hotel reservations kept in denormalized
//! column-family tables (ScyllaDB / Apache Cassandra over CQL). Every write
//! updates all tables in one logged batch; reads hit the table shaped for the
//! query.
//!
//! - [`repository`]: the [`ReservationRepository`](repository::ReservationRepository) facade
//! - [`storage`]: schema, statements and storage engines
//! - [`config`]: YAML and environment configuration

pub mod config;
pub mod model;
pub mod repository;
pub mod storage;
pub mod utils;

pub use model::Reservation;
pub use repository::{CqlReservationRepository, ReservationRepository};
pub use storage::{init_repository, StorageError};
