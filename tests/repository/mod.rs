//! Shared repository integration tests.
//!
//! Tests the ReservationRepository contract against every storage engine.
//! Each engine's test binary imports these test functions and runs them.

pub mod reservation_repository_tests;
