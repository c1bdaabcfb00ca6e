//! Shared helpers for binaries and callers.

pub mod bootstrap;
pub mod retry;
