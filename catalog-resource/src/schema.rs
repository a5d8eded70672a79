//! Versioned message types of the provider protocol.

pub mod v0;
