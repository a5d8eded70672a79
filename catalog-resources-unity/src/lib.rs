//! Catalog resource provider for external locations.
//!
//! Updates that change both the owner and other attributes of a location are
//! split into two calls, see [`plan`] and [`transaction`].

pub mod api;
pub mod external_location;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod transaction;
