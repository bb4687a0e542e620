//! agrotrace-registry
//!
//! Queries over supply-chain handlers and certification authorities.
//! Registration and deactivation are applied by agrotrace-state's StateEngine.

pub mod query;

pub use query::RegistryQuery;
