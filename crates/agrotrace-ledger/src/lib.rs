//! agrotrace-ledger
//!
//! Provenance queries over the product custody ledger: product records,
//! certifications and the per-product event log. All mutations (product
//! registration, custody transfer, certification, sale) go through
//! agrotrace-state's StateEngine, which appends exactly one log entry per
//! successful ledger call.

pub mod query;

pub use query::LedgerQuery;
