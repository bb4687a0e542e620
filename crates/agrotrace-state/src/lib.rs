//! agrotrace-state
//!
//! Persistent registry state and the engine that mutates it. Every call is
//! validated against committed state, its writes are staged in memory, and
//! the staged set lands in sled as a single multi-tree transaction.

pub mod db;
pub mod engine;

pub use db::{StagedMutations, StateDb};
pub use engine::StateEngine;
