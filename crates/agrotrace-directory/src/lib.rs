//! agrotrace-directory
//!
//! Read side of the participant directory. Registration, verification and
//! permission grants are applied by agrotrace-state's StateEngine; this crate
//! answers who a participant is and what they may do.

pub mod query;

pub use query::ParticipantQuery;
