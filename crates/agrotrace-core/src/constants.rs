//! ─── AgroTrace Registry Limits ─────────────────────────────────────────────
//!
//! Byte-length bounds on every caller-supplied string. All limits are
//! checked before any state is read for mutation.

// ── Participant directory ────────────────────────────────────────────────────

pub const MAX_PARTICIPANT_NAME_BYTES: usize = 100;
pub const MAX_LOCATION_BYTES: usize = 100;
pub const MAX_METADATA_BYTES: usize = 256;

// ── Authority & handler registry ─────────────────────────────────────────────

pub const MAX_HANDLER_TYPE_BYTES: usize = 30;
pub const MAX_AUTHORITY_NAME_BYTES: usize = 50;

/// Maximum number of certification types a single authority may hold.
pub const MAX_CERT_TYPES: usize = 10;
pub const MAX_CERT_TYPE_BYTES: usize = 30;

// ── Product custody ledger ───────────────────────────────────────────────────

pub const MAX_PRODUCT_TYPE_BYTES: usize = 50;
pub const MAX_DETAILS_BYTES: usize = 200;
pub const MAX_EVENT_TYPE_BYTES: usize = 30;

// ── Event labels ─────────────────────────────────────────────────────────────

pub const EVENT_REGISTRATION: &str = "registration";
pub const EVENT_CUSTODY_TRANSFER: &str = "custody-transfer";
pub const EVENT_CERTIFICATION: &str = "certification";
pub const EVENT_SOLD: &str = "sold";
