use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Principal, ProductId, Timestamp};

// ── ProductStatus ────────────────────────────────────────────────────────────

/// Status label of a product. `Sold` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    Active,
    Sold,
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductStatus::Active => f.write_str("active"),
            ProductStatus::Sold => f.write_str("sold"),
        }
    }
}

// ── Product ──────────────────────────────────────────────────────────────────

/// A tracked product lot.
///
/// `farm` is fixed at registration; `custodian` moves with every custody
/// transfer until `is_sold` flips, after which the record is frozen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub farm: Principal,
    pub product_type: String,
    /// Harvest date as supplied by the farm (e.g. 20240101).
    pub harvest_date: u64,
    pub custodian: Principal,
    pub status: ProductStatus,
    pub is_sold: bool,
    pub registered_at: Timestamp,
}

impl Product {
    pub fn new(
        id: ProductId,
        farm: Principal,
        product_type: String,
        harvest_date: u64,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            farm,
            product_type,
            harvest_date,
            custodian: farm,
            status: ProductStatus::Active,
            is_sold: false,
            registered_at: now,
        }
    }

    pub fn is_custodian(&self, who: &Principal) -> bool {
        self.custodian == *who
    }
}

// ── Certification ────────────────────────────────────────────────────────────

/// Write-once attestation keyed by (product id, certification type).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    pub product_id: ProductId,
    pub cert_type: String,
    pub certifier: Principal,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub details: String,
}

impl Certification {
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

// ── EventRecord ──────────────────────────────────────────────────────────────

/// One entry of a product's append-only event log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub product_id: ProductId,
    /// Position in the product's log, starting at 0 with no gaps.
    pub index: u64,
    pub timestamp: Timestamp,
    /// "registration", "custody-transfer", "certification", "sold", or a
    /// handler-supplied label.
    pub event_type: String,
    pub actor: Principal,
    pub details: String,
    pub location: Option<String>,
}
