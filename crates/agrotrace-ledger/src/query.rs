use agrotrace_core::error::AgroError;
use agrotrace_core::product::{Certification, EventRecord, Product};
use agrotrace_core::types::{Principal, ProductId, Timestamp};
use agrotrace_state::StateDb;

/// Query helpers for products, certifications and event logs.
pub struct LedgerQuery<'a> {
    db: &'a StateDb,
}

impl<'a> LedgerQuery<'a> {
    pub fn new(db: &'a StateDb) -> Self {
        Self { db }
    }

    pub fn get_product(&self, id: ProductId) -> Result<Option<Product>, AgroError> {
        self.db.get_product(id)
    }

    /// Number of products issued so far. Ids run from 0 to this value - 1.
    pub fn product_count(&self) -> Result<u64, AgroError> {
        self.db.next_product_id()
    }

    /// False for unknown products.
    pub fn is_custodian(&self, id: ProductId, who: &Principal) -> Result<bool, AgroError> {
        Ok(self.db.get_product(id)?.is_some_and(|p| p.is_custodian(who)))
    }

    // ── Certifications ────────────────────────────────────────────────────────

    pub fn get_certification(
        &self,
        id: ProductId,
        cert_type: &str,
    ) -> Result<Option<Certification>, AgroError> {
        self.db.get_certification(id, cert_type)
    }

    pub fn certifications(&self, id: ProductId) -> Result<Vec<Certification>, AgroError> {
        self.db.iter_certifications(id)
    }

    /// Present and not yet expired at `now`.
    pub fn is_certification_valid(
        &self,
        id: ProductId,
        cert_type: &str,
        now: Timestamp,
    ) -> Result<bool, AgroError> {
        Ok(self
            .db
            .get_certification(id, cert_type)?
            .is_some_and(|c| c.is_valid_at(now)))
    }

    // ── Event log ─────────────────────────────────────────────────────────────

    pub fn event_count(&self, id: ProductId) -> Result<u64, AgroError> {
        self.db.get_event_count(id)
    }

    pub fn event(&self, id: ProductId, index: u64) -> Result<Option<EventRecord>, AgroError> {
        self.db.get_event(id, index)
    }

    /// Full audit trail of a product, oldest first.
    pub fn history(&self, id: ProductId) -> Result<Vec<EventRecord>, AgroError> {
        if self.db.get_product(id)?.is_none() {
            return Err(AgroError::InvalidProduct(id));
        }
        self.db.iter_events(id)
    }

    /// Human-readable one-line summary of a product.
    pub fn describe(&self, id: ProductId) -> Result<String, AgroError> {
        let p = self.db.get_product(id)?.ok_or(AgroError::InvalidProduct(id))?;
        let certs: Vec<String> = self
            .db
            .iter_certifications(id)?
            .into_iter()
            .map(|c| c.cert_type)
            .collect();
        let certs = if certs.is_empty() { "none".to_string() } else { certs.join(", ") };

        Ok(format!(
            "Product #{} {} (harvest {}) | {} | farm: {} | custodian: {} | {} events | certifications: {}",
            p.id,
            p.product_type,
            p.harvest_date,
            p.status,
            p.farm,
            p.custodian,
            self.db.get_event_count(id)?,
            certs,
        ))
    }
}
