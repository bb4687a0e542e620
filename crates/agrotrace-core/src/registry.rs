use serde::{Deserialize, Serialize};

use crate::types::{Principal, Timestamp};

// ── HandlerRecord ────────────────────────────────────────────────────────────

/// A supply-chain handler: an identity allowed to receive custody and record
/// events. Re-registration overwrites the record and reactivates it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandlerRecord {
    /// Handler identity (= primary key).
    pub handler_id: Principal,
    /// Free-form label, e.g. "distributor", "processor", "retailer".
    pub handler_type: String,
    pub active: bool,
    pub registered_at: Timestamp,
}

impl HandlerRecord {
    pub fn new(handler_id: Principal, handler_type: String, now: Timestamp) -> Self {
        Self { handler_id, handler_type, active: true, registered_at: now }
    }
}

// ── CertificationAuthority ───────────────────────────────────────────────────

/// An identity allowed to attest a fixed set of certification types.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CertificationAuthority {
    /// Authority identity (= primary key).
    pub authority_id: Principal,
    pub name: String,
    /// Certification-type labels this authority may issue, e.g. "organic".
    pub cert_types: Vec<String>,
    pub active: bool,
    pub registered_at: Timestamp,
}

impl CertificationAuthority {
    pub fn new(
        authority_id: Principal,
        name: String,
        cert_types: Vec<String>,
        now: Timestamp,
    ) -> Self {
        Self { authority_id, name, cert_types, active: true, registered_at: now }
    }

    /// Active and holding `cert_type`.
    pub fn permits(&self, cert_type: &str) -> bool {
        self.active && self.cert_types.iter().any(|t| t == cert_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_authority_permits_nothing() {
        let mut ca = CertificationAuthority::new(
            Principal::derive("ca"),
            "Organic Board".into(),
            vec!["organic".into(), "fair-trade".into()],
            0,
        );
        assert!(ca.permits("organic"));
        assert!(!ca.permits("kosher"));
        ca.active = false;
        assert!(!ca.permits("organic"));
    }
}
