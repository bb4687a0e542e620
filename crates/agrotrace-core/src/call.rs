use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_AUTHORITY_NAME_BYTES, MAX_CERT_TYPES, MAX_CERT_TYPE_BYTES, MAX_DETAILS_BYTES,
    MAX_EVENT_TYPE_BYTES, MAX_HANDLER_TYPE_BYTES, MAX_LOCATION_BYTES, MAX_METADATA_BYTES,
    MAX_PARTICIPANT_NAME_BYTES, MAX_PRODUCT_TYPE_BYTES,
};
use crate::error::AgroError;
use crate::types::{Principal, ProductId, Reputation, Timestamp};

// ── Action ────────────────────────────────────────────────────────────────────

/// Every state-changing operation of the registry is one of these variants.
///
/// Role and status arrive as raw wire codes; the engine rejects codes
/// outside the enumerations.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    // ── Participant directory ────────────────────────────────────────────────

    /// Self-register the caller with status Pending.
    Register {
        name: String,
        role: u8,
        location: String,
        metadata: String,
    },

    /// Approve a pending participant. Verifier or admin only.
    Verify {
        participant: Principal,
    },

    /// Overwrite a participant's status. Verifier or admin only.
    UpdateStatus {
        participant: Principal,
        new_status: u8,
    },

    /// Self-service update of the caller's display fields.
    UpdateInfo {
        name: String,
        location: String,
        metadata: String,
    },

    /// Overwrite a participant's reputation score. Verifier or admin only.
    UpdateReputation {
        participant: Principal,
        score: Reputation,
    },

    // ── Permission grants (admin only) ───────────────────────────────────────

    GrantVerifier {
        account: Principal,
    },

    RevokeVerifier {
        account: Principal,
    },

    GrantAdmin {
        account: Principal,
    },

    // ── Authority & handler registry ─────────────────────────────────────────

    /// Upsert the caller as an active handler.
    RegisterHandler {
        handler_type: String,
    },

    /// Clear a handler's active flag. Admin only.
    DeactivateHandler {
        handler: Principal,
    },

    /// Upsert the caller as an active certification authority.
    RegisterCertificationAuthority {
        name: String,
        cert_types: Vec<String>,
    },

    /// Clear an authority's active flag. Admin only.
    DeactivateCertificationAuthority {
        authority: Principal,
    },

    // ── Product custody ledger ───────────────────────────────────────────────

    RegisterProduct {
        product_type: String,
        harvest_date: u64,
    },

    TransferCustody {
        product_id: ProductId,
        new_custodian: Principal,
        details: String,
        location: Option<String>,
    },

    AddCertification {
        product_id: ProductId,
        cert_type: String,
        expiry_date: Timestamp,
        details: String,
    },

    /// Generic extension point for processing / quality-check events.
    RecordSupplyChainEvent {
        product_id: ProductId,
        event_type: String,
        details: String,
        location: Option<String>,
    },

    MarkProductSold {
        product_id: ProductId,
        details: String,
        location: Option<String>,
    },
}

impl Action {
    /// Operation name as exposed on the external surface.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Register { .. } => "register",
            Action::Verify { .. } => "verify",
            Action::UpdateStatus { .. } => "updateStatus",
            Action::UpdateInfo { .. } => "updateInfo",
            Action::UpdateReputation { .. } => "updateReputation",
            Action::GrantVerifier { .. } => "grantVerifier",
            Action::RevokeVerifier { .. } => "revokeVerifier",
            Action::GrantAdmin { .. } => "grantAdmin",
            Action::RegisterHandler { .. } => "registerHandler",
            Action::DeactivateHandler { .. } => "deactivateHandler",
            Action::RegisterCertificationAuthority { .. } => "registerCertificationAuthority",
            Action::DeactivateCertificationAuthority { .. } => "deactivateCertificationAuthority",
            Action::RegisterProduct { .. } => "registerProduct",
            Action::TransferCustody { .. } => "transferCustody",
            Action::AddCertification { .. } => "addCertification",
            Action::RecordSupplyChainEvent { .. } => "recordSupplyChainEvent",
            Action::MarkProductSold { .. } => "markProductSold",
        }
    }

    /// Actions that must append exactly one event to a product log.
    pub fn is_ledger_mutation(&self) -> bool {
        matches!(
            self,
            Action::RegisterProduct { .. }
                | Action::TransferCustody { .. }
                | Action::AddCertification { .. }
                | Action::RecordSupplyChainEvent { .. }
                | Action::MarkProductSold { .. }
        )
    }

    /// Reject oversized or empty arguments before any state is touched.
    pub fn check_bounds(&self) -> Result<(), AgroError> {
        match self {
            Action::Register { name, location, metadata, .. }
            | Action::UpdateInfo { name, location, metadata } => {
                max_len("name", name, MAX_PARTICIPANT_NAME_BYTES)?;
                max_len("location", location, MAX_LOCATION_BYTES)?;
                max_len("metadata", metadata, MAX_METADATA_BYTES)
            }
            Action::RegisterHandler { handler_type } => {
                label("handler_type", handler_type, MAX_HANDLER_TYPE_BYTES)
            }
            Action::RegisterCertificationAuthority { name, cert_types } => {
                max_len("authority name", name, MAX_AUTHORITY_NAME_BYTES)?;
                if cert_types.len() > MAX_CERT_TYPES {
                    return Err(AgroError::TooManyCertTypes { max: MAX_CERT_TYPES });
                }
                for t in cert_types {
                    label("cert_type", t, MAX_CERT_TYPE_BYTES)?;
                }
                Ok(())
            }
            Action::RegisterProduct { product_type, .. } => {
                label("product_type", product_type, MAX_PRODUCT_TYPE_BYTES)
            }
            Action::TransferCustody { details, location, .. }
            | Action::MarkProductSold { details, location, .. } => {
                max_len("details", details, MAX_DETAILS_BYTES)?;
                opt_location(location)
            }
            Action::AddCertification { cert_type, details, .. } => {
                label("cert_type", cert_type, MAX_CERT_TYPE_BYTES)?;
                max_len("details", details, MAX_DETAILS_BYTES)
            }
            Action::RecordSupplyChainEvent { event_type, details, location, .. } => {
                label("event_type", event_type, MAX_EVENT_TYPE_BYTES)?;
                max_len("details", details, MAX_DETAILS_BYTES)?;
                opt_location(location)
            }
            Action::Verify { .. }
            | Action::UpdateStatus { .. }
            | Action::UpdateReputation { .. }
            | Action::GrantVerifier { .. }
            | Action::RevokeVerifier { .. }
            | Action::GrantAdmin { .. }
            | Action::DeactivateHandler { .. }
            | Action::DeactivateCertificationAuthority { .. } => Ok(()),
        }
    }
}

fn max_len(field: &'static str, value: &str, max: usize) -> Result<(), AgroError> {
    if value.len() > max {
        return Err(AgroError::FieldTooLong { field, max });
    }
    Ok(())
}

fn label(field: &'static str, value: &str, max: usize) -> Result<(), AgroError> {
    if value.is_empty() {
        return Err(AgroError::EmptyField(field));
    }
    max_len(field, value, max)
}

fn opt_location(location: &Option<String>) -> Result<(), AgroError> {
    match location {
        Some(l) => max_len("location", l, MAX_LOCATION_BYTES),
        None => Ok(()),
    }
}

// ── Call ──────────────────────────────────────────────────────────────────────

/// One authenticated invocation: the dispatcher vouches for `caller`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Call {
    pub caller: Principal,
    pub action: Action,
}

impl Call {
    pub fn new(caller: Principal, action: Action) -> Self {
        Self { caller, action }
    }
}

// ── CallOutcome ───────────────────────────────────────────────────────────────

/// Return value of a committed call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// `register`, `registerHandler`, `registerCertificationAuthority`.
    Identity(Principal),
    /// `registerProduct`.
    Product(ProductId),
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_name_rejected() {
        let action = Action::Register {
            name: "x".repeat(MAX_PARTICIPANT_NAME_BYTES + 1),
            role: 1,
            location: String::new(),
            metadata: String::new(),
        };
        assert!(matches!(
            action.check_bounds(),
            Err(AgroError::FieldTooLong { field: "name", .. })
        ));
    }

    #[test]
    fn cert_type_list_bounded() {
        let action = Action::RegisterCertificationAuthority {
            name: "Board".into(),
            cert_types: (0..=MAX_CERT_TYPES).map(|i| format!("t{i}")).collect(),
        };
        assert!(matches!(
            action.check_bounds(),
            Err(AgroError::TooManyCertTypes { .. })
        ));
    }

    #[test]
    fn empty_event_type_rejected() {
        let action = Action::RecordSupplyChainEvent {
            product_id: 0,
            event_type: String::new(),
            details: "washed".into(),
            location: None,
        };
        assert!(matches!(action.check_bounds(), Err(AgroError::EmptyField("event_type"))));
    }

    #[test]
    fn long_optional_location_rejected() {
        let action = Action::MarkProductSold {
            product_id: 0,
            details: String::new(),
            location: Some("l".repeat(MAX_LOCATION_BYTES + 1)),
        };
        assert!(action.check_bounds().is_err());
    }

    #[test]
    fn ledger_mutations_flagged() {
        let reg = Action::RegisterProduct { product_type: "coffee".into(), harvest_date: 20240101 };
        let handler = Action::RegisterHandler { handler_type: "distributor".into() };
        assert!(reg.is_ledger_mutation());
        assert!(!handler.is_ledger_mutation());
        assert_eq!(reg.name(), "registerProduct");
    }

    #[test]
    fn call_json_shape() {
        let caller = Principal::derive("farm");
        let json = format!(
            r#"{{"caller":"{}","action":{{"op":"register_product","product_type":"coffee","harvest_date":20240101}}}}"#,
            caller.to_b58()
        );
        let call: Call = serde_json::from_str(&json).unwrap();
        assert_eq!(call.caller, caller);
        assert_eq!(
            call.action,
            Action::RegisterProduct { product_type: "coffee".into(), harvest_date: 20240101 }
        );
    }
}
