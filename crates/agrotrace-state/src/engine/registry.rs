use agrotrace_core::call::CallOutcome;
use agrotrace_core::error::AgroError;
use agrotrace_core::registry::{CertificationAuthority, HandlerRecord};
use agrotrace_core::types::{Principal, Timestamp};
use tracing::debug;

use super::StateEngine;
use crate::db::StagedMutations;

impl StateEngine {
    /// Upsert the caller's handler record. Never fails on an existing
    /// record: the type label and timestamp are overwritten and the record
    /// comes back active.
    pub(super) fn register_handler(
        &self,
        caller: &Principal,
        handler_type: &str,
        staged: &mut StagedMutations,
        now: Timestamp,
    ) -> Result<CallOutcome, AgroError> {
        staged.handlers.push(HandlerRecord::new(*caller, handler_type.to_string(), now));
        debug!(handler = %caller, handler_type, "handler registered");
        Ok(CallOutcome::Identity(*caller))
    }

    pub(super) fn deactivate_handler(
        &self,
        caller: &Principal,
        handler: &Principal,
        staged: &mut StagedMutations,
    ) -> Result<CallOutcome, AgroError> {
        self.require_admin(caller)?;
        let mut record = self
            .db
            .get_handler(handler)?
            .ok_or_else(|| AgroError::HandlerNotFound(handler.to_string()))?;
        record.active = false;
        staged.handlers.push(record);
        debug!(%handler, "handler deactivated");
        Ok(CallOutcome::Done)
    }

    /// Same upsert semantics as handlers; the permitted type list is replaced
    /// wholesale.
    pub(super) fn register_authority(
        &self,
        caller: &Principal,
        name: &str,
        cert_types: &[String],
        staged: &mut StagedMutations,
        now: Timestamp,
    ) -> Result<CallOutcome, AgroError> {
        staged.authorities.push(CertificationAuthority::new(
            *caller,
            name.to_string(),
            cert_types.to_vec(),
            now,
        ));
        debug!(authority = %caller, types = cert_types.len(), "certification authority registered");
        Ok(CallOutcome::Identity(*caller))
    }

    pub(super) fn deactivate_authority(
        &self,
        caller: &Principal,
        authority: &Principal,
        staged: &mut StagedMutations,
    ) -> Result<CallOutcome, AgroError> {
        self.require_admin(caller)?;
        let mut record = self
            .db
            .get_authority(authority)?
            .ok_or_else(|| AgroError::AuthorityNotFound(authority.to_string()))?;
        record.active = false;
        staged.authorities.push(record);
        debug!(%authority, "certification authority deactivated");
        Ok(CallOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use agrotrace_core::call::{Action, CallOutcome};
    use agrotrace_core::error::{AgroError, ErrorKind};
    use agrotrace_core::types::Principal;

    use crate::engine::tests::{call, engine, engine_with_admin, NOW};

    fn authority_action(types: &[&str]) -> Action {
        Action::RegisterCertificationAuthority {
            name: "Organic Board".into(),
            cert_types: types.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn handler_upsert_overwrites() {
        let engine = engine();
        let h = Principal::derive("handler");
        let outcome = engine
            .apply(&call(&h, Action::RegisterHandler { handler_type: "distributor".into() }), NOW)
            .unwrap();
        assert_eq!(outcome, CallOutcome::Identity(h));

        engine
            .apply(&call(&h, Action::RegisterHandler { handler_type: "processor".into() }), NOW + 60)
            .unwrap();
        let record = engine.db.get_handler(&h).unwrap().unwrap();
        assert_eq!(record.handler_type, "processor");
        assert_eq!(record.registered_at, NOW + 60);
        assert!(record.active);
        assert_eq!(engine.db.iter_handlers().unwrap().len(), 1);
    }

    #[test]
    fn deactivate_then_reregister_reactivates() {
        let admin = Principal::derive("admin");
        let engine = engine_with_admin(&admin);
        let h = Principal::derive("handler");
        engine
            .apply(&call(&h, Action::RegisterHandler { handler_type: "distributor".into() }), NOW)
            .unwrap();

        engine.apply(&call(&admin, Action::DeactivateHandler { handler: h }), NOW).unwrap();
        assert!(!engine.db.get_handler(&h).unwrap().unwrap().active);

        engine
            .apply(&call(&h, Action::RegisterHandler { handler_type: "distributor".into() }), NOW)
            .unwrap();
        assert!(engine.db.get_handler(&h).unwrap().unwrap().active);
    }

    #[test]
    fn deactivation_is_admin_only() {
        let admin = Principal::derive("admin");
        let engine = engine_with_admin(&admin);
        let h = Principal::derive("handler");
        engine
            .apply(&call(&h, Action::RegisterHandler { handler_type: "distributor".into() }), NOW)
            .unwrap();

        let err = engine
            .apply(&call(&h, Action::DeactivateHandler { handler: h }), NOW)
            .unwrap_err();
        assert!(matches!(err, AgroError::OnlyAdmin));
        assert!(engine.db.get_handler(&h).unwrap().unwrap().active);
    }

    #[test]
    fn deactivate_unknown_targets() {
        let admin = Principal::derive("admin");
        let engine = engine_with_admin(&admin);
        let ghost = Principal::derive("ghost");

        let err = engine
            .apply(&call(&admin, Action::DeactivateHandler { handler: ghost }), NOW)
            .unwrap_err();
        assert!(matches!(err, AgroError::HandlerNotFound(_)));

        let err = engine
            .apply(&call(&admin, Action::DeactivateCertificationAuthority { authority: ghost }), NOW)
            .unwrap_err();
        assert!(matches!(err, AgroError::AuthorityNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn authority_types_replaced_on_reregistration() {
        let engine = engine();
        let ca = Principal::derive("ca");
        engine.apply(&call(&ca, authority_action(&["organic", "fair-trade"])), NOW).unwrap();
        assert!(engine.db.get_authority(&ca).unwrap().unwrap().permits("fair-trade"));

        engine.apply(&call(&ca, authority_action(&["organic"])), NOW).unwrap();
        let record = engine.db.get_authority(&ca).unwrap().unwrap();
        assert!(record.permits("organic"));
        assert!(!record.permits("fair-trade"));
    }

    #[test]
    fn deactivated_authority_permits_nothing() {
        let admin = Principal::derive("admin");
        let engine = engine_with_admin(&admin);
        let ca = Principal::derive("ca");
        engine.apply(&call(&ca, authority_action(&["organic"])), NOW).unwrap();
        engine
            .apply(&call(&admin, Action::DeactivateCertificationAuthority { authority: ca }), NOW)
            .unwrap();
        assert!(!engine.db.get_authority(&ca).unwrap().unwrap().permits("organic"));
    }
}
