use agrotrace_core::call::CallOutcome;
use agrotrace_core::constants::{
    EVENT_CERTIFICATION, EVENT_CUSTODY_TRANSFER, EVENT_REGISTRATION, EVENT_SOLD,
};
use agrotrace_core::error::AgroError;
use agrotrace_core::product::{Certification, EventRecord, Product, ProductStatus};
use agrotrace_core::types::{Principal, ProductId, Timestamp};
use tracing::debug;

use super::StateEngine;
use crate::db::StagedMutations;

impl StateEngine {
    // ── Event append ──────────────────────────────────────────────────────────

    /// Append one entry to a product's log at the current count and bump the
    /// count. The only code path that writes event-log state.
    fn append_event(
        &self,
        staged: &mut StagedMutations,
        product_id: ProductId,
        event_type: &str,
        actor: &Principal,
        details: String,
        location: Option<&str>,
        now: Timestamp,
    ) -> Result<(), AgroError> {
        let index = match staged.event_counts.get(&product_id) {
            Some(count) => *count,
            None => self.db.get_event_count(product_id)?,
        };
        staged.events.push(EventRecord {
            product_id,
            index,
            timestamp: now,
            event_type: event_type.to_string(),
            actor: *actor,
            details,
            location: location.map(str::to_string),
        });
        staged.event_counts.insert(product_id, index + 1);
        Ok(())
    }

    fn load_product(&self, product_id: ProductId) -> Result<Product, AgroError> {
        self.db
            .get_product(product_id)?
            .ok_or(AgroError::InvalidProduct(product_id))
    }

    fn is_active_handler(&self, who: &Principal) -> Result<bool, AgroError> {
        Ok(self.db.get_handler(who)?.is_some_and(|h| h.active))
    }

    // ── RegisterProduct ───────────────────────────────────────────────────────

    pub(super) fn register_product(
        &self,
        caller: &Principal,
        product_type: &str,
        harvest_date: u64,
        staged: &mut StagedMutations,
        now: Timestamp,
    ) -> Result<CallOutcome, AgroError> {
        // Allocation and counter bump share the commit, so a rejected call
        // never consumes an id.
        let id = self.db.next_product_id()?;
        staged.next_product_id = Some(id + 1);
        staged.products.push(Product::new(id, *caller, product_type.to_string(), harvest_date, now));
        staged.event_counts.insert(id, 0);

        self.append_event(
            staged,
            id,
            EVENT_REGISTRATION,
            caller,
            format!("{product_type} harvested {harvest_date} registered"),
            None,
            now,
        )?;
        debug!(product_id = id, farm = %caller, product_type, "product registered");
        Ok(CallOutcome::Product(id))
    }

    // ── TransferCustody ───────────────────────────────────────────────────────

    pub(super) fn transfer_custody(
        &self,
        caller: &Principal,
        product_id: ProductId,
        new_custodian: &Principal,
        details: &str,
        location: Option<&str>,
        staged: &mut StagedMutations,
        now: Timestamp,
    ) -> Result<CallOutcome, AgroError> {
        let mut product = self.load_product(product_id)?;
        if product.is_sold {
            return Err(AgroError::ProductAlreadySold(product_id));
        }
        if !product.is_custodian(caller) {
            return Err(AgroError::NotProductOwner(product_id));
        }
        if !self.is_active_handler(new_custodian)? {
            return Err(AgroError::InvalidHandler(new_custodian.to_string()));
        }

        product.custodian = *new_custodian;
        staged.products.push(product);
        self.append_event(
            staged,
            product_id,
            EVENT_CUSTODY_TRANSFER,
            caller,
            details.to_string(),
            location,
            now,
        )?;
        debug!(product_id, from = %caller, to = %new_custodian, "custody transferred");
        Ok(CallOutcome::Done)
    }

    // ── AddCertification ──────────────────────────────────────────────────────

    pub(super) fn add_certification(
        &self,
        caller: &Principal,
        product_id: ProductId,
        cert_type: &str,
        expiry_date: Timestamp,
        details: &str,
        staged: &mut StagedMutations,
        now: Timestamp,
    ) -> Result<CallOutcome, AgroError> {
        self.load_product(product_id)?;
        let authorized = self.db.get_authority(caller)?.is_some_and(|a| a.permits(cert_type));
        if !authorized {
            return Err(AgroError::UnknownCertificationAuthority(cert_type.to_string()));
        }
        if self.db.get_certification(product_id, cert_type)?.is_some() {
            return Err(AgroError::CertificationAlreadyExists {
                product_id,
                cert_type: cert_type.to_string(),
            });
        }

        staged.certifications.push(Certification {
            product_id,
            cert_type: cert_type.to_string(),
            certifier: *caller,
            issued_at: now,
            expires_at: expiry_date,
            details: details.to_string(),
        });
        self.append_event(
            staged,
            product_id,
            EVENT_CERTIFICATION,
            caller,
            format!("{cert_type} certification added"),
            None,
            now,
        )?;
        debug!(product_id, cert_type, certifier = %caller, "certification added");
        Ok(CallOutcome::Done)
    }

    // ── RecordSupplyChainEvent ────────────────────────────────────────────────

    pub(super) fn record_event(
        &self,
        caller: &Principal,
        product_id: ProductId,
        event_type: &str,
        details: &str,
        location: Option<&str>,
        staged: &mut StagedMutations,
        now: Timestamp,
    ) -> Result<CallOutcome, AgroError> {
        let product = self.load_product(product_id)?;
        if !self.is_active_handler(caller)? {
            return Err(AgroError::NotAuthorized("caller is not an active handler".into()));
        }
        if !product.is_custodian(caller) {
            return Err(AgroError::NotProductOwner(product_id));
        }

        self.append_event(staged, product_id, event_type, caller, details.to_string(), location, now)?;
        debug!(product_id, event_type, "supply chain event recorded");
        Ok(CallOutcome::Done)
    }

    // ── MarkProductSold ───────────────────────────────────────────────────────

    pub(super) fn mark_sold(
        &self,
        caller: &Principal,
        product_id: ProductId,
        details: &str,
        location: Option<&str>,
        staged: &mut StagedMutations,
        now: Timestamp,
    ) -> Result<CallOutcome, AgroError> {
        let mut product = self.load_product(product_id)?;
        // Sold is terminal and reported ahead of any authorization failure.
        if product.is_sold {
            return Err(AgroError::ProductAlreadySold(product_id));
        }
        if !product.is_custodian(caller) {
            return Err(AgroError::NotProductOwner(product_id));
        }

        product.status = ProductStatus::Sold;
        product.is_sold = true;
        staged.products.push(product);
        self.append_event(staged, product_id, EVENT_SOLD, caller, details.to_string(), location, now)?;
        debug!(product_id, seller = %caller, "product sold");
        Ok(CallOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use agrotrace_core::call::{Action, CallOutcome};
    use agrotrace_core::error::{AgroError, ErrorKind};
    use agrotrace_core::product::ProductStatus;
    use agrotrace_core::types::{Principal, ProductId};

    use crate::engine::tests::{call, engine, NOW};
    use crate::engine::StateEngine;

    fn register_product(engine: &StateEngine, farm: &Principal) -> ProductId {
        match engine
            .apply(&call(farm, Action::RegisterProduct {
                product_type: "coffee".into(),
                harvest_date: 20240101,
            }), NOW)
            .unwrap()
        {
            CallOutcome::Product(id) => id,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    fn register_handler(engine: &StateEngine, who: &Principal) {
        engine
            .apply(&call(who, Action::RegisterHandler { handler_type: "distributor".into() }), NOW)
            .unwrap();
    }

    fn transfer(to: Principal) -> Action {
        Action::TransferCustody {
            product_id: 0,
            new_custodian: to,
            details: "shipped".into(),
            location: Some("Port of Santos".into()),
        }
    }

    fn sell() -> Action {
        Action::MarkProductSold { product_id: 0, details: "retail".into(), location: None }
    }

    #[test]
    fn ids_are_sequential() {
        let engine = engine();
        let farm = Principal::derive("farm");
        assert_eq!(register_product(&engine, &farm), 0);
        assert_eq!(register_product(&engine, &farm), 1);
        assert_eq!(register_product(&engine, &farm), 2);
        assert_eq!(engine.db.next_product_id().unwrap(), 3);
    }

    #[test]
    fn registration_event_written() {
        let engine = engine();
        let farm = Principal::derive("farm");
        let id = register_product(&engine, &farm);

        let product = engine.db.get_product(id).unwrap().unwrap();
        assert_eq!(product.farm, farm);
        assert_eq!(product.custodian, farm);
        assert_eq!(product.status, ProductStatus::Active);
        assert!(!product.is_sold);

        assert_eq!(engine.db.get_event_count(id).unwrap(), 1);
        let event = engine.db.get_event(id, 0).unwrap().unwrap();
        assert_eq!(event.event_type, "registration");
        assert_eq!(event.actor, farm);
        assert_eq!(event.timestamp, NOW);
    }

    #[test]
    fn transfer_moves_custody() {
        let engine = engine();
        let farm = Principal::derive("farm");
        let h = Principal::derive("handler");
        register_product(&engine, &farm);
        register_handler(&engine, &h);

        engine.apply(&call(&farm, transfer(h)), NOW + 1).unwrap();
        assert_eq!(engine.db.get_product(0).unwrap().unwrap().custodian, h);

        let event = engine.db.get_event(0, 1).unwrap().unwrap();
        assert_eq!(event.event_type, "custody-transfer");
        assert_eq!(event.location.as_deref(), Some("Port of Santos"));
        assert_eq!(engine.db.get_event_count(0).unwrap(), 2);
    }

    #[test]
    fn transfer_check_order() {
        let engine = engine();
        let farm = Principal::derive("farm");
        let h = Principal::derive("handler");
        let stranger = Principal::derive("stranger");

        let err = engine.apply(&call(&farm, transfer(h)), NOW).unwrap_err();
        assert!(matches!(err, AgroError::InvalidProduct(0)));

        register_product(&engine, &farm);
        // Not custodian is reported ahead of a bad recipient.
        let err = engine.apply(&call(&stranger, transfer(stranger)), NOW).unwrap_err();
        assert!(matches!(err, AgroError::NotProductOwner(0)));

        let err = engine.apply(&call(&farm, transfer(stranger)), NOW).unwrap_err();
        assert!(matches!(err, AgroError::InvalidHandler(_)));
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    }

    #[test]
    fn sold_is_terminal() {
        let engine = engine();
        let farm = Principal::derive("farm");
        let h = Principal::derive("handler");
        register_product(&engine, &farm);
        register_handler(&engine, &h);

        engine.apply(&call(&farm, sell()), NOW).unwrap();
        let product = engine.db.get_product(0).unwrap().unwrap();
        assert_eq!(product.status, ProductStatus::Sold);
        assert!(product.is_sold);

        let err = engine.apply(&call(&farm, sell()), NOW).unwrap_err();
        assert!(matches!(err, AgroError::ProductAlreadySold(0)));
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = engine.apply(&call(&farm, transfer(h)), NOW).unwrap_err();
        assert!(matches!(err, AgroError::ProductAlreadySold(0)));
        assert_eq!(engine.db.get_event_count(0).unwrap(), 2);
    }

    #[test]
    fn sold_state_reported_before_authorization() {
        let engine = engine();
        let farm = Principal::derive("farm");
        register_product(&engine, &farm);
        engine.apply(&call(&farm, sell()), NOW).unwrap();

        let err = engine
            .apply(&call(&farm, transfer(Principal::derive("nobody"))), NOW)
            .unwrap_err();
        assert!(matches!(err, AgroError::ProductAlreadySold(0)));
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = engine
            .apply(&call(&Principal::derive("other"), sell()), NOW)
            .unwrap_err();
        assert!(matches!(err, AgroError::ProductAlreadySold(0)));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(engine.db.get_event_count(0).unwrap(), 2);
    }

    #[test]
    fn mark_sold_requires_custodian() {
        let engine = engine();
        let farm = Principal::derive("farm");
        register_product(&engine, &farm);
        let err = engine
            .apply(&call(&Principal::derive("other"), sell()), NOW)
            .unwrap_err();
        assert!(matches!(err, AgroError::NotProductOwner(0)));
    }

    #[test]
    fn certification_write_once() {
        let engine = engine();
        let farm = Principal::derive("farm");
        let ca = Principal::derive("ca");
        register_product(&engine, &farm);
        engine
            .apply(&call(&ca, Action::RegisterCertificationAuthority {
                name: "Organic Board".into(),
                cert_types: vec!["organic".into()],
            }), NOW)
            .unwrap();

        let certify = Action::AddCertification {
            product_id: 0,
            cert_type: "organic".into(),
            expiry_date: NOW + 86_400,
            details: "lot inspected".into(),
        };
        engine.apply(&call(&ca, certify.clone()), NOW).unwrap();

        let cert = engine.db.get_certification(0, "organic").unwrap().unwrap();
        assert_eq!(cert.certifier, ca);
        assert_eq!(cert.expires_at, NOW + 86_400);
        let event = engine.db.get_event(0, 1).unwrap().unwrap();
        assert_eq!(event.event_type, "certification");
        assert_eq!(event.details, "organic certification added");

        let err = engine.apply(&call(&ca, certify), NOW).unwrap_err();
        assert!(matches!(err, AgroError::CertificationAlreadyExists { product_id: 0, .. }));
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(engine.db.get_event_count(0).unwrap(), 2);
    }

    #[test]
    fn certification_requires_matching_type() {
        let engine = engine();
        let farm = Principal::derive("farm");
        let ca = Principal::derive("ca");
        register_product(&engine, &farm);
        engine
            .apply(&call(&ca, Action::RegisterCertificationAuthority {
                name: "Fair Trade Co".into(),
                cert_types: vec!["fair-trade".into()],
            }), NOW)
            .unwrap();

        for certifier in [ca, farm] {
            let err = engine
                .apply(&call(&certifier, Action::AddCertification {
                    product_id: 0,
                    cert_type: "organic".into(),
                    expiry_date: NOW + 1,
                    details: String::new(),
                }), NOW)
                .unwrap_err();
            assert!(matches!(err, AgroError::UnknownCertificationAuthority(_)));
        }
    }

    #[test]
    fn record_event_requires_active_custodian_handler() {
        let engine = engine();
        let farm = Principal::derive("farm");
        let h = Principal::derive("handler");
        let other = Principal::derive("other-handler");
        register_product(&engine, &farm);
        register_handler(&engine, &h);
        register_handler(&engine, &other);

        let quality_check = Action::RecordSupplyChainEvent {
            product_id: 0,
            event_type: "quality-check".into(),
            details: "moisture 11%".into(),
            location: Some("Warehouse 4".into()),
        };

        // The farm holds custody but is no handler.
        let err = engine.apply(&call(&farm, quality_check.clone()), NOW).unwrap_err();
        assert!(matches!(err, AgroError::NotAuthorized(_)));

        engine.apply(&call(&farm, transfer(h)), NOW).unwrap();
        let err = engine.apply(&call(&other, quality_check.clone()), NOW).unwrap_err();
        assert!(matches!(err, AgroError::NotProductOwner(0)));

        engine.apply(&call(&h, quality_check), NOW + 2).unwrap();
        let event = engine.db.get_event(0, 2).unwrap().unwrap();
        assert_eq!(event.event_type, "quality-check");
        assert_eq!(event.actor, h);
        assert_eq!(engine.db.get_event_count(0).unwrap(), 3);
    }

    #[test]
    fn failed_registration_consumes_no_id() {
        let engine = engine();
        let farm = Principal::derive("farm");
        let err = engine
            .apply(&call(&farm, Action::RegisterProduct {
                product_type: String::new(),
                harvest_date: 20240101,
            }), NOW)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(register_product(&engine, &farm), 0);
    }
}
