use agrotrace_core::error::AgroError;
use agrotrace_core::participant::{Participant, Permission, Role};
use agrotrace_core::types::Principal;
use agrotrace_state::StateDb;

/// Query helpers for participants and permission grants.
pub struct ParticipantQuery<'a> {
    db: &'a StateDb,
}

impl<'a> ParticipantQuery<'a> {
    pub fn new(db: &'a StateDb) -> Self {
        Self { db }
    }

    pub fn get(&self, id: &Principal) -> Result<Option<Participant>, AgroError> {
        self.db.get_participant(id)
    }

    pub fn exists(&self, id: &Principal) -> Result<bool, AgroError> {
        self.db.participant_exists(id)
    }

    /// False for unknown identities.
    pub fn is_verified(&self, id: &Principal) -> Result<bool, AgroError> {
        Ok(self.db.get_participant(id)?.is_some_and(|p| p.is_verified()))
    }

    /// Declared `role` and verified.
    pub fn is_authorized_role(&self, id: &Principal, role: Role) -> Result<bool, AgroError> {
        Ok(self.db.get_participant(id)?.is_some_and(|p| p.is_authorized_as(role)))
    }

    pub fn role_count(&self, role: Role) -> Result<u64, AgroError> {
        self.db.get_role_count(role)
    }

    // ── Permission sets ───────────────────────────────────────────────────────

    pub fn is_admin(&self, id: &Principal) -> Result<bool, AgroError> {
        self.db.has_grant(Permission::Admin, id)
    }

    pub fn is_verifier(&self, id: &Principal) -> Result<bool, AgroError> {
        self.db.has_grant(Permission::Verifier, id)
    }

    /// Admins may do everything a verifier can.
    pub fn can_verify(&self, id: &Principal) -> Result<bool, AgroError> {
        Ok(self.is_verifier(id)? || self.is_admin(id)?)
    }

    pub fn admins(&self) -> Result<Vec<Principal>, AgroError> {
        self.db.iter_grants(Permission::Admin)
    }

    pub fn verifiers(&self) -> Result<Vec<Principal>, AgroError> {
        self.db.iter_grants(Permission::Verifier)
    }

    /// Human-readable summary of a participant record.
    pub fn describe(&self, id: &Principal) -> Result<String, AgroError> {
        let p = self
            .db
            .get_participant(id)?
            .ok_or_else(|| AgroError::ParticipantNotFound(id.to_string()))?;
        let verified = match p.verified_by {
            Some(v) => format!(" by {v}"),
            None => String::new(),
        };
        Ok(format!(
            "{} ({}) | {} | {}{} | reputation {} | {}",
            p.name, id, p.role, p.status, verified, p.reputation, p.location
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use agrotrace_core::call::{Action, Call};
    use agrotrace_core::participant::ParticipantStatus;
    use agrotrace_state::{StagedMutations, StateEngine};

    const NOW: i64 = 1_704_067_200;

    fn setup() -> (StateEngine, Principal) {
        let db = Arc::new(StateDb::open_temporary().unwrap());
        let admin = Principal::derive("admin");
        let mut staged = StagedMutations::default();
        staged.grants.push((Permission::Admin, admin, true));
        db.commit(&staged).unwrap();
        (StateEngine::new(db), admin)
    }

    fn register(engine: &StateEngine, who: &Principal, role: Role) {
        engine
            .apply(&Call::new(*who, Action::Register {
                name: "Sunrise Dairy".into(),
                role: role.code(),
                location: "Wisconsin".into(),
                metadata: String::new(),
            }), NOW)
            .unwrap();
    }

    #[test]
    fn unknown_identity_is_nothing() {
        let (engine, _) = setup();
        let q = ParticipantQuery::new(&engine.db);
        let ghost = Principal::derive("ghost");
        assert!(!q.exists(&ghost).unwrap());
        assert!(!q.is_verified(&ghost).unwrap());
        assert!(!q.is_authorized_role(&ghost, Role::Farmer).unwrap());
        assert!(q.describe(&ghost).is_err());
    }

    #[test]
    fn role_authorization_requires_verification() {
        let (engine, admin) = setup();
        let dairy = Principal::derive("dairy");
        register(&engine, &dairy, Role::Processor);

        let q = ParticipantQuery::new(&engine.db);
        assert!(q.exists(&dairy).unwrap());
        assert!(!q.is_authorized_role(&dairy, Role::Processor).unwrap());

        engine
            .apply(&Call::new(admin, Action::Verify { participant: dairy }), NOW)
            .unwrap();
        assert!(q.is_verified(&dairy).unwrap());
        assert!(q.is_authorized_role(&dairy, Role::Processor).unwrap());
        assert!(!q.is_authorized_role(&dairy, Role::Retailer).unwrap());

        engine
            .apply(&Call::new(admin, Action::UpdateStatus {
                participant: dairy,
                new_status: ParticipantStatus::Suspended.code(),
            }), NOW)
            .unwrap();
        assert!(!q.is_authorized_role(&dairy, Role::Processor).unwrap());
    }

    #[test]
    fn role_counts_and_grant_lists() {
        let (engine, admin) = setup();
        let q = ParticipantQuery::new(&engine.db);
        register(&engine, &Principal::derive("a"), Role::Farmer);
        register(&engine, &Principal::derive("b"), Role::Farmer);
        register(&engine, &Principal::derive("c"), Role::Retailer);
        assert_eq!(q.role_count(Role::Farmer).unwrap(), 2);
        assert_eq!(q.role_count(Role::Retailer).unwrap(), 1);
        assert_eq!(q.role_count(Role::Distributor).unwrap(), 0);

        let v = Principal::derive("verifier");
        engine
            .apply(&Call::new(admin, Action::GrantVerifier { account: v }), NOW)
            .unwrap();
        assert!(q.is_verifier(&v).unwrap());
        assert!(q.can_verify(&v).unwrap());
        assert!(!q.is_admin(&v).unwrap());
        assert!(q.can_verify(&admin).unwrap());
        assert_eq!(q.verifiers().unwrap(), vec![v]);
        assert_eq!(q.admins().unwrap(), vec![admin]);
    }

    #[test]
    fn describe_mentions_verifier() {
        let (engine, admin) = setup();
        let dairy = Principal::derive("dairy");
        register(&engine, &dairy, Role::Processor);
        engine
            .apply(&Call::new(admin, Action::Verify { participant: dairy }), NOW)
            .unwrap();

        let line = ParticipantQuery::new(&engine.db).describe(&dairy).unwrap();
        assert!(line.starts_with("Sunrise Dairy"));
        assert!(line.contains("processor"));
        assert!(line.contains(&format!("by {admin}")));
    }
}
