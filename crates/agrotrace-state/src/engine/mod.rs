use std::sync::Arc;

use agrotrace_core::call::{Action, Call, CallOutcome};
use agrotrace_core::error::AgroError;
use agrotrace_core::participant::Permission;
use agrotrace_core::types::{Principal, Timestamp};
use parking_lot::Mutex;
use tracing::info;

use crate::db::{StagedMutations, StateDb};

mod directory;
mod ledger;
mod registry;

// ── StateEngine ───────────────────────────────────────────────────────────────

/// The registry state transition engine.
///
/// Validates and applies calls to the persistent state database. Calls are
/// serialized: each one runs its authorization reads, stages its writes and
/// commits them while holding the apply lock, so every call observes the
/// committed result of the one before it. A rejected call writes nothing.
pub struct StateEngine {
    pub db: Arc<StateDb>,
    apply_lock: Mutex<()>,
}

impl StateEngine {
    pub fn new(db: Arc<StateDb>) -> Self {
        Self { db, apply_lock: Mutex::new(()) }
    }

    /// Validate and apply one call on behalf of its (already authenticated)
    /// caller.
    pub fn apply(&self, call: &Call, now: Timestamp) -> Result<CallOutcome, AgroError> {
        let _guard = self.apply_lock.lock();

        call.action.check_bounds()?;

        let mut staged = StagedMutations::default();
        let outcome = self.apply_action(&call.caller, &call.action, &mut staged, now)?;

        if call.action.is_ledger_mutation() && staged.events.len() != 1 {
            return Err(AgroError::EventInvariant {
                op: call.action.name(),
                staged: staged.events.len(),
            });
        }

        // ── Commit ────────────────────────────────────────────────────────────
        self.db.commit(&staged)?;

        info!(caller = %call.caller, op = call.action.name(), "applied call");
        Ok(outcome)
    }

    // ── Action dispatch ───────────────────────────────────────────────────────

    fn apply_action(
        &self,
        caller: &Principal,
        action: &Action,
        staged: &mut StagedMutations,
        now: Timestamp,
    ) -> Result<CallOutcome, AgroError> {
        match action {
            // ── Participant directory ─────────────────────────────────────────
            Action::Register { name, role, location, metadata } => {
                self.register_participant(caller, name, *role, location, metadata, staged, now)
            }
            Action::Verify { participant } => {
                self.verify_participant(caller, participant, staged, now)
            }
            Action::UpdateStatus { participant, new_status } => {
                self.update_status(caller, participant, *new_status, staged, now)
            }
            Action::UpdateInfo { name, location, metadata } => {
                self.update_info(caller, name, location, metadata, staged, now)
            }
            Action::UpdateReputation { participant, score } => {
                self.update_reputation(caller, participant, *score, staged, now)
            }
            Action::GrantVerifier { account } => {
                self.grant(caller, Permission::Verifier, account, staged)
            }
            Action::RevokeVerifier { account } => {
                self.revoke(caller, Permission::Verifier, account, staged)
            }
            Action::GrantAdmin { account } => {
                self.grant(caller, Permission::Admin, account, staged)
            }

            // ── Authority & handler registry ──────────────────────────────────
            Action::RegisterHandler { handler_type } => {
                self.register_handler(caller, handler_type, staged, now)
            }
            Action::DeactivateHandler { handler } => {
                self.deactivate_handler(caller, handler, staged)
            }
            Action::RegisterCertificationAuthority { name, cert_types } => {
                self.register_authority(caller, name, cert_types, staged, now)
            }
            Action::DeactivateCertificationAuthority { authority } => {
                self.deactivate_authority(caller, authority, staged)
            }

            // ── Product custody ledger ────────────────────────────────────────
            Action::RegisterProduct { product_type, harvest_date } => {
                self.register_product(caller, product_type, *harvest_date, staged, now)
            }
            Action::TransferCustody { product_id, new_custodian, details, location } => self
                .transfer_custody(
                    caller,
                    *product_id,
                    new_custodian,
                    details,
                    location.as_deref(),
                    staged,
                    now,
                ),
            Action::AddCertification { product_id, cert_type, expiry_date, details } => self
                .add_certification(caller, *product_id, cert_type, *expiry_date, details, staged, now),
            Action::RecordSupplyChainEvent { product_id, event_type, details, location } => self
                .record_event(
                    caller,
                    *product_id,
                    event_type,
                    details,
                    location.as_deref(),
                    staged,
                    now,
                ),
            Action::MarkProductSold { product_id, details, location } => {
                self.mark_sold(caller, *product_id, details, location.as_deref(), staged, now)
            }
        }
    }

    // ── Permission helpers ────────────────────────────────────────────────────

    pub(crate) fn is_admin(&self, who: &Principal) -> Result<bool, AgroError> {
        self.db.has_grant(Permission::Admin, who)
    }

    /// Verifier or admin.
    pub(crate) fn can_verify(&self, who: &Principal) -> Result<bool, AgroError> {
        Ok(self.db.has_grant(Permission::Verifier, who)? || self.is_admin(who)?)
    }

    pub(crate) fn require_admin(&self, who: &Principal) -> Result<(), AgroError> {
        if !self.is_admin(who)? {
            return Err(AgroError::OnlyAdmin);
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
