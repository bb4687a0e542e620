use agrotrace_core::call::CallOutcome;
use agrotrace_core::error::AgroError;
use agrotrace_core::participant::{Participant, ParticipantStatus, Permission, Role};
use agrotrace_core::types::{Principal, Reputation, Timestamp};
use tracing::debug;

use super::StateEngine;
use crate::db::StagedMutations;

impl StateEngine {
    // ── Register ──────────────────────────────────────────────────────────────

    pub(super) fn register_participant(
        &self,
        caller: &Principal,
        name: &str,
        role_code: u8,
        location: &str,
        metadata: &str,
        staged: &mut StagedMutations,
        now: Timestamp,
    ) -> Result<CallOutcome, AgroError> {
        if self.db.participant_exists(caller)? {
            return Err(AgroError::AlreadyRegistered(caller.to_string()));
        }
        let role = Role::from_code(role_code)?;
        if role.is_privileged() {
            return Err(AgroError::PrivilegedRole(role));
        }

        let count = self.db.get_role_count(role)? + 1;
        staged.role_counts.insert(role, count);
        staged.participants.push(Participant::new(
            *caller,
            name.to_string(),
            role,
            location.to_string(),
            metadata.to_string(),
            now,
        ));
        debug!(participant = %caller, %role, "participant registered");
        Ok(CallOutcome::Identity(*caller))
    }

    // ── Verify ────────────────────────────────────────────────────────────────

    pub(super) fn verify_participant(
        &self,
        caller: &Principal,
        target: &Principal,
        staged: &mut StagedMutations,
        now: Timestamp,
    ) -> Result<CallOutcome, AgroError> {
        if !self.can_verify(caller)? {
            return Err(AgroError::OnlyVerifier);
        }
        let mut participant = self.load_participant(target)?;
        if participant.status != ParticipantStatus::Pending {
            return Err(AgroError::ParticipantNotPending { status: participant.status });
        }

        participant.status = ParticipantStatus::Verified;
        participant.verified_by = Some(*caller);
        participant.updated_at = now;
        staged.participants.push(participant);
        debug!(participant = %target, verifier = %caller, "participant verified");
        Ok(CallOutcome::Done)
    }

    // ── UpdateStatus ──────────────────────────────────────────────────────────

    pub(super) fn update_status(
        &self,
        caller: &Principal,
        target: &Principal,
        status_code: u8,
        staged: &mut StagedMutations,
        now: Timestamp,
    ) -> Result<CallOutcome, AgroError> {
        if !self.can_verify(caller)? {
            return Err(AgroError::OnlyVerifier);
        }
        let mut participant = self.load_participant(target)?;
        let status = ParticipantStatus::from_code(status_code)?;

        // No transition graph: any recognized status may replace any other.
        participant.status = status;
        participant.updated_at = now;
        staged.participants.push(participant);
        debug!(participant = %target, %status, "participant status updated");
        Ok(CallOutcome::Done)
    }

    // ── UpdateInfo ────────────────────────────────────────────────────────────

    pub(super) fn update_info(
        &self,
        caller: &Principal,
        name: &str,
        location: &str,
        metadata: &str,
        staged: &mut StagedMutations,
        now: Timestamp,
    ) -> Result<CallOutcome, AgroError> {
        let mut participant = self.load_participant(caller)?;
        participant.name = name.to_string();
        participant.location = location.to_string();
        participant.metadata = metadata.to_string();
        participant.updated_at = now;
        staged.participants.push(participant);
        Ok(CallOutcome::Done)
    }

    // ── UpdateReputation ──────────────────────────────────────────────────────

    pub(super) fn update_reputation(
        &self,
        caller: &Principal,
        target: &Principal,
        score: Reputation,
        staged: &mut StagedMutations,
        now: Timestamp,
    ) -> Result<CallOutcome, AgroError> {
        if !self.can_verify(caller)? {
            return Err(AgroError::OnlyVerifier);
        }
        let mut participant = self.load_participant(target)?;
        participant.reputation = score;
        participant.updated_at = now;
        staged.participants.push(participant);
        Ok(CallOutcome::Done)
    }

    // ── Permission grants ─────────────────────────────────────────────────────

    /// Add `account` to a permission set. Granting an existing member is a
    /// successful no-op, so the role counter moves only on real changes.
    pub(super) fn grant(
        &self,
        caller: &Principal,
        perm: Permission,
        account: &Principal,
        staged: &mut StagedMutations,
    ) -> Result<CallOutcome, AgroError> {
        self.require_admin(caller)?;
        if self.db.has_grant(perm, account)? {
            return Ok(CallOutcome::Done);
        }
        let role = perm.role();
        let count = self.db.get_role_count(role)? + 1;
        staged.grants.push((perm, *account, true));
        staged.role_counts.insert(role, count);
        debug!(account = %account, ?perm, granted_by = %caller, "permission granted");
        Ok(CallOutcome::Done)
    }

    pub(super) fn revoke(
        &self,
        caller: &Principal,
        perm: Permission,
        account: &Principal,
        staged: &mut StagedMutations,
    ) -> Result<CallOutcome, AgroError> {
        self.require_admin(caller)?;
        if !self.db.has_grant(perm, account)? {
            return Ok(CallOutcome::Done);
        }
        let role = perm.role();
        let count = self.db.get_role_count(role)?.saturating_sub(1);
        staged.grants.push((perm, *account, false));
        staged.role_counts.insert(role, count);
        debug!(account = %account, ?perm, revoked_by = %caller, "permission revoked");
        Ok(CallOutcome::Done)
    }

    fn load_participant(&self, id: &Principal) -> Result<Participant, AgroError> {
        self.db
            .get_participant(id)?
            .ok_or_else(|| AgroError::ParticipantNotFound(id.to_string()))
    }
}
