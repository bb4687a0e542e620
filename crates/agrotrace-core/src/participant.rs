use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AgroError;
use crate::types::{Principal, Reputation, Timestamp};

// ── Role ─────────────────────────────────────────────────────────────────────

/// Descriptive role a participant declares at registration.
///
/// The role is advisory: verifier and admin permissions are granted through
/// separate permission sets, never by this field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Farmer = 1,
    Distributor = 2,
    Processor = 3,
    Retailer = 4,
    Verifier = 5,
    Admin = 6,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Farmer,
        Role::Distributor,
        Role::Processor,
        Role::Retailer,
        Role::Verifier,
        Role::Admin,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(v: u8) -> Result<Self, AgroError> {
        match v {
            1 => Ok(Role::Farmer),
            2 => Ok(Role::Distributor),
            3 => Ok(Role::Processor),
            4 => Ok(Role::Retailer),
            5 => Ok(Role::Verifier),
            6 => Ok(Role::Admin),
            other => Err(AgroError::InvalidRole(other)),
        }
    }

    /// Roles that only an out-of-band grant may confer.
    pub fn is_privileged(self) -> bool {
        matches!(self, Role::Verifier | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Farmer => "farmer",
            Role::Distributor => "distributor",
            Role::Processor => "processor",
            Role::Retailer => "retailer",
            Role::Verifier => "verifier",
            Role::Admin => "admin",
        };
        f.write_str(s)
    }
}

// ── ParticipantStatus ────────────────────────────────────────────────────────

/// Lifecycle status of a participant.
///
/// Pending → Verified only through verification; any other move goes through
/// an unrestricted status update. No status is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantStatus {
    Pending = 1,
    Verified = 2,
    Suspended = 3,
    Revoked = 4,
}

impl ParticipantStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(v: u8) -> Result<Self, AgroError> {
        match v {
            1 => Ok(ParticipantStatus::Pending),
            2 => Ok(ParticipantStatus::Verified),
            3 => Ok(ParticipantStatus::Suspended),
            4 => Ok(ParticipantStatus::Revoked),
            other => Err(AgroError::InvalidStatus(other)),
        }
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParticipantStatus::Pending => "pending",
            ParticipantStatus::Verified => "verified",
            ParticipantStatus::Suspended => "suspended",
            ParticipantStatus::Revoked => "revoked",
        };
        f.write_str(s)
    }
}

// ── Participant ──────────────────────────────────────────────────────────────

/// Directory record, keyed by the participant's principal. Never deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Principal,
    pub name: String,
    pub role: Role,
    pub status: ParticipantStatus,
    pub reputation: Reputation,
    pub location: String,
    pub metadata: String,
    pub registered_at: Timestamp,
    pub updated_at: Timestamp,
    /// Verifier or admin that approved the record.
    pub verified_by: Option<Principal>,
}

impl Participant {
    pub fn new(
        id: Principal,
        name: String,
        role: Role,
        location: String,
        metadata: String,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            name,
            role,
            status: ParticipantStatus::Pending,
            reputation: 0,
            location,
            metadata,
            registered_at: now,
            updated_at: now,
            verified_by: None,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == ParticipantStatus::Verified
    }

    /// True iff the participant declared `role` and has been verified.
    pub fn is_authorized_as(&self, role: Role) -> bool {
        self.role == role && self.is_verified()
    }
}

// ── Permission grants ────────────────────────────────────────────────────────

/// The two out-of-band permission sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    Verifier,
    Admin,
}

impl Permission {
    pub fn tag(self) -> u8 {
        match self {
            Permission::Verifier => b'v',
            Permission::Admin => b'a',
        }
    }

    /// Role counter that mirrors membership of this set.
    pub fn role(self) -> Role {
        match self {
            Permission::Verifier => Role::Verifier,
            Permission::Admin => Role::Admin,
        }
    }
}
