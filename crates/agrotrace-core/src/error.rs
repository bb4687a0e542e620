use serde::Serialize;
use thiserror::Error;

use crate::participant::{ParticipantStatus, Role};
use crate::types::ProductId;

/// Coarse failure taxonomy shared by every component.
///
/// Callers branch on the kind; the concrete `AgroError` variant carries the
/// detail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller lacks the required permission or role.
    NotAuthorized,
    /// A referenced participant, product, certification, handler or authority does not exist.
    NotFound,
    /// Duplicate registration where uniqueness is required.
    AlreadyExists,
    /// Enum value or field outside the recognized set or bounds.
    InvalidArgument,
    /// Operation forbidden by the current lifecycle state.
    InvalidState,
    /// Storage or serialization fault.
    Internal,
}

#[derive(Debug, Error)]
pub enum AgroError {
    // ── Participant directory ────────────────────────────────────────────────
    #[error("participant already registered: {0}")]
    AlreadyRegistered(String),

    #[error("invalid role code: {0}")]
    InvalidRole(u8),

    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("only a verifier or admin may perform this operation")]
    OnlyVerifier,

    #[error("only an admin may perform this operation")]
    OnlyAdmin,

    #[error("participant not found: {0}")]
    ParticipantNotFound(String),

    #[error("invalid status code: {0}")]
    InvalidStatus(u8),

    #[error("invalid status: participant is {status}, expected pending")]
    ParticipantNotPending { status: ParticipantStatus },

    #[error("role {0} cannot be self-assigned at registration")]
    PrivilegedRole(Role),

    // ── Authority & handler registry ─────────────────────────────────────────
    #[error("handler not found: {0}")]
    HandlerNotFound(String),

    #[error("certification authority not found: {0}")]
    AuthorityNotFound(String),

    // ── Product custody ledger ───────────────────────────────────────────────
    #[error("unknown product: {0}")]
    InvalidProduct(ProductId),

    #[error("caller is not the current custodian of product {0}")]
    NotProductOwner(ProductId),

    #[error("not an active handler: {0}")]
    InvalidHandler(String),

    #[error("product {0} has already been sold")]
    ProductAlreadySold(ProductId),

    #[error("caller is not a certification authority for type {0:?}")]
    UnknownCertificationAuthority(String),

    #[error("certification {cert_type:?} already exists for product {product_id}")]
    CertificationAlreadyExists { product_id: ProductId, cert_type: String },

    #[error("{op} staged {staged} events; a ledger mutation appends exactly one")]
    EventInvariant { op: &'static str, staged: usize },

    // ── Argument bounds ──────────────────────────────────────────────────────
    #[error("{field} exceeds maximum length of {max} bytes")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("too many certification types: maximum {max}")]
    TooManyCertTypes { max: usize },

    #[error("invalid principal: {0}")]
    InvalidPrincipal(String),

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl AgroError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgroError::NotAuthorized(_)
            | AgroError::OnlyVerifier
            | AgroError::OnlyAdmin
            | AgroError::PrivilegedRole(_)
            | AgroError::NotProductOwner(_)
            | AgroError::InvalidHandler(_)
            | AgroError::UnknownCertificationAuthority(_) => ErrorKind::NotAuthorized,

            AgroError::ParticipantNotFound(_)
            | AgroError::HandlerNotFound(_)
            | AgroError::AuthorityNotFound(_)
            | AgroError::InvalidProduct(_) => ErrorKind::NotFound,

            AgroError::AlreadyRegistered(_) | AgroError::CertificationAlreadyExists { .. } => {
                ErrorKind::AlreadyExists
            }

            AgroError::InvalidRole(_)
            | AgroError::InvalidStatus(_)
            | AgroError::FieldTooLong { .. }
            | AgroError::EmptyField(_)
            | AgroError::TooManyCertTypes { .. }
            | AgroError::InvalidPrincipal(_) => ErrorKind::InvalidArgument,

            AgroError::ParticipantNotPending { .. } | AgroError::ProductAlreadySold(_) => {
                ErrorKind::InvalidState
            }

            AgroError::EventInvariant { .. }
            | AgroError::Serialization(_)
            | AgroError::Storage(_) => ErrorKind::Internal,
        }
    }
}
