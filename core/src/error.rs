use thiserror::Error;

use crate::auth::Action;
use crate::escrow::{EscrowId, EscrowState};
use crate::identity::Party;

/// Escrow-related errors.
#[derive(Debug, Error, PartialEq)]
pub enum EscrowError {
    /// Operation is not valid from the account's current state.
    #[error("cannot {action} an escrow in state {state}")]
    InvalidState { state: EscrowState, action: Action },

    /// Zero amount, or more than the configured ceiling.
    #[error("invalid amount: {0}")]
    InvalidAmount(u64),

    /// Caller failed the role policy or the authorizer check.
    #[error("{caller} is not authorized to {action}")]
    Unauthorized { caller: Party, action: Action },

    /// The ledger failed or rolled back the value movement.
    #[error("ledger failure: {0}")]
    LedgerFailure(LedgerError),

    #[error("escrow not found: {0}")]
    NotFound(EscrowId),

    /// Release condition not met.
    #[error("condition not satisfied: {0}")]
    ConditionViolation(ConditionError),

    #[error("identity error: {0}")]
    Identity(IdentityError),
}

/// Errors reported by a [`Ledger`](crate::ledger::Ledger) backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient funds for {party}: needed {needed}, available {available}")]
    InsufficientFunds {
        party: Party,
        needed: u64,
        available: u64,
    },

    #[error("balance overflow for {party}")]
    Overflow { party: Party },

    /// The backend refused the transaction (e.g. never included).
    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Errors that might occur while parsing into an `ID`.
#[derive(Debug, Error, PartialEq)]
pub enum IdentityError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid base58: {0}")]
    Base58(#[from] bs58::decode::Error),

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("cannot parse identity from empty string")]
    EmptyIdentity,

    #[error("unsupported identity format")]
    UnsupportedFormat,
}

/// Errors from release-condition verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConditionError {
    #[error("condition requires a fulfillment")]
    MissingFulfillment,

    #[error("SHA256(preimage) != hash")]
    PreimageMismatch,
}

impl From<LedgerError> for EscrowError {
    fn from(value: LedgerError) -> Self {
        Self::LedgerFailure(value)
    }
}

impl From<IdentityError> for EscrowError {
    fn from(value: IdentityError) -> Self {
        Self::Identity(value)
    }
}

impl From<ConditionError> for EscrowError {
    fn from(value: ConditionError) -> Self {
        Self::ConditionViolation(value)
    }
}
