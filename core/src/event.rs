//! Audit trail of committed escrow transitions.

use serde::{Deserialize, Serialize};

use crate::escrow::{EscrowId, EscrowState};
use crate::identity::Party;

/// What happened to an escrow.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Opened,
    Deposited,
    Released,
    Refunded,
}

/// One committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowEvent {
    pub escrow_id: EscrowId,
    pub kind: EventKind,
    /// Party that triggered the transition; `None` for opens.
    pub actor: Option<Party>,
    /// Value moved by the transition.
    pub amount: u64,
    /// State after the transition.
    pub state: EscrowState,
    pub at: u64,
}
