//! Escrow state machine: deposit, release and refund as pure transitions.
//!
//! Nothing here touches a ledger or an authorizer. Each transition checks the
//! account's state, amount and role policy and returns the account's next
//! value together with the [`Transaction`] that must be committed for it.
//! The engine applies the transaction and only then stores the new value.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::auth::Action;
use crate::condition::Condition;
use crate::config::{EngineConfig, Policy};
use crate::identity::{Party, ID};
use crate::ledger::Transaction;
use crate::{EscrowError, Result};

const CUSTODY_SEED: &[u8] = b"escrow-custody";

/// Engine-assigned escrow identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EscrowId(pub u64);

impl EscrowId {
    /// Deterministic identity holding this escrow's funds while `Funded`.
    pub fn custody(&self) -> Party {
        let digest = Sha256::new()
            .chain_update(CUSTODY_SEED)
            .chain_update(self.0.to_le_bytes())
            .finalize();
        Party::new(ID::from_bytes(digest.to_vec()))
    }
}

impl std::fmt::Display for EscrowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "escrow-{}", self.0)
    }
}

/// Lifecycle of an escrow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EscrowState {
    /// Created; nothing deposited yet.
    Empty,
    /// Funds have been deposited; awaiting release or refund.
    Funded,
    /// Funds have been released to the beneficiary.
    Released,
    /// Funds have been returned to the depositor.
    Refunded,
}

impl EscrowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::Refunded)
    }
}

impl std::fmt::Display for EscrowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Empty => "Empty",
            Self::Funded => "Funded",
            Self::Released => "Released",
            Self::Refunded => "Refunded",
        };
        f.write_str(s)
    }
}

/// Full escrow record, owned by the engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EscrowAccount {
    pub id: EscrowId,
    /// Who funded it. Bound at creation or by the first deposit.
    pub depositor: Option<Party>,
    /// Recipient of released funds.
    pub beneficiary: Party,
    /// Optional third party allowed to release (and, by policy, refund).
    pub arbiter: Option<Party>,
    /// Optional release condition.
    pub condition: Option<Condition>,
    /// Value currently held.
    pub amount: u64,
    pub state: EscrowState,
    pub created_at: u64,
    pub last_transition_at: u64,
}

/// Read-only view handed to callers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EscrowSnapshot {
    pub id: EscrowId,
    pub depositor: Option<Party>,
    pub beneficiary: Party,
    pub arbiter: Option<Party>,
    pub amount: u64,
    pub state: EscrowState,
    pub created_at: u64,
    pub last_transition_at: u64,
}

/// Outcome of a successful pure transition.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Account value to store once `transaction` is committed.
    pub next: EscrowAccount,
    /// Value movement backing the transition.
    pub transaction: Transaction,
}

impl EscrowAccount {
    /// A fresh account in `Empty`.
    pub fn open(
        id: EscrowId,
        beneficiary: Party,
        depositor: Option<Party>,
        arbiter: Option<Party>,
        condition: Option<Condition>,
        policy: &Policy,
        at: u64,
    ) -> Result<Self> {
        if let Some(depositor) = &depositor {
            if !policy.allow_self_escrow && *depositor == beneficiary {
                return Err(EscrowError::Unauthorized {
                    caller: depositor.clone(),
                    action: Action::Deposit,
                });
            }
        }
        // The beneficiary never releases to itself. A depositor named as
        // arbiter gains nothing it does not already hold.
        if arbiter.as_ref() == Some(&beneficiary) {
            return Err(EscrowError::Unauthorized {
                caller: beneficiary,
                action: Action::Release,
            });
        }

        Ok(Self {
            id,
            depositor,
            beneficiary,
            arbiter,
            condition,
            amount: 0,
            state: EscrowState::Empty,
            created_at: at,
            last_transition_at: at,
        })
    }

    pub fn snapshot(&self) -> EscrowSnapshot {
        EscrowSnapshot {
            id: self.id,
            depositor: self.depositor.clone(),
            beneficiary: self.beneficiary.clone(),
            arbiter: self.arbiter.clone(),
            amount: self.amount,
            state: self.state,
            created_at: self.created_at,
            last_transition_at: self.last_transition_at,
        }
    }

    /// `amount == 0` exactly when the state is not `Funded`.
    pub fn is_consistent(&self) -> bool {
        (self.amount > 0) == (self.state == EscrowState::Funded)
    }

    pub fn is_depositor(&self, party: &Party) -> bool {
        self.depositor.as_ref() == Some(party)
    }

    pub fn is_arbiter(&self, party: &Party) -> bool {
        self.arbiter.as_ref() == Some(party)
    }

    /// Role policy for `action`, independent of any external authorizer.
    pub fn permits(&self, caller: &Party, action: Action, policy: &Policy) -> bool {
        match action {
            Action::Deposit => match &self.depositor {
                Some(depositor) => depositor == caller,
                None => policy.allow_self_escrow || *caller != self.beneficiary,
            },
            Action::Release => self.is_depositor(caller) || self.is_arbiter(caller),
            Action::Refund => {
                self.is_depositor(caller)
                    || (policy.beneficiary_may_refund && *caller == self.beneficiary)
                    || (policy.arbiter_may_refund && self.is_arbiter(caller))
            }
        }
    }

    /// Checks that `action` is valid from the current state.
    pub fn expect_state(&self, action: Action) -> Result<()> {
        let expected = match action {
            Action::Deposit => EscrowState::Empty,
            Action::Release | Action::Refund => EscrowState::Funded,
        };
        if self.state == expected {
            Ok(())
        } else {
            Err(EscrowError::InvalidState {
                state: self.state,
                action,
            })
        }
    }

    /// State, amount and role checks shared by every transition,
    /// in the order callers observe them.
    pub fn precheck(
        &self,
        caller: &Party,
        action: Action,
        amount: Option<u64>,
        config: &EngineConfig,
    ) -> Result<()> {
        self.expect_state(action)?;
        if let Some(amount) = amount {
            if !config.accepts_amount(amount) {
                return Err(EscrowError::InvalidAmount(amount));
            }
        }
        if !self.permits(caller, action, &config.policy) {
            return Err(EscrowError::Unauthorized {
                caller: caller.clone(),
                action,
            });
        }
        Ok(())
    }

    /// `Empty -> Funded`: moves `amount` from `caller` into custody,
    /// binding `caller` as depositor if none is set.
    pub fn deposit(
        &self,
        caller: &Party,
        amount: u64,
        config: &EngineConfig,
        at: u64,
    ) -> Result<Transition> {
        self.precheck(caller, Action::Deposit, Some(amount), config)?;

        let mut next = self.clone();
        next.depositor = Some(caller.clone());
        next.amount = amount;
        next.state = EscrowState::Funded;
        next.last_transition_at = at;

        Ok(Transition {
            next,
            transaction: Transaction::transfer(caller.clone(), self.id.custody(), amount),
        })
    }

    /// `Funded -> Released`: moves held value from custody to the beneficiary.
    pub fn release(
        &self,
        caller: &Party,
        fulfillment: Option<&[u8]>,
        config: &EngineConfig,
        at: u64,
    ) -> Result<Transition> {
        self.precheck(caller, Action::Release, None, config)?;
        if let Some(condition) = &self.condition {
            condition.verify(fulfillment)?;
        }

        let transaction =
            Transaction::transfer(self.id.custody(), self.beneficiary.clone(), self.amount);
        Ok(Transition {
            next: self.settled(EscrowState::Released, at),
            transaction,
        })
    }

    /// `Funded -> Refunded`: moves held value from custody back to the depositor.
    pub fn refund(&self, caller: &Party, config: &EngineConfig, at: u64) -> Result<Transition> {
        self.precheck(caller, Action::Refund, None, config)?;

        // Funded always has a bound depositor.
        let depositor = self
            .depositor
            .clone()
            .ok_or(EscrowError::InvalidState {
                state: self.state,
                action: Action::Refund,
            })?;

        Ok(Transition {
            next: self.settled(EscrowState::Refunded, at),
            transaction: Transaction::transfer(self.id.custody(), depositor, self.amount),
        })
    }

    fn settled(&self, state: EscrowState, at: u64) -> Self {
        let mut next = self.clone();
        next.amount = 0;
        next.state = state;
        next.last_transition_at = at;
        next
    }
}
