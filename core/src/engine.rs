//! Escrow engine: the registry of escrow accounts and the only place
//! where transitions are committed.
//!
//! Every mutating call locks its account for the whole
//! check → authorize → ledger → commit sequence, so callers of one escrow
//! are linearized while distinct escrows proceed independently. The account
//! is overwritten only after the ledger has committed the matching
//! transaction; a ledger error leaves it exactly as it was.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::auth::{Action, Authorizer};
use crate::condition::Condition;
use crate::config::EngineConfig;
use crate::escrow::{EscrowAccount, EscrowId, EscrowSnapshot, Transition};
use crate::event::{EscrowEvent, EventKind};
use crate::identity::Party;
use crate::ledger::Ledger;
use crate::{EscrowError, Result};

/// Parameters required to open an escrow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EscrowParams {
    /// Who will receive the funds on release.
    pub beneficiary: Party,
    /// Who funds the escrow. Left unset, the first depositor is bound.
    #[serde(default)]
    pub depositor: Option<Party>,
    /// Optional third party allowed to release.
    #[serde(default)]
    pub arbiter: Option<Party>,
    /// Optional condition gating release.
    #[serde(default)]
    pub condition: Option<Condition>,
}

impl EscrowParams {
    pub fn new(beneficiary: Party) -> Self {
        Self {
            beneficiary,
            depositor: None,
            arbiter: None,
            condition: None,
        }
    }

    pub fn depositor(mut self, depositor: Party) -> Self {
        self.depositor = Some(depositor);
        self
    }

    pub fn arbiter(mut self, arbiter: Party) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// Deposit/release/refund state machine over injected
/// [`Ledger`] and [`Authorizer`] backends.
pub struct EscrowEngine {
    config: EngineConfig,
    ledger: Arc<dyn Ledger>,
    authorizer: Arc<dyn Authorizer>,
    accounts: RwLock<HashMap<EscrowId, Arc<Mutex<EscrowAccount>>>>,
    /// Held only for a push or a scan, never across an await.
    journal: std::sync::Mutex<Vec<EscrowEvent>>,
    next_id: AtomicU64,
    /// Logical clock for `created_at` / `last_transition_at`.
    clock: AtomicU64,
}

impl EscrowEngine {
    pub fn new(
        config: EngineConfig,
        ledger: Arc<dyn Ledger>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            config,
            ledger,
            authorizer,
            accounts: RwLock::new(HashMap::new()),
            journal: std::sync::Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            clock: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates an escrow in `Empty` with nothing held.
    pub async fn open(&self, params: EscrowParams) -> Result<EscrowSnapshot> {
        let id = EscrowId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let at = self.tick();
        let account = EscrowAccount::open(
            id,
            params.beneficiary,
            params.depositor,
            params.arbiter,
            params.condition,
            &self.config.policy,
            at,
        )
        .inspect_err(|e| warn!("Rejected opening {}: {}", id, e))?;
        let snapshot = account.snapshot();

        // Journal first: the account is unreachable until inserted.
        self.record(EscrowEvent {
            escrow_id: id,
            kind: EventKind::Opened,
            actor: None,
            amount: 0,
            state: snapshot.state,
            at,
        });
        self.accounts
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(account)));

        info!("Opened {} for beneficiary {}", id, snapshot.beneficiary);
        Ok(snapshot)
    }

    /// `Empty -> Funded`, moving `amount` from `caller` into custody.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidState` unless `Empty`, `InvalidAmount` for zero or
    /// above `max_deposit`, `Unauthorized`, or `LedgerFailure`.
    pub async fn deposit(
        &self,
        id: EscrowId,
        caller: &Party,
        amount: u64,
    ) -> Result<EscrowSnapshot> {
        self.execute(id, caller, Action::Deposit, Some(amount), |account, at| {
            account.deposit(caller, amount, &self.config, at)
        })
        .await
    }

    /// Deposits the configured `default_deposit`.
    pub async fn deposit_default(&self, id: EscrowId, caller: &Party) -> Result<EscrowSnapshot> {
        self.deposit(id, caller, self.config.default_deposit).await
    }

    /// `Funded -> Released` for an escrow without a release condition.
    pub async fn release(&self, id: EscrowId, caller: &Party) -> Result<EscrowSnapshot> {
        self.release_with(id, caller, None).await
    }

    /// `Funded -> Released`, paying the held amount to the beneficiary.
    ///
    /// `fulfillment` is checked against the escrow's condition, if any.
    pub async fn release_with(
        &self,
        id: EscrowId,
        caller: &Party,
        fulfillment: Option<&[u8]>,
    ) -> Result<EscrowSnapshot> {
        self.execute(id, caller, Action::Release, None, |account, at| {
            account.release(caller, fulfillment, &self.config, at)
        })
        .await
    }

    /// `Funded -> Refunded`, returning the held amount to the depositor.
    pub async fn refund(&self, id: EscrowId, caller: &Party) -> Result<EscrowSnapshot> {
        self.execute(id, caller, Action::Refund, None, |account, at| {
            account.refund(caller, &self.config, at)
        })
        .await
    }

    /// Read-only view of an escrow. Waits for an in-flight transition on
    /// the same escrow, so it never observes uncommitted state.
    pub async fn get_state(&self, id: EscrowId) -> Result<EscrowSnapshot> {
        let slot = self.slot(id).await?;
        let account = slot.lock().await;
        Ok(account.snapshot())
    }

    /// Committed transitions of `id`, oldest first.
    pub async fn events(&self, id: EscrowId) -> Result<Vec<EscrowEvent>> {
        // Existence check only.
        self.slot(id).await?;
        Ok(self
            .journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.escrow_id == id)
            .cloned()
            .collect())
    }

    async fn execute<F>(
        &self,
        id: EscrowId,
        caller: &Party,
        action: Action,
        amount: Option<u64>,
        transition: F,
    ) -> Result<EscrowSnapshot>
    where
        F: FnOnce(&EscrowAccount, u64) -> Result<Transition> + Send,
    {
        let slot = self.slot(id).await?;
        let mut account = slot.lock().await;

        // Every check runs before the ledger is touched.
        if let Err(e) = self.authorize(&*account, caller, action, amount).await {
            warn!("Rejected {} on {} by {}: {}", action, id, caller, e);
            return Err(e);
        }
        let at = self.tick();
        let Transition { next, transaction } = transition(&*account, at)
            .inspect_err(|e| warn!("Rejected {} on {} by {}: {}", action, id, caller, e))?;

        if let Err(e) = self.ledger.apply(&transaction).await {
            error!("Ledger failed {} on {}: {}", action, id, e);
            return Err(e.into());
        }

        let moved = match action {
            Action::Deposit => next.amount,
            Action::Release | Action::Refund => account.amount,
        };
        let event = EscrowEvent {
            escrow_id: id,
            kind: match action {
                Action::Deposit => EventKind::Deposited,
                Action::Release => EventKind::Released,
                Action::Refund => EventKind::Refunded,
            },
            actor: Some(caller.clone()),
            amount: moved,
            state: next.state,
            at,
        };

        // No await from here on: the commit and its journal entry land together.
        *account = next;
        self.record(event);
        debug_assert!(account.is_consistent());
        let snapshot = account.snapshot();

        info!(
            "{} {} by {}: {} units, now {}",
            id, action, caller, moved, snapshot.state
        );
        Ok(snapshot)
    }

    /// State, amount and role checks, then the external authorizer.
    async fn authorize(
        &self,
        account: &EscrowAccount,
        caller: &Party,
        action: Action,
        amount: Option<u64>,
    ) -> Result<()> {
        account.precheck(caller, action, amount, &self.config)?;
        if !self.authorizer.verify(caller, action, account.id).await {
            return Err(EscrowError::Unauthorized {
                caller: caller.clone(),
                action,
            });
        }
        Ok(())
    }

    async fn slot(&self, id: EscrowId) -> Result<Arc<Mutex<EscrowAccount>>> {
        self.accounts
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(EscrowError::NotFound(id))
    }

    fn record(&self, event: EscrowEvent) {
        debug!("Journal: {:?} {}", event.kind, event.escrow_id);
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[cfg(test)]
mod tests {
    use core::str::FromStr as _;

    use super::*;
    use crate::auth::AccessList;
    use crate::escrow::EscrowState;
    use crate::ledger::InMemoryLedger;

    fn party(s: &str) -> Party {
        Party::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn open_assigns_ids_and_journals() {
        let bob = party("0xb0b0");
        let engine = EscrowEngine::new(
            EngineConfig::default(),
            Arc::new(InMemoryLedger::new()),
            Arc::new(AccessList::new()),
        );

        let first = engine.open(EscrowParams::new(bob.clone())).await.unwrap();
        let second = engine.open(EscrowParams::new(bob)).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(first.state, EscrowState::Empty);
        assert_eq!(first.amount, 0);
        assert!(second.created_at > first.created_at);

        let events = engine.events(first.id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Opened);

        assert_eq!(
            engine.get_state(EscrowId(99)).await.unwrap_err(),
            EscrowError::NotFound(EscrowId(99))
        );
        assert!(engine.events(EscrowId(99)).await.is_err());
    }

    #[tokio::test]
    async fn deposit_default_uses_config() {
        let alice = party("0xa11ce0");
        let ledger = Arc::new(InMemoryLedger::with_balances([(alice.clone(), 5_000_000)]));
        let engine = EscrowEngine::new(
            EngineConfig::default(),
            ledger.clone(),
            Arc::new(AccessList::new().grant_all(alice.clone())),
        );
        let escrow = engine
            .open(EscrowParams::new(party("0xb0b0")).depositor(alice.clone()))
            .await
            .unwrap();

        let funded = engine.deposit_default(escrow.id, &alice).await.unwrap();
        assert_eq!(funded.amount, 1_000_000);
        assert_eq!(ledger.balance(&alice).await.unwrap(), 4_000_000);
        assert_eq!(ledger.balance(&escrow.id.custody()).await.unwrap(), 1_000_000);
    }

    #[test]
    fn params_from_json() {
        let params: EscrowParams = serde_json::from_str(
            r#"{
                "beneficiary": "0xb0b0",
                "depositor": "0xa11ce0",
                "condition": {
                    "condition_type": "hashlock",
                    "data": { "hash": "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b" }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(params.depositor, Some(party("0xa11ce0")));
        assert_eq!(params.arbiter, None);
        assert_eq!(params.condition, Some(Condition::hashlock_of(b"secret")));
    }
}
