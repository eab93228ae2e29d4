//! Value movement: the ledger capability consumed by the engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::LedgerError;
use crate::identity::Party;

/// Direction of a single ledger entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Debit,
    Credit,
}

/// One balance adjustment inside a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub party: Party,
    pub kind: EntryKind,
    pub amount: u64,
}

/// Ordered set of entries that a [`Ledger`] commits as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub entries: Vec<Entry>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debit(mut self, party: Party, amount: u64) -> Self {
        self.entries.push(Entry {
            party,
            kind: EntryKind::Debit,
            amount,
        });
        self
    }

    pub fn credit(mut self, party: Party, amount: u64) -> Self {
        self.entries.push(Entry {
            party,
            kind: EntryKind::Credit,
            amount,
        });
        self
    }

    /// Debit `from` and credit `to` with the same amount.
    pub fn transfer(from: Party, to: Party, amount: u64) -> Self {
        Self::new().debit(from, amount).credit(to, amount)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Balance store that moves value between parties.
///
/// Implementors must apply a [`Transaction`] all-or-nothing: when `apply`
/// returns an error no entry of the transaction may remain visible.
/// Calls may suspend (settlement, proof generation, consensus waits).
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Commits every entry of `tx`, or none of them.
    async fn apply(&self, tx: &Transaction) -> Result<(), LedgerError>;

    /// Current balance of `party`.
    async fn balance(&self, party: &Party) -> Result<u64, LedgerError>;

    async fn debit(&self, party: &Party, amount: u64) -> Result<(), LedgerError> {
        self.apply(&Transaction::new().debit(party.clone(), amount)).await
    }

    async fn credit(&self, party: &Party, amount: u64) -> Result<(), LedgerError> {
        self.apply(&Transaction::new().credit(party.clone(), amount)).await
    }
}

/// Process-local [`Ledger`] keeping balances in a map.
///
/// Overdrafts and overflows abort the whole transaction.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: Mutex<HashMap<Party, u64>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger seeded with opening balances.
    pub fn with_balances<I>(balances: I) -> Self
    where
        I: IntoIterator<Item = (Party, u64)>,
    {
        Self {
            balances: Mutex::new(balances.into_iter().collect()),
        }
    }

    /// Sum of all balances.
    pub async fn total(&self) -> u128 {
        self.balances
            .lock()
            .await
            .values()
            .map(|b| u128::from(*b))
            .sum()
    }
}

#[async_trait::async_trait]
impl Ledger for InMemoryLedger {
    async fn apply(&self, tx: &Transaction) -> Result<(), LedgerError> {
        let mut balances = self.balances.lock().await;

        // Stage every touched balance; the map is only written once all entries pass.
        let mut staged: HashMap<&Party, u64> = HashMap::new();
        for entry in &tx.entries {
            let current = match staged.get(&entry.party) {
                Some(b) => *b,
                None => balances.get(&entry.party).copied().unwrap_or(0),
            };
            let next = match entry.kind {
                EntryKind::Debit => {
                    current
                        .checked_sub(entry.amount)
                        .ok_or_else(|| LedgerError::InsufficientFunds {
                            party: entry.party.clone(),
                            needed: entry.amount,
                            available: current,
                        })?
                }
                EntryKind::Credit => {
                    current
                        .checked_add(entry.amount)
                        .ok_or_else(|| LedgerError::Overflow {
                            party: entry.party.clone(),
                        })?
                }
            };
            staged.insert(&entry.party, next);
        }

        for (party, balance) in staged {
            balances.insert(party.clone(), balance);
        }
        Ok(())
    }

    async fn balance(&self, party: &Party) -> Result<u64, LedgerError> {
        Ok(self.balances.lock().await.get(party).copied().unwrap_or(0))
    }
}
