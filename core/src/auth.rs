//! Caller authorization.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::escrow::EscrowId;
use crate::identity::Party;

/// Mutating actions a caller may request on an escrow.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Deposit,
    Release,
    Refund,
}

impl AsRef<str> for Action {
    fn as_ref(&self) -> &str {
        match self {
            Action::Deposit => "deposit",
            Action::Release => "release",
            Action::Refund => "refund",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Confirms that a caller's claimed identity is validated for an action.
///
/// Implementors perform the actual signature or permission check
/// (e.g. a verified transaction signature, a proof, a session token).
/// The engine trusts the answer and never verifies credentials itself.
#[async_trait::async_trait]
pub trait Authorizer: Send + Sync {
    /// Returns `true` if `caller` may perform `action` on `escrow`.
    async fn verify(&self, caller: &Party, action: Action, escrow: EscrowId) -> bool;
}

/// Authorizer backed by explicit grants.
///
/// A party may hold a blanket grant (every action on every escrow)
/// or per-action grants.
#[derive(Debug, Default, Clone)]
pub struct AccessList {
    blanket: HashSet<Party>,
    grants: HashMap<Party, HashSet<Action>>,
}

impl AccessList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants every action to `party`.
    pub fn grant_all(mut self, party: Party) -> Self {
        self.blanket.insert(party);
        self
    }

    pub fn grant(mut self, party: Party, action: Action) -> Self {
        self.grants.entry(party).or_default().insert(action);
        self
    }

    pub fn is_granted(&self, party: &Party, action: Action) -> bool {
        self.blanket.contains(party)
            || self
                .grants
                .get(party)
                .is_some_and(|actions| actions.contains(&action))
    }
}

#[async_trait::async_trait]
impl Authorizer for AccessList {
    async fn verify(&self, caller: &Party, action: Action, _escrow: EscrowId) -> bool {
        self.is_granted(caller, action)
    }
}

#[cfg(test)]
mod tests {
    use core::str::FromStr as _;

    use super::*;

    #[tokio::test]
    async fn access_list_grants() {
        let alice = Party::from_str("0xa11ce0").unwrap();
        let bob = Party::from_str("0xb0b0").unwrap();
        let carol = Party::from_str("0xca401e").unwrap();

        let acl = AccessList::new()
            .grant_all(alice.clone())
            .grant(bob.clone(), Action::Refund);
        let id = EscrowId(1);

        for action in [Action::Deposit, Action::Release, Action::Refund] {
            assert!(acl.verify(&alice, action, id).await);
            assert!(!acl.verify(&carol, action, id).await);
        }
        assert!(acl.verify(&bob, Action::Refund, id).await);
        assert!(!acl.verify(&bob, Action::Release, id).await);
    }
}
