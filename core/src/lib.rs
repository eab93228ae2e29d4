/// Caller authorization capability
pub mod auth;
/// Release conditions and deterministic verification logic
pub mod condition;
pub mod config;
/// Engine: registry, per-escrow serialization, transition commits
pub mod engine;
pub mod error;
/// Escrow accounts and pure state transitions
pub mod escrow;
pub mod event;
/// Identities of parties
pub mod identity;
/// Value-movement capability
pub mod ledger;

pub use auth::{AccessList, Action, Authorizer};
pub use condition::Condition;
pub use config::{EngineConfig, Policy};
pub use engine::{EscrowEngine, EscrowParams};
pub use error::{ConditionError, EscrowError, IdentityError, LedgerError};
pub use escrow::{EscrowAccount, EscrowId, EscrowSnapshot, EscrowState, Transition};
pub use event::{EscrowEvent, EventKind};
pub use identity::{Party, ID};
pub use ledger::{InMemoryLedger, Ledger, Transaction};

pub type Result<T> = std::result::Result<T, EscrowError>;
