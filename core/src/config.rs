//! Engine configuration and JSON loading.

use serde::{Deserialize, Serialize};

/// Amount deposited by [`deposit_default`](crate::EscrowEngine::deposit_default).
pub const DEFAULT_DEPOSIT: u64 = 1_000_000;

/// Tunables of an [`EscrowEngine`](crate::EscrowEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Amount used when the caller does not name one.
    pub default_deposit: u64,
    /// Upper bound on a single deposit, if any.
    pub max_deposit: Option<u64>,
    /// Role policy for who may trigger which transition.
    pub policy: Policy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_deposit: DEFAULT_DEPOSIT,
            max_deposit: None,
            policy: Policy::default(),
        }
    }
}

/// Which parties, beyond the depositor, may drive transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Permit `depositor == beneficiary`.
    pub allow_self_escrow: bool,
    /// Let the beneficiary waive its claim and refund the depositor.
    pub beneficiary_may_refund: bool,
    /// Let a designated arbiter refund (it may always release).
    pub arbiter_may_refund: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            allow_self_escrow: true,
            beneficiary_may_refund: true,
            arbiter_may_refund: true,
        }
    }
}

impl EngineConfig {
    /// Whether `amount` is acceptable for a single deposit.
    pub fn accepts_amount(&self, amount: u64) -> bool {
        amount > 0 && self.max_deposit.map_or(true, |max| amount <= max)
    }
}

#[cfg(feature = "json")]
mod json {
    use std::path::Path;

    use anyhow::Context;

    use super::EngineConfig;

    impl EngineConfig {
        /// Parses a JSON document; missing fields take their defaults.
        pub fn from_json(s: &str) -> anyhow::Result<Self> {
            serde_json::from_str(s).context("parsing engine config")
        }
    }

    /// Reads a JSON-encoded [`EngineConfig`] from `path`.
    ///
    /// # Errors
    ///
    /// Returns an `anyhow::Error` if the file cannot be read or parsed.
    pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<EngineConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("loading engine config: {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("parsing JSON from {:?}", path))
    }
}

#[cfg(feature = "json")]
pub use json::load_config;
