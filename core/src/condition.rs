//! Release conditions and deterministic verification logic.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::ConditionError;

/// Condition that must be fulfilled before held value can be released.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "condition_type", content = "data", rename_all = "lowercase")]
pub enum Condition {
    /// Hashlock: SHA-256(preimage) == hash.
    Hashlock {
        #[serde(with = "hex::serde")]
        hash: [u8; 32],
    },
}

impl Condition {
    /// Builds a hashlock over `preimage`.
    pub fn hashlock_of(preimage: &[u8]) -> Self {
        Self::Hashlock {
            hash: Sha256::digest(preimage).into(),
        }
    }

    /// Verifies `fulfillment` against the condition using constant-time comparison.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError::MissingFulfillment`] when no fulfillment is supplied,
    /// and [`ConditionError::PreimageMismatch`] if the digest does not match.
    pub fn verify(&self, fulfillment: Option<&[u8]>) -> Result<(), ConditionError> {
        match self {
            Self::Hashlock { hash } => {
                let preimage = fulfillment.ok_or(ConditionError::MissingFulfillment)?;
                let computed = Sha256::digest(preimage);
                computed
                    .as_slice()
                    .ct_eq(hash)
                    .unwrap_u8()
                    .eq(&1)
                    .then_some(())
                    .ok_or(ConditionError::PreimageMismatch)
            }
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hashlock { hash } => write!(f, "Hashlock[{}]", hex::encode(hash)),
        }
    }
}
