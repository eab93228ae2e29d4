//! Identities of the parties participating in an escrow.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Raw identity bytes (public key, address, or key digest).
///
/// Parsed from `0x`-prefixed hex, base58, or base64 (tried in that order),
/// and always displayed as `0x`-prefixed lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ID(Vec<u8>);

impl ID {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::str::FromStr for ID {
    type Err = IdentityError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdentityError::EmptyIdentity);
        }

        if let Some(h) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            let bytes = hex::decode(h)?;
            if bytes.is_empty() {
                return Err(IdentityError::EmptyIdentity);
            }
            return Ok(Self(bytes));
        }

        if let Ok(bytes) = bs58::decode(s).into_vec() {
            return Ok(Self(bytes));
        }

        match BASE64.decode(s) {
            Ok(bytes) if !bytes.is_empty() => Ok(Self(bytes)),
            _ => Err(IdentityError::UnsupportedFormat),
        }
    }
}

impl TryFrom<String> for ID {
    type Error = IdentityError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ID> for String {
    fn from(value: ID) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for ID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// A participant in an escrow: depositor, beneficiary, arbiter,
/// or the escrow's own custody account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Party {
    pub identity: ID,
}

impl Party {
    pub fn new(identity: ID) -> Self {
        Self { identity }
    }
}

impl From<ID> for Party {
    fn from(identity: ID) -> Self {
        Self { identity }
    }
}

impl std::str::FromStr for Party {
    type Err = IdentityError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self {
            identity: s.parse()?,
        })
    }
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.identity.fmt(f)
    }
}
