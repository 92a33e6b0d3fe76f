use std::fmt;

use serde::{Deserialize, Serialize};

/// Value transferred between accounts, denominated in the chain's base unit.
/// Negative balances are never stored but are representable so that
/// `Ledger::balance` can surface a would-be-invalid sum to the caller
/// rather than panicking (see component C4).
pub type Amount = u64;

/// Milliseconds since the Unix epoch, UTC.
pub type Timestamp = i64;

/// Block height, genesis is `0`.
pub type Height = u64;

// ── PublicKeyHex ───────────────────────────────────────────────────────────────

/// An uncompressed secp256k1 public key, hex-encoded. This is the account
/// identity used throughout the ledger: there is no separate derived
/// address type, matching the source system's direct use of the public
/// key as the wallet's address.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKeyHex(pub String);

impl PublicKeyHex {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicKeyHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PublicKeyHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.0;
        if s.len() > 16 {
            write!(f, "PublicKeyHex({}…)", &s[..16])
        } else {
            write!(f, "PublicKeyHex({s})")
        }
    }
}

impl From<String> for PublicKeyHex {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PublicKeyHex {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── SignatureDer ───────────────────────────────────────────────────────────────

/// A DER-encoded ECDSA signature, hex-encoded for wire/storage use.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureHex(pub String);

impl SignatureHex {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SignatureHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureHex({}b)", self.0.len() / 2)
    }
}

impl From<String> for SignatureHex {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── ContractAddress ──────────────────────────────────────────────────────────

/// Derived contract identifier: `"contract_" || first_40_hex(sha256(...))`.
/// See component C8 for the derivation rule.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractAddress(pub String);

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractAddress({})", self.0)
    }
}
