use serde::{Deserialize, Serialize};

use emberchain_crypto::{sha256_hex, verify};

use crate::error::EmberError;
use crate::types::{Amount, PublicKeyHex, SignatureHex, Timestamp};

/// `(sender, receiver, amount, timestamp)` — identifies a transaction for
/// dedup and status lookups without pulling in its signature.
pub type TransactionFingerprint = (Option<String>, String, Amount, Timestamp);

/// A value transfer between two public-key-identified accounts.
///
/// `sender` is absent exactly when this is a mining reward: a synthetic
/// transaction injecting new currency into circulation. See component C2.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub sender: Option<PublicKeyHex>,
    pub receiver: PublicKeyHex,
    pub amount: Amount,
    pub timestamp: Timestamp,
    pub signature: Option<SignatureHex>,
}

impl Transaction {
    /// Build a fresh, unsigned transaction stamped with the current time.
    pub fn new(sender: Option<PublicKeyHex>, receiver: PublicKeyHex, amount: Amount) -> Self {
        Self {
            sender,
            receiver,
            amount,
            timestamp: chrono::Utc::now().timestamp_millis(),
            signature: None,
        }
    }

    /// SHA-256 over `sender_str || receiver || amount || timestamp`, where
    /// `sender_str` is the empty string when `sender` is absent. This is the
    /// value signed over, and the input to the dedup fingerprint's hash.
    pub fn hash(&self) -> String {
        let sender_str = self.sender.as_ref().map(|s| s.as_str()).unwrap_or("");
        let payload = format!(
            "{}{}{}{}",
            sender_str,
            self.receiver.as_str(),
            self.amount,
            self.timestamp
        );
        sha256_hex(payload.as_bytes())
    }

    /// Sign this transaction with the sender's private key. Reward
    /// transactions (no sender) cannot be signed.
    pub fn sign(&mut self, private_key_hex: &str) -> Result<(), EmberError> {
        if self.sender.is_none() {
            return Err(EmberError::InvalidTransaction(
                "cannot sign a reward transaction".into(),
            ));
        }
        let digest = self.hash();
        let sig = emberchain_crypto::sign(private_key_hex, &digest)
            .map_err(|e| EmberError::InvalidTransaction(e.to_string()))?;
        self.signature = Some(SignatureHex(sig));
        Ok(())
    }

    /// True for reward transactions; otherwise true iff a non-empty
    /// signature is present, `amount > 0`, and the signature verifies
    /// under `sender` against `hash()`.
    pub fn is_valid(&self) -> bool {
        let Some(sender) = &self.sender else {
            return true;
        };
        if self.amount == 0 {
            return false;
        }
        let Some(sig) = &self.signature else {
            return false;
        };
        if sig.is_empty() {
            return false;
        }
        verify(sender.as_str(), &self.hash(), sig.as_str())
    }

    /// `(sender, receiver, amount, timestamp)` tuple used to dedup this
    /// transaction in the pending pool and as the basis of its store key.
    pub fn fingerprint(&self) -> TransactionFingerprint {
        (
            self.sender.as_ref().map(|s| s.0.clone()),
            self.receiver.0.clone(),
            self.amount,
            self.timestamp,
        )
    }

    /// First 16 hex characters of `sha256(sender || receiver || amount || timestamp)`.
    /// Used as the `tx:` / `pending:` store key suffix (§4.5).
    pub fn txid_16hex(&self) -> String {
        self.hash()[..16].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberchain_crypto::KeyPair;

    #[test]
    fn reward_transaction_is_always_valid() {
        let tx = Transaction::new(None, PublicKeyHex::from("miner"), 50);
        assert!(tx.is_valid());
    }

    #[test]
    fn unsigned_non_reward_transaction_is_invalid() {
        let kp = KeyPair::generate();
        let tx = Transaction::new(
            Some(kp.public_key_hex.clone().into()),
            PublicKeyHex::from("bob"),
            10,
        );
        assert!(!tx.is_valid());
    }

    #[test]
    fn signed_transaction_is_valid() {
        let kp = KeyPair::generate();
        let mut tx = Transaction::new(
            Some(kp.public_key_hex.clone().into()),
            PublicKeyHex::from("bob"),
            10,
        );
        tx.sign(&kp.private_key_hex).unwrap();
        assert!(tx.is_valid());
    }

    #[test]
    fn tampered_amount_invalidates_signature() {
        let kp = KeyPair::generate();
        let mut tx = Transaction::new(
            Some(kp.public_key_hex.clone().into()),
            PublicKeyHex::from("bob"),
            10,
        );
        tx.sign(&kp.private_key_hex).unwrap();
        tx.amount = 1_000;
        assert!(!tx.is_valid());
    }

    #[test]
    fn zero_amount_is_invalid_even_if_signed() {
        let kp = KeyPair::generate();
        let mut tx = Transaction::new(
            Some(kp.public_key_hex.clone().into()),
            PublicKeyHex::from("bob"),
            1,
        );
        tx.sign(&kp.private_key_hex).unwrap();
        tx.amount = 0;
        assert!(!tx.is_valid());
    }

    #[test]
    fn cannot_sign_reward_transaction() {
        let mut tx = Transaction::new(None, PublicKeyHex::from("miner"), 50);
        assert!(tx.sign("deadbeef").is_err());
    }
}
