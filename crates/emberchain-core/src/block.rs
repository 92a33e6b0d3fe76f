use serde::{Deserialize, Serialize};

use crate::constants::GENESIS_PREVIOUS_HASH;
use crate::transaction::Transaction;
use emberchain_crypto::{meets_difficulty, sha256_hex};

/// An ordered batch of transactions, linked to its predecessor and sealed
/// by proof-of-work. See component C3.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64,
    pub hash: String,
}

impl Block {
    /// Construct a block. `nonce` starts at `0` and `hash` is computed
    /// immediately — callers that want a mined block must call `mine`.
    pub fn new(
        index: u64,
        timestamp: i64,
        transactions: Vec<Transaction>,
        previous_hash: String,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// The genesis block: index 0, no transactions, `previous_hash = "0"`.
    pub fn genesis(timestamp: i64) -> Self {
        Self::new(0, timestamp, Vec::new(), GENESIS_PREVIOUS_HASH.to_string())
    }

    /// SHA-256 of `index || timestamp || canonical_tx_json(transactions) ||
    /// previous_hash || nonce`, all concatenated as strings.
    ///
    /// `canonical_tx_json` relies on `Transaction`'s field order (`sender`,
    /// `receiver`, `amount`, `timestamp`, `signature`) being preserved by
    /// serde's struct serialization, and on `serde_json::to_string` emitting
    /// no whitespace — together these make the encoding deterministic across
    /// nodes, which is required for the hash to be reproducible.
    pub fn compute_hash(&self) -> String {
        let canonical_tx_json =
            serde_json::to_string(&self.transactions).expect("transactions are always encodable");
        let payload = format!(
            "{}{}{}{}{}",
            self.index, self.timestamp, canonical_tx_json, self.previous_hash, self.nonce
        );
        sha256_hex(payload.as_bytes())
    }

    /// Increment `nonce` and recompute `hash` until it begins with
    /// `difficulty` zero characters.
    pub fn mine(&mut self, difficulty: usize) {
        while !meets_difficulty(&self.hash, difficulty) {
            self.nonce += 1;
            self.hash = self.compute_hash();
        }
    }

    /// True iff every transaction in this block is individually valid.
    pub fn has_valid_transactions(&self) -> bool {
        self.transactions.iter().all(Transaction::is_valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PublicKeyHex;

    #[test]
    fn genesis_has_no_transactions_and_zero_previous_hash() {
        let g = Block::genesis(0);
        assert_eq!(g.index, 0);
        assert!(g.transactions.is_empty());
        assert_eq!(g.previous_hash, "0");
        assert_eq!(g.hash, g.compute_hash());
    }

    #[test]
    fn mined_block_hash_meets_difficulty() {
        let reward = Transaction::new(None, PublicKeyHex::from("miner"), 50);
        let mut block = Block::new(1, 0, vec![reward], "0".repeat(64));
        block.mine(2);
        assert!(block.hash.starts_with("00"));
        assert_eq!(block.hash, block.compute_hash());
    }

    #[test]
    fn empty_non_genesis_block_has_valid_transactions_vacuously() {
        let block = Block::new(1, 0, vec![], "0".repeat(64));
        assert!(block.has_valid_transactions());
    }

    #[test]
    fn block_with_invalid_transaction_fails_validity_check() {
        let kp = emberchain_crypto::KeyPair::generate();
        let tx = Transaction::new(
            Some(kp.public_key_hex.clone().into()),
            PublicKeyHex::from("bob"),
            10,
        ); // unsigned
        let block = Block::new(1, 0, vec![tx], "0".repeat(64));
        assert!(!block.has_valid_transactions());
    }
}
