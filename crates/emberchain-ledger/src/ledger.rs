use tracing::{debug, info, warn};

use emberchain_core::block::Block;
use emberchain_core::error::EmberError;
use emberchain_core::transaction::{Transaction, TransactionFingerprint};
use emberchain_core::types::PublicKeyHex;
use emberchain_crypto::meets_difficulty;
use emberchain_store::Store;

/// Where a transaction currently stands relative to this ledger, keyed
/// by its fingerprint. This is a read — it never mutates the pending
/// pool or the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Confirmed { block_index: u64 },
    Unknown,
}

/// The append-only transaction ledger: an in-memory chain and pending
/// pool, backed by an optional persistent `Store`. See component C4.
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    store: Option<Store>,
    difficulty: usize,
    mining_reward: u64,
}

impl Ledger {
    /// Build a ledger around `store` (use `None` for a purely in-memory
    /// ledger, e.g. in tests). Call `initialize` before use.
    pub fn new(store: Option<Store>) -> Self {
        Self {
            chain: Vec::new(),
            pending: Vec::new(),
            store,
            difficulty: emberchain_core::constants::DIFFICULTY,
            mining_reward: emberchain_core::constants::MINING_REWARD,
        }
    }

    /// If the store has a persisted chain, load it and the pending pool.
    /// Otherwise create and persist genesis. Idempotent: calling this
    /// twice on an already-initialized ledger is a no-op.
    pub fn initialize(&mut self) -> Result<(), EmberError> {
        if !self.chain.is_empty() {
            return Ok(());
        }

        if let Some(store) = &self.store {
            let loaded = store.load_chain()?;
            if loaded.is_empty() {
                let genesis = Block::genesis(chrono::Utc::now().timestamp_millis());
                store.save_block(&genesis, 1)?;
                self.chain = vec![genesis];
            } else {
                self.chain = loaded;
                self.pending = store.load_pending()?;
            }
        } else {
            let genesis = Block::genesis(chrono::Utc::now().timestamp_millis());
            self.chain = vec![genesis];
        }
        Ok(())
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn tip(&self) -> &Block {
        self.chain.last().expect("chain always has at least genesis")
    }

    /// Validate and queue a transaction.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), EmberError> {
        if tx.receiver.as_str().is_empty() {
            return Err(EmberError::MissingReceiver);
        }
        if !tx.is_valid() {
            return Err(EmberError::InvalidTransaction(
                "signature or amount invalid".into(),
            ));
        }
        if let Some(sender) = &tx.sender {
            let have = self.balance(sender.as_str());
            let need = tx.amount as i64;
            if have < need {
                return Err(EmberError::InsufficientBalance { need, have });
            }
        }

        if let Some(store) = &self.store {
            store.put_pending(&tx)?;
        }
        debug!(txid = %tx.txid_16hex(), "transaction queued");
        self.pending.push(tx);
        Ok(())
    }

    /// Mine a block containing the pending pool plus a reward transaction
    /// for `miner`, append it to the chain, and clear the pending pool.
    pub fn mine_pending(&mut self, miner: PublicKeyHex) -> Result<&Block, EmberError> {
        let reward = Transaction::new(None, miner, self.mining_reward);
        let mut transactions = self.pending.clone();
        transactions.push(reward);

        let tip = self.tip();
        let mut block = Block::new(
            tip.index + 1,
            chrono::Utc::now().timestamp_millis(),
            transactions,
            tip.hash.clone(),
        );
        block.mine(self.difficulty);

        self.chain.push(block);
        self.pending.clear();

        if let Some(store) = &self.store {
            store.save_block(self.chain.last().unwrap(), self.chain.len() as u64)?;
            store.clear_pending()?;
        }

        let mined = self.chain.last().unwrap();
        info!(index = mined.index, hash = %mined.hash, "mined block");
        Ok(mined)
    }

    /// Net balance of `address`: sum of every transaction across the
    /// entire chain where it is the receiver, minus every one where it
    /// is the sender.
    pub fn balance(&self, address: &str) -> i64 {
        let mut total: i64 = 0;
        for block in &self.chain {
            for tx in &block.transactions {
                if tx.receiver.as_str() == address {
                    total += tx.amount as i64;
                }
                if tx.sender.as_ref().map(|s| s.as_str()) == Some(address) {
                    total -= tx.amount as i64;
                }
            }
        }
        total
    }

    /// Every transaction across the chain touching `address`, tagged
    /// with the index of the block it appears in.
    pub fn get_transactions_for(&self, address: &str) -> Vec<(Transaction, u64)> {
        let mut out = Vec::new();
        for block in &self.chain {
            for tx in &block.transactions {
                let is_sender = tx.sender.as_ref().map(|s| s.as_str()) == Some(address);
                let is_receiver = tx.receiver.as_str() == address;
                if is_sender || is_receiver {
                    out.push((tx.clone(), block.index));
                }
            }
        }
        out
    }

    /// Where a transaction matching `fingerprint` currently stands: in
    /// the pending pool, confirmed in a block, or unknown to this
    /// ledger. A read; never mutates pending or the chain.
    pub fn get_transaction_status(&self, fingerprint: &TransactionFingerprint) -> TransactionStatus {
        if self.pending.iter().any(|tx| &tx.fingerprint() == fingerprint) {
            return TransactionStatus::Pending;
        }
        for block in &self.chain {
            for tx in &block.transactions {
                if &tx.fingerprint() == fingerprint {
                    return TransactionStatus::Confirmed {
                        block_index: block.index,
                    };
                }
            }
        }
        TransactionStatus::Unknown
    }

    /// For `i >= 1`: hash recomputes, links to its predecessor, and every
    /// transaction is individually valid. Genesis is not hash-re-checked
    /// (see the design notes on this historical choice).
    pub fn is_chain_valid(&self) -> bool {
        for i in 1..self.chain.len() {
            let block = &self.chain[i];
            let prev = &self.chain[i - 1];
            if block.hash != block.compute_hash() {
                return false;
            }
            if block.previous_hash != prev.hash {
                return false;
            }
            if !block.has_valid_transactions() {
                return false;
            }
        }
        true
    }

    /// Reception path for a single externally-mined block. Accepts iff
    /// it links to the current tip, its index follows, its hash
    /// recomputes, and the hash meets the difficulty target.
    pub fn add_block(&mut self, block: Block) -> Result<(), EmberError> {
        let tip = self.tip();
        if block.previous_hash != tip.hash {
            return Err(EmberError::BlockLinkMismatch {
                expected: tip.hash.clone(),
                got: block.previous_hash.clone(),
            });
        }
        if block.index != tip.index + 1 {
            return Err(EmberError::BlockLinkMismatch {
                expected: (tip.index + 1).to_string(),
                got: block.index.to_string(),
            });
        }
        let recomputed = block.compute_hash();
        if block.hash != recomputed {
            return Err(EmberError::BlockHashMismatch {
                expected: recomputed,
                computed: block.hash.clone(),
            });
        }
        if !meets_difficulty(&block.hash, self.difficulty) {
            return Err(EmberError::BlockDifficultyUnmet {
                difficulty: self.difficulty,
            });
        }

        let mined_fingerprints: Vec<_> = block.transactions.iter().map(Transaction::fingerprint).collect();
        self.pending.retain(|tx| !mined_fingerprints.contains(&tx.fingerprint()));
        self.chain.push(block);

        if let Some(store) = &self.store {
            store.save_block(self.chain.last().unwrap(), self.chain.len() as u64)?;
            for tx in self.chain.last().unwrap().transactions.clone() {
                store.remove_pending(&tx.txid_16hex())?;
            }
        }
        let accepted = self.chain.last().unwrap();
        debug!(index = accepted.index, hash = %accepted.hash, "accepted block from peer");
        Ok(())
    }

    /// Add a transaction received from a peer: dedup by fingerprint,
    /// validate, append if new and valid.
    pub fn add_received_transaction(&mut self, tx: Transaction) -> Result<(), EmberError> {
        let fp = tx.fingerprint();
        if self.pending.iter().any(|existing| existing.fingerprint() == fp) {
            return Ok(());
        }
        if !tx.is_valid() {
            return Err(EmberError::InvalidTransaction(
                "signature or amount invalid".into(),
            ));
        }
        if let Some(store) = &self.store {
            store.put_pending(&tx)?;
        }
        self.pending.push(tx);
        Ok(())
    }

    /// Validate `candidate` as a whole: non-empty; for `i >= 1` hash,
    /// link, and proof-of-work checks. Does not re-verify transaction
    /// signatures — see the design notes.
    pub fn validate_chain(candidate: &[Block], difficulty: usize) -> bool {
        if candidate.is_empty() {
            return false;
        }
        for i in 1..candidate.len() {
            let block = &candidate[i];
            let prev = &candidate[i - 1];
            if block.hash != block.compute_hash() {
                return false;
            }
            if block.previous_hash != prev.hash {
                return false;
            }
            if !meets_difficulty(&block.hash, difficulty) {
                return false;
            }
        }
        true
    }

    /// Replace the in-memory chain and persisted chain atomically if
    /// `candidate` validates as a whole.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<(), EmberError> {
        if candidate.len() <= self.chain.len() {
            warn!(
                candidate_len = candidate.len(),
                current_len = self.chain.len(),
                "rejected candidate chain, not longer than current"
            );
            return Err(EmberError::ChainInvalid);
        }
        if !Self::validate_chain(&candidate, self.difficulty) {
            warn!(candidate_len = candidate.len(), "rejected invalid candidate chain");
            return Err(EmberError::ChainInvalid);
        }
        self.chain = candidate;
        self.pending.clear();

        if let Some(store) = &self.store {
            for (i, block) in self.chain.iter().enumerate() {
                store.save_block(block, (i + 1) as u64)?;
            }
            store.clear_pending()?;
        }
        info!(height = self.chain.len(), "replaced chain from peer");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberchain_crypto::KeyPair;

    fn funded_ledger() -> (Ledger, KeyPair) {
        let mut ledger = Ledger::new(None);
        ledger.initialize().unwrap();
        let kp = KeyPair::generate();
        ledger
            .mine_pending(PublicKeyHex::from(kp.public_key_hex.clone()))
            .unwrap();
        (ledger, kp)
    }

    #[test]
    fn initialize_creates_genesis_when_empty() {
        let mut ledger = Ledger::new(None);
        ledger.initialize().unwrap();
        assert_eq!(ledger.chain().len(), 1);
        assert_eq!(ledger.tip().index, 0);
    }

    #[test]
    fn mine_pending_rewards_miner_and_clears_pool() {
        let (ledger, kp) = funded_ledger();
        assert_eq!(ledger.balance(&kp.public_key_hex), 50);
        assert!(ledger.pending().is_empty());
        assert_eq!(ledger.chain().len(), 2);
    }

    #[test]
    fn add_transaction_rejects_insufficient_balance() {
        let (mut ledger, kp) = funded_ledger();
        let mut tx = Transaction::new(
            Some(kp.public_key_hex.clone().into()),
            PublicKeyHex::from("bob"),
            1_000,
        );
        tx.sign(&kp.private_key_hex).unwrap();
        let err = ledger.add_transaction(tx).unwrap_err();
        assert!(matches!(err, EmberError::InsufficientBalance { .. }));
    }

    #[test]
    fn add_transaction_accepts_valid_and_affordable_transfer() {
        let (mut ledger, kp) = funded_ledger();
        let mut tx = Transaction::new(
            Some(kp.public_key_hex.clone().into()),
            PublicKeyHex::from("bob"),
            10,
        );
        tx.sign(&kp.private_key_hex).unwrap();
        ledger.add_transaction(tx).unwrap();
        assert_eq!(ledger.pending().len(), 1);
    }

    #[test]
    fn is_chain_valid_detects_tampered_block() {
        let (mut ledger, _kp) = funded_ledger();
        let bad_index = 1;
        ledger.chain[bad_index].transactions.clear();
        assert!(!ledger.is_chain_valid());
    }

    #[test]
    fn add_block_rejects_wrong_previous_hash() {
        let mut ledger = Ledger::new(None);
        ledger.initialize().unwrap();
        let block = Block::new(1, 0, vec![], "not-the-tip".to_string());
        let err = ledger.add_block(block).unwrap_err();
        assert!(matches!(err, EmberError::BlockLinkMismatch { .. }));
    }

    #[test]
    fn add_received_transaction_dedups_by_fingerprint() {
        let mut ledger = Ledger::new(None);
        ledger.initialize().unwrap();
        let tx = Transaction::new(None, PublicKeyHex::from("miner"), 50);
        ledger.add_received_transaction(tx.clone()).unwrap();
        ledger.add_received_transaction(tx).unwrap();
        assert_eq!(ledger.pending().len(), 1);
    }

    #[test]
    fn replace_chain_rejects_invalid_candidate() {
        let mut ledger = Ledger::new(None);
        ledger.initialize().unwrap();
        let bogus = vec![Block::genesis(0), Block::new(1, 0, vec![], "wrong".to_string())];
        let err = ledger.replace_chain(bogus).unwrap_err();
        assert!(matches!(err, EmberError::ChainInvalid));
    }

    #[test]
    fn get_transaction_status_tracks_pending_then_confirmed() {
        let mut ledger = Ledger::new(None);
        ledger.initialize().unwrap();
        let kp = KeyPair::generate();
        let mut tx = Transaction::new(
            Some(kp.public_key_hex.clone().into()),
            PublicKeyHex::from("bob"),
            10,
        );
        tx.sign(&kp.private_key_hex).unwrap();
        let fp = tx.fingerprint();

        assert_eq!(ledger.get_transaction_status(&fp), TransactionStatus::Unknown);

        // Fund the sender first so the transfer is admissible once mined.
        ledger
            .mine_pending(PublicKeyHex::from(kp.public_key_hex.clone()))
            .unwrap();
        ledger.add_transaction(tx.clone()).unwrap();
        assert_eq!(ledger.get_transaction_status(&fp), TransactionStatus::Pending);

        ledger
            .mine_pending(PublicKeyHex::from(kp.public_key_hex.clone()))
            .unwrap();
        assert_eq!(
            ledger.get_transaction_status(&fp),
            TransactionStatus::Confirmed { block_index: 2 }
        );
    }

    #[test]
    fn replace_chain_accepts_longer_valid_candidate() {
        let mut ledger = Ledger::new(None);
        ledger.initialize().unwrap();
        let mut candidate = ledger.chain.clone();
        let mut next = Block::new(1, 0, vec![], candidate[0].hash.clone());
        next.mine(ledger.difficulty);
        candidate.push(next);
        ledger.replace_chain(candidate).unwrap();
        assert_eq!(ledger.chain().len(), 2);
    }

    #[test]
    fn replace_chain_rejects_valid_candidate_not_longer_than_current() {
        let mut ledger = Ledger::new(None);
        ledger.initialize().unwrap();
        let mut next = Block::new(1, 0, vec![], ledger.chain[0].hash.clone());
        next.mine(ledger.difficulty);
        ledger.chain.push(next);

        // A perfectly valid but equal-length candidate must still be rejected.
        let same_len_candidate = ledger.chain.clone();
        let err = ledger.replace_chain(same_len_candidate).unwrap_err();
        assert!(matches!(err, EmberError::ChainInvalid));
        assert_eq!(ledger.chain().len(), 2);

        // A valid but shorter candidate must also be rejected.
        let shorter_candidate = vec![ledger.chain[0].clone()];
        let err = ledger.replace_chain(shorter_candidate).unwrap_err();
        assert!(matches!(err, EmberError::ChainInvalid));
        assert_eq!(ledger.chain().len(), 2);
    }
}
