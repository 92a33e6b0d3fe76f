use emberchain_core::block::Block;
use emberchain_core::error::EmberError;
use emberchain_core::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Embedded key-value store. Every object lives in a single sled tree
/// under an explicit string-prefixed key:
///
/// | Key pattern            | Value                                 |
/// |-------------------------|----------------------------------------|
/// | `block:{block_hash}`    | full block, JSON                      |
/// | `height:{index}`        | block hash, raw hex bytes (not JSON)  |
/// | `tx:{txid_16hex}`       | `{block_hash, block_index}`, JSON     |
/// | `pending:{txid_16hex}`  | transaction fields, JSON               |
/// | `meta:chainLength`      | integer, JSON                          |
/// | `meta:difficulty`       | integer, JSON (reserved, unused)       |
/// | `contract:{address}`    | serialized contract, JSON               |
///
/// There is no per-kind tree separation — prefix scans fall directly out
/// of sled's native lexicographic key ordering.
///
/// Cheap to clone: `sled::Db` is an `Arc` handle internally, so every
/// clone shares the same underlying database.
#[derive(Clone)]
pub struct Store {
    db: sled::Db,
}

pub const META_CHAIN_LENGTH: &str = "meta:chainLength";
pub const META_DIFFICULTY: &str = "meta:difficulty";
const PENDING_PREFIX: &str = "pending";

impl Store {
    /// Open (or create) the store at `path`. sled holds an exclusive lock
    /// on the directory; a second opener gets `EmberError::Locked`.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, EmberError> {
        let db = sled::open(path).map_err(|_| EmberError::Locked)?;
        Ok(Self { db })
    }

    /// Open a purely in-memory store. Used by tests and ephemeral nodes.
    pub fn open_temporary() -> Result<Self, EmberError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| EmberError::Corrupt(e.to_string()))?;
        Ok(Self { db })
    }

    // ── Blocks ───────────────────────────────────────────────────────────

    /// Persist `block` atomically: the `block:` entry, the `height:`
    /// entry, a `tx:` entry for every transaction it carries, and the
    /// updated `meta:chainLength` — all in one sled batch.
    pub fn save_block(&self, block: &Block, chain_length: u64) -> Result<(), EmberError> {
        let block_json =
            serde_json::to_vec(block).map_err(|e| EmberError::Corrupt(e.to_string()))?;

        let mut batch = sled::Batch::default();
        batch.insert(block_key(&block.hash).as_bytes(), block_json);
        batch.insert(height_key(block.index).as_bytes(), block.hash.as_bytes());

        for tx in &block.transactions {
            let entry = TxLocation {
                block_hash: block.hash.clone(),
                block_index: block.index,
            };
            let entry_json =
                serde_json::to_vec(&entry).map_err(|e| EmberError::Corrupt(e.to_string()))?;
            batch.insert(tx_key(&tx.txid_16hex()).as_bytes(), entry_json);
        }

        batch.insert(
            META_CHAIN_LENGTH.as_bytes(),
            serde_json::to_vec(&chain_length).unwrap(),
        );

        self.db
            .apply_batch(batch)
            .map_err(|e| EmberError::Corrupt(e.to_string()))?;
        Ok(())
    }

    /// Load the chain by walking `height:0 .. height:{chain_length-1}`.
    /// If a height or its referenced block is missing, returns the
    /// longest contiguous prefix found and logs a warning — callers
    /// decide whether that constitutes corruption.
    pub fn load_chain(&self) -> Result<Vec<Block>, EmberError> {
        let chain_length = self.get_meta_u64(META_CHAIN_LENGTH)?.unwrap_or(0);
        let mut blocks = Vec::with_capacity(chain_length as usize);

        for index in 0..chain_length {
            let Some(hash_bytes) = self
                .db
                .get(height_key(index).as_bytes())
                .map_err(|e| EmberError::Corrupt(e.to_string()))?
            else {
                tracing::warn!(index, "missing height entry — truncating loaded chain");
                break;
            };
            let hash = String::from_utf8_lossy(&hash_bytes).into_owned();

            let Some(block_bytes) = self
                .db
                .get(block_key(&hash).as_bytes())
                .map_err(|e| EmberError::Corrupt(e.to_string()))?
            else {
                tracing::warn!(index, hash, "missing block entry — truncating loaded chain");
                break;
            };
            let block: Block = serde_json::from_slice(&block_bytes)
                .map_err(|e| EmberError::Corrupt(e.to_string()))?;
            blocks.push(block);
        }

        Ok(blocks)
    }

    // ── Pending pool ─────────────────────────────────────────────────────

    pub fn put_pending(&self, tx: &Transaction) -> Result<(), EmberError> {
        let json = serde_json::to_vec(tx).map_err(|e| EmberError::Corrupt(e.to_string()))?;
        self.db
            .insert(pending_key(&tx.txid_16hex()).as_bytes(), json)
            .map_err(|e| EmberError::Corrupt(e.to_string()))?;
        Ok(())
    }

    pub fn load_pending(&self) -> Result<Vec<Transaction>, EmberError> {
        self.scan_prefix(PENDING_PREFIX)
            .into_iter()
            .map(|(_, value)| {
                serde_json::from_slice(&value).map_err(|e| EmberError::Corrupt(e.to_string()))
            })
            .collect()
    }

    /// Remove a single `pending:` entry, e.g. once its transaction has
    /// been mined into a block.
    pub fn remove_pending(&self, txid_16hex: &str) -> Result<(), EmberError> {
        self.db
            .remove(pending_key(txid_16hex).as_bytes())
            .map_err(|e| EmberError::Corrupt(e.to_string()))?;
        Ok(())
    }

    /// Batch-delete every `pending:` entry.
    pub fn clear_pending(&self) -> Result<(), EmberError> {
        let mut batch = sled::Batch::default();
        for (key, _) in self.scan_prefix(PENDING_PREFIX) {
            batch.remove(key);
        }
        self.db
            .apply_batch(batch)
            .map_err(|e| EmberError::Corrupt(e.to_string()))?;
        Ok(())
    }

    // ── Contracts ────────────────────────────────────────────────────────

    pub fn put_contract(&self, address: &str, json: &[u8]) -> Result<(), EmberError> {
        self.db
            .insert(contract_key(address).as_bytes(), json)
            .map_err(|e| EmberError::Corrupt(e.to_string()))?;
        Ok(())
    }

    pub fn get_contract(&self, address: &str) -> Result<Option<Vec<u8>>, EmberError> {
        Ok(self
            .db
            .get(contract_key(address).as_bytes())
            .map_err(|e| EmberError::Corrupt(e.to_string()))?
            .map(|v| v.to_vec()))
    }

    // ── Meta ─────────────────────────────────────────────────────────────

    pub fn get_meta_u64(&self, key: &str) -> Result<Option<u64>, EmberError> {
        let Some(raw) = self
            .db
            .get(key.as_bytes())
            .map_err(|e| EmberError::Corrupt(e.to_string()))?
        else {
            return Ok(None);
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| EmberError::Corrupt(e.to_string()))
    }

    pub fn flush(&self) -> Result<(), EmberError> {
        self.db
            .flush()
            .map_err(|e| EmberError::Corrupt(e.to_string()))?;
        Ok(())
    }

    // ── Range iteration ──────────────────────────────────────────────────

    /// Scan the inclusive range `[prefix:, prefix:\xFF]` over
    /// lexicographic keys.
    fn scan_prefix(&self, prefix: &str) -> Vec<(sled::IVec, sled::IVec)> {
        let start = format!("{prefix}:");
        let mut end = start.clone();
        end.push('\u{ff}');
        self.db
            .range(start.as_bytes().to_vec()..=end.as_bytes().to_vec())
            .filter_map(Result::ok)
            .collect()
    }
}

fn block_key(hash: &str) -> String {
    format!("block:{hash}")
}

fn height_key(index: u64) -> String {
    format!("height:{index}")
}

fn tx_key(txid_16hex: &str) -> String {
    format!("tx:{txid_16hex}")
}

fn pending_key(txid_16hex: &str) -> String {
    format!("pending:{txid_16hex}")
}

fn contract_key(address: &str) -> String {
    format!("contract:{address}")
}

#[derive(Serialize, Deserialize)]
struct TxLocation {
    block_hash: String,
    block_index: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberchain_core::types::PublicKeyHex;

    fn sample_block(index: u64, previous_hash: &str) -> Block {
        let reward = Transaction::new(None, PublicKeyHex::from("miner"), 50);
        Block::new(index, 0, vec![reward], previous_hash.to_string())
    }

    #[test]
    fn save_and_load_chain_round_trips() {
        let store = Store::open_temporary().unwrap();
        let genesis = Block::new(0, 0, vec![], "0".to_string());
        store.save_block(&genesis, 1).unwrap();
        let b1 = sample_block(1, &genesis.hash);
        store.save_block(&b1, 2).unwrap();

        let loaded = store.load_chain().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].hash, genesis.hash);
        assert_eq!(loaded[1].hash, b1.hash);
        assert_eq!(loaded[1].hash, loaded[1].compute_hash());
    }

    #[test]
    fn pending_pool_persists_and_clears() {
        let store = Store::open_temporary().unwrap();
        let tx = Transaction::new(None, PublicKeyHex::from("miner"), 50);
        store.put_pending(&tx).unwrap();
        assert_eq!(store.load_pending().unwrap().len(), 1);
        store.clear_pending().unwrap();
        assert!(store.load_pending().unwrap().is_empty());
    }

    #[test]
    fn missing_height_entry_truncates_chain_load() {
        let store = Store::open_temporary().unwrap();
        let genesis = Block::new(0, 0, vec![], "0".to_string());
        store.save_block(&genesis, 3).unwrap(); // lies about chain length
        let loaded = store.load_chain().unwrap();
        assert_eq!(loaded.len(), 1); // heights 1, 2 are missing
    }

    #[test]
    fn contract_round_trips() {
        let store = Store::open_temporary().unwrap();
        store.put_contract("contract_abc", b"{\"foo\":1}").unwrap();
        let loaded = store.get_contract("contract_abc").unwrap().unwrap();
        assert_eq!(loaded, b"{\"foo\":1}");
        assert!(store.get_contract("contract_missing").unwrap().is_none());
    }
}
