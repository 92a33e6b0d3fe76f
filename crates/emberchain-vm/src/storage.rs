use std::collections::HashMap;

use primitive_types::U256;

/// Persistent per-contract key→value storage. A fresh `Storage` is
/// loaded from the contract's last-committed state before `execute`
/// runs, and the caller only commits the post-execution map back if
/// `success` is true — see component C8.
#[derive(Debug, Default, Clone)]
pub struct Storage {
    slots: HashMap<U256, U256>,
}

impl Storage {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    pub fn from_slots(slots: HashMap<U256, U256>) -> Self {
        Self { slots }
    }

    pub fn load(&self, key: U256) -> U256 {
        self.slots.get(&key).copied().unwrap_or(U256::zero())
    }

    pub fn store(&mut self, key: U256, value: U256) {
        self.slots.insert(key, value);
    }

    pub fn into_slots(self) -> HashMap<U256, U256> {
        self.slots
    }
}
