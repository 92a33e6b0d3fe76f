use std::collections::HashMap;

use primitive_types::U256;

/// Sparse, word-addressed scratch memory. Each `MSTORE`/`MLOAD` address
/// names one full 256-bit word — there is no byte-level packing, unlike
/// a real EVM's byte-addressed memory.
#[derive(Debug, Default)]
pub struct Memory {
    words: HashMap<U256, U256>,
}

impl Memory {
    pub fn new() -> Self {
        Self {
            words: HashMap::new(),
        }
    }

    pub fn load(&self, address: U256) -> U256 {
        self.words.get(&address).copied().unwrap_or(U256::zero())
    }

    pub fn store(&mut self, address: U256, value: U256) {
        self.words.insert(address, value);
    }
}
