use std::collections::HashMap;

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use emberchain_core::error::EmberError;
use emberchain_core::types::{ContractAddress, PublicKeyHex};

/// A deployed contract: its code and its persisted storage. Storage
/// keys and values are 256-bit words, which exceed the 53-bit range
/// JSON numbers can carry exactly — §6.1 requires they round-trip as
/// decimal strings instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contract {
    pub address: ContractAddress,
    pub deployer: PublicKeyHex,
    pub bytecode: Vec<u8>,
    pub storage: HashMap<String, String>,
}

impl Contract {
    pub fn new(address: ContractAddress, deployer: PublicKeyHex, bytecode: Vec<u8>) -> Self {
        Self {
            address,
            deployer,
            bytecode,
            storage: HashMap::new(),
        }
    }

    /// Decode the wire-format storage map into the `U256` map the VM
    /// operates on.
    pub fn storage_as_words(&self) -> Result<HashMap<U256, U256>, EmberError> {
        self.storage
            .iter()
            .map(|(k, v)| Ok((parse_decimal_word(k)?, parse_decimal_word(v)?)))
            .collect()
    }

    /// Replace the storage map from the VM's post-execution `U256` map.
    pub fn set_storage_from_words(&mut self, words: HashMap<U256, U256>) {
        self.storage = words
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
    }
}

fn parse_decimal_word(s: &str) -> Result<U256, EmberError> {
    U256::from_dec_str(s).map_err(|e| EmberError::Corrupt(format!("bad storage word {s}: {e}")))
}
