use std::collections::HashMap;

use tracing::{debug, warn};

use emberchain_core::error::EmberError;
use emberchain_core::types::{ContractAddress, PublicKeyHex};
use emberchain_store::Store;
use emberchain_vm::{ExecutionContext, ExecutionResult, Vm};

use crate::compiler;
use crate::contract::Contract;

/// Either raw bytecode or assembly-like source to be compiled first.
/// See §6.3 for the source dialect.
pub enum Code {
    Bytecode(Vec<u8>),
    Source(String),
}

/// Outcome of `deploy` or `call`: the VM's raw result plus whatever
/// address it concerns.
pub struct ContractOutcome {
    pub address: ContractAddress,
    pub result: ExecutionResult,
}

/// Deploys and invokes contracts, keeping an in-memory cache of
/// recently touched contracts in front of the `Store`. Address
/// derivation keeps a per-deployer nonce so that repeated deploys by
/// the same key land at distinct addresses.
pub struct ContractManager {
    store: Store,
    contracts: HashMap<String, Contract>,
    nonces: HashMap<String, u64>,
}

impl ContractManager {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            contracts: HashMap::new(),
            nonces: HashMap::new(),
        }
    }

    fn next_nonce(&mut self, deployer: &PublicKeyHex) -> u64 {
        let entry = self.nonces.entry(deployer.as_str().to_string()).or_insert(0);
        let nonce = *entry;
        *entry += 1;
        nonce
    }

    fn derive_address(deployer: &PublicKeyHex, nonce: u64, now_ms: i64) -> ContractAddress {
        let preimage = format!("{}{}{}", deployer.as_str(), nonce, now_ms);
        let hash = emberchain_crypto::sha256_hex(preimage.as_bytes());
        ContractAddress(format!("contract_{}", &hash[..40]))
    }

    /// Compile `code` if needed, run the constructor (empty calldata),
    /// and persist the result. Storage is only recorded if the
    /// constructor run succeeds.
    pub fn deploy(
        &mut self,
        deployer: PublicKeyHex,
        code: Code,
        gas_limit: u64,
        now_ms: i64,
    ) -> Result<ContractOutcome, EmberError> {
        let bytecode = match code {
            Code::Bytecode(b) => b,
            Code::Source(src) => compiler::compile(&src)?,
        };

        let nonce = self.next_nonce(&deployer);
        let address = Self::derive_address(&deployer, nonce, now_ms);

        let mut contract = Contract::new(address.clone(), deployer.clone(), bytecode.clone());

        let context = ExecutionContext::new(deployer, 0, Vec::new(), gas_limit);
        let result = Vm::execute(&bytecode, context);

        if result.success {
            contract.set_storage_from_words(result.storage.clone());
            self.persist(&contract)?;
            self.contracts.insert(address.0.clone(), contract);
            debug!(address = %address.0, gas_used = result.gas_used, "contract deployed");
        } else {
            warn!(address = %address.0, error = ?result.error, "contract constructor failed");
        }

        Ok(ContractOutcome { address, result })
    }

    /// Look the contract up (in-memory cache first, then the store),
    /// execute the call, and persist the new storage only on success.
    pub fn call(
        &mut self,
        address: &ContractAddress,
        caller: PublicKeyHex,
        call_value: u64,
        calldata: Vec<u8>,
        gas_limit: u64,
    ) -> Result<ExecutionResult, EmberError> {
        let mut contract = self.load(address)?;

        let storage = contract.storage_as_words()?;
        let context = ExecutionContext::new(caller, call_value, calldata, gas_limit).with_storage(storage);
        let result = Vm::execute(&contract.bytecode, context);

        if result.success {
            contract.set_storage_from_words(result.storage.clone());
            self.persist(&contract)?;
            self.contracts.insert(address.0.clone(), contract);
            debug!(address = %address.0, gas_used = result.gas_used, "contract call succeeded");
        } else {
            warn!(address = %address.0, error = ?result.error, "contract call reverted, storage discarded");
        }

        Ok(result)
    }

    pub fn get_contract(&mut self, address: &ContractAddress) -> Result<Contract, EmberError> {
        self.load(address)
    }

    fn load(&mut self, address: &ContractAddress) -> Result<Contract, EmberError> {
        if let Some(contract) = self.contracts.get(&address.0) {
            return Ok(contract.clone());
        }
        let raw = self
            .store
            .get_contract(&address.0)?
            .ok_or_else(|| EmberError::NotFound(address.0.clone()))?;
        let contract: Contract =
            serde_json::from_slice(&raw).map_err(|e| EmberError::Corrupt(e.to_string()))?;
        self.contracts.insert(address.0.clone(), contract.clone());
        Ok(contract)
    }

    fn persist(&self, contract: &Contract) -> Result<(), EmberError> {
        let json = serde_json::to_vec(contract).map_err(|e| EmberError::Corrupt(e.to_string()))?;
        self.store.put_contract(&contract.address.0, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ContractManager {
        ContractManager::new(Store::open_temporary().unwrap())
    }

    #[test]
    fn deploy_persists_constructor_storage() {
        let mut mgr = manager();
        let deployer = PublicKeyHex::from("alice");
        // STORE 1 value 42, then STOP: PUSH1 42; PUSH1 1; SSTORE; STOP
        let code = compiler::compile("PUSH 42\nSTORE 1\nSTOP").unwrap();
        let outcome = mgr
            .deploy(deployer, Code::Bytecode(code), 100_000, 1_000)
            .unwrap();
        assert!(outcome.result.success);

        let contract = mgr.get_contract(&outcome.address).unwrap();
        assert_eq!(contract.storage.get("1"), Some(&"42".to_string()));
    }

    #[test]
    fn repeated_deploys_by_same_deployer_get_distinct_addresses() {
        let mut mgr = manager();
        let deployer = PublicKeyHex::from("alice");
        let code = compiler::compile("STOP").unwrap();
        let a = mgr
            .deploy(deployer.clone(), Code::Bytecode(code.clone()), 10_000, 1_000)
            .unwrap();
        let b = mgr
            .deploy(deployer, Code::Bytecode(code), 10_000, 1_000)
            .unwrap();
        assert_ne!(a.address.0, b.address.0);
    }

    #[test]
    fn call_persists_storage_only_on_success() {
        let mut mgr = manager();
        let deployer = PublicKeyHex::from("alice");
        let code = compiler::compile("STOP").unwrap();
        let outcome = mgr
            .deploy(deployer.clone(), Code::Bytecode(code), 10_000, 1_000)
            .unwrap();

        // a call that writes storage then reverts must not persist
        let reverting = compiler::compile("PUSH 7\nSTORE 9\nPUSH 0\nPUSH 0\nREVERT").unwrap();
        mgr.contracts.get_mut(&outcome.address.0).unwrap().bytecode = reverting;
        let result = mgr
            .call(&outcome.address, deployer, 0, Vec::new(), 10_000)
            .unwrap();
        assert!(!result.success);

        let contract = mgr.get_contract(&outcome.address).unwrap();
        assert!(contract.storage.get("9").is_none());
    }

    #[test]
    fn call_on_unknown_address_fails() {
        let mut mgr = manager();
        let missing = ContractAddress("contract_nope".to_string());
        let err = mgr
            .call(&missing, PublicKeyHex::from("alice"), 0, Vec::new(), 1_000)
            .unwrap_err();
        assert!(matches!(err, EmberError::NotFound(_)));
    }
}
