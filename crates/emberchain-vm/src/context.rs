use std::collections::HashMap;

use primitive_types::U256;

use emberchain_core::types::PublicKeyHex;

/// Everything the interpreter needs about the call that is not in the
/// bytecode itself.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub caller: PublicKeyHex,
    pub call_value: u64,
    pub calldata: Vec<u8>,
    pub gas_limit: u64,
    /// The contract's storage as of the start of this call.
    pub storage: HashMap<U256, U256>,
}

impl ExecutionContext {
    pub fn new(caller: PublicKeyHex, call_value: u64, calldata: Vec<u8>, gas_limit: u64) -> Self {
        Self {
            caller,
            call_value,
            calldata,
            gas_limit,
            storage: HashMap::new(),
        }
    }

    pub fn with_storage(mut self, storage: HashMap<U256, U256>) -> Self {
        self.storage = storage;
        self
    }
}
