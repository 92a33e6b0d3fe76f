pub mod compiler;
pub mod contract;
pub mod manager;

pub use contract::Contract;
pub use manager::{Code, ContractManager, ContractOutcome};
