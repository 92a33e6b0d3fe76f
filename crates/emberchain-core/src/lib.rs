pub mod block;
pub mod constants;
pub mod error;
pub mod transaction;
pub mod types;

pub use block::Block;
pub use constants::*;
pub use error::EmberError;
pub use transaction::{Transaction, TransactionFingerprint};
pub use types::*;
