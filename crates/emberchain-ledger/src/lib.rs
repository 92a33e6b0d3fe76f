pub mod ledger;

pub use ledger::{Ledger, TransactionStatus};
