pub mod ecdsa;
pub mod hash;
pub mod keypair;
pub mod pow;

pub use ecdsa::{sign, verify, CryptoError};
pub use hash::sha256_hex;
pub use keypair::KeyPair;
pub use pow::meets_difficulty;
