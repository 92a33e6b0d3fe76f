use zeroize::Zeroize;

use crate::ecdsa::generate_keypair;

/// A wallet keypair: secp256k1 private/public keys, hex-encoded.
///
/// The private key is held as a plain `String` but is zeroized on drop so
/// it does not linger in freed memory.
pub struct KeyPair {
    pub public_key_hex: String,
    pub private_key_hex: String,
}

impl KeyPair {
    /// Generate a fresh secp256k1 keypair.
    pub fn generate() -> Self {
        let (private_key_hex, public_key_hex) = generate_keypair();
        Self {
            public_key_hex,
            private_key_hex,
        }
    }

    /// Restore a keypair from raw hex (e.g. loaded from a wallet file).
    pub fn from_hex(private_key_hex: String, public_key_hex: String) -> Self {
        Self {
            public_key_hex,
            private_key_hex,
        }
    }

    pub fn sign(&self, digest_hex: &str) -> Result<String, crate::ecdsa::CryptoError> {
        crate::ecdsa::sign(&self.private_key_hex, digest_hex)
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.private_key_hex.zeroize();
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ public_key_hex: {} }}", self.public_key_hex)
    }
}
