use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("malformed hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid digest length: expected 32 bytes, got {0}")]
    DigestLength(usize),

    #[error("invalid secp256k1 key or signature encoding")]
    Secp256k1(#[from] secp256k1::Error),
}

/// Generate a fresh secp256k1 keypair. Returns `(private_key_hex, public_key_hex)`
/// where the public key is the 65-byte uncompressed point encoding.
pub fn generate_keypair() -> (String, String) {
    let secp = Secp256k1::new();
    let mut rng = rand::thread_rng();
    let (secret_key, public_key) = secp.generate_keypair(&mut rng);
    (
        hex::encode(secret_key.secret_bytes()),
        hex::encode(public_key.serialize_uncompressed()),
    )
}

/// Sign a hex-encoded 32-byte digest, returning the DER-encoded signature
/// as hex.
pub fn sign(private_key_hex: &str, digest_hex: &str) -> Result<String, CryptoError> {
    let secp = Secp256k1::new();
    let sk_bytes = hex::decode(private_key_hex)?;
    let secret_key = SecretKey::from_slice(&sk_bytes)?;
    let message = message_from_digest_hex(digest_hex)?;
    let sig = secp.sign_ecdsa(&message, &secret_key);
    Ok(hex::encode(sig.serialize_der()))
}

/// Verify a DER-encoded (hex) signature over a hex-encoded 32-byte digest.
/// Any malformed input (bad hex, wrong curve encoding, wrong length) is
/// treated as a failed verification, never an error — matching the
/// reference system's permissive `verify`.
pub fn verify(public_key_hex: &str, digest_hex: &str, signature_hex: &str) -> bool {
    let Ok(result) = try_verify(public_key_hex, digest_hex, signature_hex) else {
        return false;
    };
    result
}

fn try_verify(
    public_key_hex: &str,
    digest_hex: &str,
    signature_hex: &str,
) -> Result<bool, CryptoError> {
    let secp = Secp256k1::new();
    let pk_bytes = hex::decode(public_key_hex)?;
    let public_key = PublicKey::from_slice(&pk_bytes)?;
    let sig_bytes = hex::decode(signature_hex)?;
    let signature = Signature::from_der(&sig_bytes)?;
    let message = message_from_digest_hex(digest_hex)?;
    Ok(secp.verify_ecdsa(&message, &signature, &public_key).is_ok())
}

fn message_from_digest_hex(digest_hex: &str) -> Result<Message, CryptoError> {
    let bytes = hex::decode(digest_hex)?;
    if bytes.len() != 32 {
        return Err(CryptoError::DigestLength(bytes.len()));
    }
    Message::from_digest_slice(&bytes).map_err(CryptoError::Secp256k1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256_hex;

    #[test]
    fn sign_then_verify_round_trip() {
        let (sk, pk) = generate_keypair();
        let digest = sha256_hex(b"hello world");
        let sig = sign(&sk, &digest).unwrap();
        assert!(verify(&pk, &digest, &sig));
    }

    #[test]
    fn tampered_digest_fails_verification() {
        let (sk, pk) = generate_keypair();
        let digest = sha256_hex(b"hello world");
        let sig = sign(&sk, &digest).unwrap();
        let other_digest = sha256_hex(b"goodbye world");
        assert!(!verify(&pk, &other_digest, &sig));
    }

    #[test]
    fn wrong_public_key_fails_verification() {
        let (sk, _pk) = generate_keypair();
        let (_sk2, pk2) = generate_keypair();
        let digest = sha256_hex(b"hello world");
        let sig = sign(&sk, &digest).unwrap();
        assert!(!verify(&pk2, &digest, &sig));
    }

    #[test]
    fn malformed_signature_hex_returns_false_not_panic() {
        let (_sk, pk) = generate_keypair();
        let digest = sha256_hex(b"hello world");
        assert!(!verify(&pk, &digest, "not-hex-at-all"));
    }
}
