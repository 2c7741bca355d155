//! Cryptographic primitives for powledger

use crate::error::ChainError;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// An address is the hex encoding of a compressed secp256k1 public key.
/// The reward sentinel is the only address that is not a public key.
pub type Address = String;

/// Hashes an ordered tuple of values.
///
/// The value is serialized to JSON and the SHA-256 digest of those bytes is
/// returned as lowercase hex. Tuples serialize as arrays in argument order, so
/// `crypto_hash(&(a, b))` and `crypto_hash(&(b, a))` differ. Maps must be
/// `BTreeMap`s to keep the encoding byte-stable.
pub fn crypto_hash<T: Serialize + ?Sized>(values: &T) -> Result<String, ChainError> {
    let bytes = serde_json::to_vec(values)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Number of leading zero bits of a hex digest read as a binary string.
/// Counting stops at the first non-hex character.
pub fn hex_leading_zero_bits(hash: &str) -> u32 {
    let mut bits = 0;
    for c in hash.chars() {
        match c.to_digit(16) {
            Some(0) => bits += 4,
            Some(nibble) => {
                bits += nibble.leading_zeros() - 28;
                break;
            }
            None => break,
        }
    }
    bits
}

/// The process-wide secp256k1 context.
///
/// Created once and shared behind an `Arc`; every signing and verification
/// call borrows it explicitly.
#[derive(Debug, Clone)]
pub struct SigningContext {
    secp: Secp256k1<All>,
}

impl Default for SigningContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningContext {
    pub fn new() -> Self {
        SigningContext {
            secp: Secp256k1::new(),
        }
    }

    /// Pure verification predicate: malformed input or a mismatch yields `false`.
    pub fn verify(&self, address: &str, message: &[u8], signature_hex: &str) -> bool {
        verify_signature(self, address, message, signature_hex).is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate(ctx: &SigningContext) -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(ctx, secret_key)
    }

    pub fn from_secret_key(ctx: &SigningContext, secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&ctx.secp, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(ctx: &SigningContext, bytes: &[u8]) -> Result<Self, ChainError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                ChainError::CryptoError(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                ChainError::CryptoError(format!("Invalid secret key bytes: {}", e))
            }
        })?;

        Ok(Self::from_secret_key(ctx, secret_key))
    }

    /// The public identity: hex of the compressed public key.
    pub fn address(&self) -> Address {
        hex::encode(self.public_key.serialize())
    }

    /// Signs the SHA-256 digest of `message` and returns the hex compact signature.
    pub fn sign(&self, ctx: &SigningContext, message: &[u8]) -> String {
        let digest: [u8; 32] = Sha256::digest(message).into();
        let message = Message::from_digest(digest);
        let signature = ctx.secp.sign_ecdsa(&message, &self.secret_key);
        hex::encode(signature.serialize_compact())
    }
}

/// Verifies a hex compact ECDSA signature over the SHA-256 digest of `message`
/// against a hex-encoded compressed public key.
pub fn verify_signature(
    ctx: &SigningContext,
    address: &str,
    message: &[u8],
    signature_hex: &str,
) -> Result<(), ChainError> {
    let public_key_bytes = hex::decode(address)
        .map_err(|e| ChainError::CryptoError(format!("Invalid hex address: {}", e)))?;
    if public_key_bytes.len() != PUBLIC_KEY_SIZE {
        return Err(ChainError::CryptoError(format!(
            "Public key must be exactly {} bytes (compressed), got {}",
            PUBLIC_KEY_SIZE,
            public_key_bytes.len()
        )));
    }

    let signature_bytes = hex::decode(signature_hex)
        .map_err(|e| ChainError::CryptoError(format!("Invalid hex signature: {}", e)))?;
    if signature_bytes.len() != COMPACT_SIGNATURE_SIZE {
        return Err(ChainError::CryptoError(format!(
            "Signature must be exactly {} bytes (compact), got {}",
            COMPACT_SIGNATURE_SIZE,
            signature_bytes.len()
        )));
    }

    let public_key = PublicKey::from_slice(&public_key_bytes)
        .map_err(|e| ChainError::CryptoError(format!("Invalid public key: {}", e)))?;
    let signature = Signature::from_compact(&signature_bytes)
        .map_err(|e| ChainError::CryptoError(format!("Invalid signature: {}", e)))?;

    let digest: [u8; 32] = Sha256::digest(message).into();
    let message = Message::from_digest(digest);

    ctx.secp
        .verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| ChainError::CryptoError("Signature verification failed".to_string()))
}
