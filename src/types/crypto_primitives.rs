/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.
//!
//! The definitions and re-exports in this module provide two categories of cryptographic primitives:
//! 1. **Cryptographic Hashes**: provided by the [`sha2`] crate.
//! 2. **Digital Signatures**: provided by the [`ed25519_dalek`] crate.
//!
//! The safety rules and the ledger accumulator never call these crates directly. Instead, they are
//! generic over the [`Hasher`] and [`HashSigner`] services, of which [`Sha256Hasher`] and [`Keypair`]
//! are the default implementations.

use super::data_types::{CryptoHash, SignatureBytes};

// re-exports below.
pub use sha2::Digest;
pub use sha2::Sha256 as CryptoHasher;

pub use ed25519_dalek::{Signature, SignatureError, Signer, SigningKey, Verifier, VerifyingKey};

/// Service that hashes arbitrary bytes into a [`CryptoHash`].
pub trait Hasher: Send + Sync {
    fn hash_bytes(&self, bytes: &[u8]) -> CryptoHash;
}

/// Service that signs a [`CryptoHash`] with the key of the local validator.
pub trait HashSigner: Send + Sync {
    fn sign(&self, hash: &CryptoHash) -> SignatureBytes;

    /// Get the `VerifyingKey` that verifies the signatures made by this signer.
    fn public(&self) -> VerifyingKey;
}

/// [`Hasher`] that produces SHA256 digests.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn hash_bytes(&self, bytes: &[u8]) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        hasher.update(bytes);
        CryptoHash::new(hasher.finalize().into())
    }
}

/// A facade around [`SigningKey`] that implements [`HashSigner`] as well as a getter for the
/// [`public`](HashSigner::public) key associated with the signing key.
#[derive(Clone)]
pub struct Keypair(SigningKey);

impl Keypair {
    /// Create a `Keypair` that wraps over `signing_key`.
    pub fn new(signing_key: SigningKey) -> Keypair {
        Keypair(signing_key)
    }

    /// Sign an arbitrary `message` with the `Keypair`.
    pub fn sign_message(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes::new(self.0.sign(message).to_bytes())
    }
}

impl HashSigner for Keypair {
    fn sign(&self, hash: &CryptoHash) -> SignatureBytes {
        self.sign_message(&hash.bytes())
    }

    fn public(&self) -> VerifyingKey {
        self.0.verifying_key()
    }
}

/// Check that `signature` is `signer`'s signature over `hash`.
pub fn verify_hash_signature(
    signer: &VerifyingKey,
    hash: &CryptoHash,
    signature: &SignatureBytes,
) -> bool {
    let signature = Signature::from_bytes(&signature.bytes());
    signer.verify(&hash.bytes(), &signature).is_ok()
}
