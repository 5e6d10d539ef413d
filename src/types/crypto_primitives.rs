/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.

use super::basic::{PubKeyBytes, SignatureBytes};

// re-exports below.
pub use sha2::Sha256 as CryptoHasher;

pub use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

/// A wrapper around [`SigningKey`](ed25519_dalek::SigningKey) that implements a
/// [convenience method](Self::sign) for creating signatures as well as getters for the public
/// key.
#[derive(Clone)]
pub struct Keypair(SigningKey);

impl Keypair {
    pub fn new(signing_key: SigningKey) -> Keypair {
        Keypair(signing_key)
    }

    /// Convenience method for creating signatures over values or messages represented as byte
    /// slices.
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes::new(self.0.sign(message).to_bytes())
    }

    pub fn public(&self) -> VerifyingKey {
        self.0.verifying_key()
    }

    /// The public key in the byte form used throughout the crate for identity keys.
    pub fn public_bytes(&self) -> PubKeyBytes {
        self.0.verifying_key().to_bytes()
    }
}

/// Verify that `signature` is a signature created by the holder of `pub_key` over `message`.
///
/// Returns `false` both when the signature does not check out and when `pub_key` is not a valid
/// Ed25519 public key.
pub fn verify_signature(pub_key: &PubKeyBytes, message: &[u8], signature: &SignatureBytes) -> bool {
    match VerifyingKey::from_bytes(pub_key) {
        Ok(vk) => {
            let signature = Signature::from_bytes(&signature.bytes());
            vk.verify(message, &signature).is_ok()
        }
        Err(_) => false,
    }
}
