//! Randomness and digest primitives shared by the OCSP engine and the
//! certificate extractor.

use std::sync::{Mutex, PoisonError};

use base64::{engine::general_purpose, Engine as _};
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};

/// Length of the OCSP request nonce in bytes.
pub const NONCE_LEN: usize = 8;

/// Source of single-use OCSP nonces.
///
/// A single instance is meant to be created at startup and shared (behind an
/// `Arc`) by every engine that needs nonces.
pub trait NonceSource: Send + Sync {
    fn generate(&self) -> [u8; NONCE_LEN];
}

/// CSPRNG-backed nonce source, seeded once from the operating system.
pub struct SecureNonceSource {
    rng: Mutex<StdRng>,
}

impl SecureNonceSource {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_rng(OsRng).unwrap_or_else(|_| StdRng::from_entropy())),
        }
    }
}

impl Default for SecureNonceSource {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceSource for SecureNonceSource {
    fn generate(&self) -> [u8; NONCE_LEN] {
        let mut nonce = [0u8; NONCE_LEN];
        // The generator state stays valid even if another holder panicked.
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.fill_bytes(&mut nonce);
        nonce
    }
}

/// Calculate the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Standard (padded) base64 encoding used for keys and signatures in reports.
pub fn encode_base64(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(data)
}
