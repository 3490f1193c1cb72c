//! Signing key store contract and two in-process implementations.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::SigningKey;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

use crate::errors::KeyStoreError;

/// Length of an Ed25519 seed.
pub const SEED_LEN: usize = 32;

/// An Ed25519 seed and its base64 public key.
#[derive(Clone)]
pub struct SigningKeyMaterial {
    seed: [u8; SEED_LEN],
    public_key_base64: String,
}

impl SigningKeyMaterial {
    /// Derives the public key for `seed`.
    pub fn from_seed(seed: [u8; SEED_LEN]) -> Self {
        let public = SigningKey::from_bytes(&seed).verifying_key();
        Self {
            seed,
            public_key_base64: BASE64.encode(public.as_bytes()),
        }
    }

    /// Raw 32-byte seed.
    pub fn seed(&self) -> &[u8; SEED_LEN] {
        &self.seed
    }

    /// Base64 of the raw 32-byte public key.
    pub fn public_key_base64(&self) -> &str {
        &self.public_key_base64
    }

    pub(crate) fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.seed)
    }
}

impl fmt::Debug for SigningKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyMaterial")
            .field("seed", &"<redacted>")
            .field("public_key_base64", &self.public_key_base64)
            .finish()
    }
}

/// Source of the log's signing key.
///
/// Once a key has been created, every later call must return the same key.
/// Backends (keychain, enclave, file, memory) are the host's choice.
pub trait SigningKeyStore: Send + Sync {
    /// Returns the signing key, creating it on first use.
    fn get_or_create_signing_key(&self) -> Result<SigningKeyMaterial, KeyStoreError>;

    /// Base64 public key of the current signing key.
    fn current_public_key_string(&self) -> Result<String, KeyStoreError> {
        Ok(self.get_or_create_signing_key()?.public_key_base64)
    }
}

/// Generates a random key on first use and keeps it for the store's lifetime.
#[derive(Debug, Default)]
pub struct EphemeralKeyStore {
    material: Mutex<Option<SigningKeyMaterial>>,
}

impl EphemeralKeyStore {
    /// Empty store; the key is generated lazily.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SigningKeyStore for EphemeralKeyStore {
    fn get_or_create_signing_key(&self) -> Result<SigningKeyMaterial, KeyStoreError> {
        let mut slot = self.material.lock();
        if let Some(material) = slot.as_ref() {
            return Ok(material.clone());
        }
        let mut seed = [0u8; SEED_LEN];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|err| KeyStoreError::Unavailable(err.to_string()))?;
        let material = SigningKeyMaterial::from_seed(seed);
        tracing::debug!(public_key = %material.public_key_base64, "generated ephemeral signing key");
        *slot = Some(material.clone());
        Ok(material)
    }
}

/// Always returns the key for a fixed seed.
#[derive(Debug, Clone)]
pub struct StaticKeyStore {
    material: SigningKeyMaterial,
}

impl StaticKeyStore {
    /// Store for `seed`.
    pub fn from_seed(seed: [u8; SEED_LEN]) -> Self {
        Self {
            material: SigningKeyMaterial::from_seed(seed),
        }
    }

    /// Store for a base64-encoded 32-byte seed.
    pub fn from_base64(seed: &str) -> Result<Self, KeyStoreError> {
        let bytes = BASE64
            .decode(seed.trim())
            .map_err(|err| KeyStoreError::InvalidMaterial(err.to_string()))?;
        let seed: [u8; SEED_LEN] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            KeyStoreError::InvalidMaterial(format!("seed is {} bytes, expected {SEED_LEN}", bytes.len()))
        })?;
        Ok(Self::from_seed(seed))
    }
}

impl SigningKeyStore for StaticKeyStore {
    fn get_or_create_signing_key(&self) -> Result<SigningKeyMaterial, KeyStoreError> {
        Ok(self.material.clone())
    }
}
