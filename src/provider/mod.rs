//! Crypto provider capability interface.
//!
//! A provider owns key material. Callers only ever see [`KeyHandle`]s: the subject key
//! identifier and public half of a key. Signing goes back through the provider that
//! holds the key.

pub mod keystore;
pub mod software;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::error::Result;
use crate::key::{KeyAlgorithm, KeyId, PublicKey};

pub use software::{SoftwareProvider, SoftwareProviderFactory};

/// Providers are shared between callers, possibly across threads.
pub type SharedProvider = Arc<dyn CryptoProvider>;

/// Key generation, import and lookup, as offered by a keystore-backed provider.
///
/// Implementations must be safe for concurrent use; this crate adds no locking around
/// provider calls.
pub trait CryptoProvider: Send + Sync + fmt::Debug {
    /// Short name of the provider instance, used in logs.
    fn name(&self) -> &str;

    /// Generates a new key.
    fn key_gen(&self, opts: &KeyGenOpts) -> Result<KeyHandle>;

    /// Imports raw key material; the expected encoding depends on `opts`.
    fn key_import(&self, raw: &[u8], opts: &KeyImportOpts) -> Result<KeyHandle>;

    /// Looks up a private key by its subject key identifier.
    fn get_key(&self, ski: &KeyId) -> Result<KeyHandle>;

    /// Signs `message` with the private key behind `key`.
    fn sign(&self, key: &KeyHandle, message: &[u8]) -> Result<Vec<u8>>;
}

/// Reference to a key held by a provider.
///
/// Carries only public information; the secret stays in the provider's keystore.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyHandle {
    ski: KeyId,
    public_key: PublicKey,
    private: bool,
}

impl KeyHandle {
    /// Handle for the private key matching `public_key`.
    pub fn private(public_key: PublicKey) -> Result<Self> {
        Ok(Self {
            ski: public_key.ski()?,
            public_key,
            private: true,
        })
    }

    /// Handle for a bare public key.
    pub fn public(public_key: PublicKey) -> Result<Self> {
        Ok(Self {
            ski: public_key.ski()?,
            public_key,
            private: false,
        })
    }

    pub fn ski(&self) -> &KeyId {
        &self.ski
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.public_key.algorithm()
    }

    pub fn is_private(&self) -> bool {
        self.private
    }
}

/// Key families and sizes a provider can be asked to generate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyGenAlgorithm {
    /// ECDSA on the provider's baseline curve.
    Ecdsa,
    EcdsaP256,
    EcdsaP384,
    Rsa2048,
    Rsa3072,
    Rsa4096,
    /// National cipher suite; the curve is fixed.
    Sm2,
}

/// Key generation options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyGenOpts {
    pub algorithm: KeyGenAlgorithm,
    /// Temporary keys are never written to a persistent keystore.
    pub temporary: bool,
}

/// Key import options; each names the encoding of the raw input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyImportOpts {
    /// DER-encoded X.509 certificate; only its public key is imported.
    X509PublicKey { temporary: bool },
    /// PKCS#8 DER ECDSA private key.
    EcdsaPrivateKey { temporary: bool },
    /// PKCS#8 DER SM2 private key.
    Sm2PrivateKey { temporary: bool },
}

/// Algorithm suite a provider instance is configured for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum CipherFamily {
    /// RSA and NIST-curve ECDSA.
    #[serde(rename = "SW")]
    Standard,
    /// National cipher suite (SM2 keys, SM3 digests).
    #[serde(rename = "GM")]
    National,
}

impl fmt::Display for CipherFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherFamily::Standard => f.write_str("SW"),
            CipherFamily::National => f.write_str("GM"),
        }
    }
}

/// Options a provider instance is built from.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderOpts {
    pub family: CipherFamily,
    pub hash_family: String,
    pub security_level: u16,
    /// Directory of the persistent file keystore; in-memory only when absent.
    pub keystore: Option<PathBuf>,
}

impl Default for ProviderOpts {
    fn default() -> Self {
        Self {
            family: CipherFamily::Standard,
            hash_family: "SHA2".to_string(),
            security_level: 256,
            keystore: None,
        }
    }
}

impl ProviderOpts {
    /// Options of a national cipher suite provider keeping its keys in `keystore`.
    pub fn national(keystore: impl Into<PathBuf>) -> Self {
        Self {
            family: CipherFamily::National,
            hash_family: "GMSM3".to_string(),
            security_level: 256,
            keystore: Some(keystore.into()),
        }
    }

    /// Resolves a relative keystore path against `home`.
    pub fn make_paths_absolute(&mut self, home: &Path) {
        if let Some(keystore) = self.keystore.as_mut() {
            if keystore.is_relative() {
                *keystore = home.join(&*keystore);
            }
        }
    }
}

/// Builds provider instances from options.
///
/// The PEM key importer asks its factory for a national cipher suite provider when it
/// meets an SM2 key, so tests can substitute a factory and observe which instance ends up
/// holding the key.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, opts: &ProviderOpts) -> Result<SharedProvider>;
}
