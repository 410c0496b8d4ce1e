use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use super::keystore::FileKeyStore;
use super::{
    CipherFamily, CryptoProvider, KeyGenAlgorithm, KeyGenOpts, KeyHandle, KeyImportOpts,
    ProviderFactory, ProviderOpts, SharedProvider,
};
use crate::cert::Certificate;
use crate::error::{CaSignerError, Result};
use crate::key::{KeyAlgorithm, KeyId, KeyPair, PrivateKeyMaterial};

/// Provider backed by the RustCrypto key types.
///
/// Private keys live in memory; when a keystore directory is configured, non-temporary
/// keys are also written there and looked up from there on a memory miss.
///
/// The standard family handles RSA and ECDSA P-256/P-384, the national family handles
/// SM2. Both import X.509 public keys of any supported family.
pub struct SoftwareProvider {
    name: String,
    opts: ProviderOpts,
    keys: RwLock<HashMap<KeyId, KeyPair>>,
    file_store: Option<FileKeyStore>,
}

impl fmt::Debug for SoftwareProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareProvider")
            .field("name", &self.name)
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl SoftwareProvider {
    /// Builds a provider, opening its file keystore if one is configured.
    pub fn new(opts: ProviderOpts) -> Result<Self> {
        match (opts.family, opts.hash_family.as_str()) {
            (CipherFamily::Standard, "SHA2" | "SHA3") | (CipherFamily::National, "GMSM3") => {}
            (family, hash) => {
                return Err(CaSignerError::Config(format!(
                    "hash family {hash} is not available for the {family} provider"
                )));
            }
        }
        if !matches!(opts.security_level, 256 | 384) {
            return Err(CaSignerError::Config(format!(
                "unsupported security level {}",
                opts.security_level
            )));
        }

        let file_store = opts.keystore.as_ref().map(FileKeyStore::open).transpose()?;
        let name = format!("{}-{}", opts.family, opts.security_level);
        info!(
            provider = %name,
            keystore = ?opts.keystore,
            "initialized software crypto provider"
        );

        Ok(Self {
            name,
            opts,
            keys: RwLock::new(HashMap::new()),
            file_store,
        })
    }

    /// Standard provider without a persistent keystore.
    pub fn in_memory() -> Self {
        Self {
            name: "SW-256".to_string(),
            opts: ProviderOpts::default(),
            keys: RwLock::new(HashMap::new()),
            file_store: None,
        }
    }

    /// Number of private keys currently held in memory.
    ///
    /// A poisoned cache is still counted.
    pub fn key_count(&self) -> usize {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn supports(&self, algorithm: KeyAlgorithm) -> bool {
        match self.opts.family {
            CipherFamily::Standard => algorithm != KeyAlgorithm::Sm2,
            CipherFamily::National => algorithm == KeyAlgorithm::Sm2,
        }
    }

    fn ensure_supported(&self, algorithm: KeyAlgorithm) -> Result<()> {
        if self.supports(algorithm) {
            Ok(())
        } else {
            Err(CaSignerError::Provider(format!(
                "{algorithm} keys are not supported by the {} provider",
                self.opts.family
            )))
        }
    }

    fn store(&self, pair: KeyPair, temporary: bool) -> Result<KeyHandle> {
        let handle = KeyHandle::private(pair.public_key())?;
        if !temporary {
            if let Some(file_store) = &self.file_store {
                file_store.store(handle.ski(), &pair)?;
            }
        }
        self.keys
            .write()
            .map_err(|_| CaSignerError::Provider("Failed to acquire write lock".to_string()))?
            .insert(handle.ski().clone(), pair);
        Ok(handle)
    }

    fn lookup(&self, ski: &KeyId) -> Result<Option<KeyPair>> {
        let cached = self
            .keys
            .read()
            .map_err(|_| CaSignerError::Provider("Failed to acquire read lock".to_string()))?
            .get(ski)
            .cloned();
        if cached.is_some() {
            return Ok(cached);
        }

        let Some(file_store) = &self.file_store else {
            return Ok(None);
        };
        let Some(pair) = file_store.load(ski)? else {
            return Ok(None);
        };
        self.keys
            .write()
            .map_err(|_| CaSignerError::Provider("Failed to acquire write lock".to_string()))?
            .insert(ski.clone(), pair.clone());
        Ok(Some(pair))
    }

    fn import_private(
        &self,
        raw: &[u8],
        expected: fn(&PrivateKeyMaterial) -> bool,
        temporary: bool,
    ) -> Result<KeyHandle> {
        let material = PrivateKeyMaterial::from_pkcs8_der(raw)?;
        if !expected(&material) {
            return Err(CaSignerError::Provider(format!(
                "key material does not match the import options: {material:?}"
            )));
        }
        let pair = material.to_key_pair()?;
        self.ensure_supported(pair.algorithm())?;
        self.store(pair, temporary)
    }
}

impl CryptoProvider for SoftwareProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn key_gen(&self, opts: &KeyGenOpts) -> Result<KeyHandle> {
        let pair = match opts.algorithm {
            KeyGenAlgorithm::Ecdsa if self.opts.security_level == 384 => {
                self.ensure_supported(KeyAlgorithm::EcdsaP384)?;
                KeyPair::generate_ecdsa_p384()
            }
            KeyGenAlgorithm::Ecdsa | KeyGenAlgorithm::EcdsaP256 => {
                self.ensure_supported(KeyAlgorithm::EcdsaP256)?;
                KeyPair::generate_ecdsa_p256()
            }
            KeyGenAlgorithm::EcdsaP384 => {
                self.ensure_supported(KeyAlgorithm::EcdsaP384)?;
                KeyPair::generate_ecdsa_p384()
            }
            KeyGenAlgorithm::Rsa2048 | KeyGenAlgorithm::Rsa3072 | KeyGenAlgorithm::Rsa4096 => {
                self.ensure_supported(KeyAlgorithm::Rsa)?;
                let bits = match opts.algorithm {
                    KeyGenAlgorithm::Rsa2048 => 2048,
                    KeyGenAlgorithm::Rsa3072 => 3072,
                    _ => 4096,
                };
                KeyPair::generate_rsa(bits)?
            }
            KeyGenAlgorithm::Sm2 => {
                self.ensure_supported(KeyAlgorithm::Sm2)?;
                KeyPair::generate_sm2()
            }
        };
        debug!(provider = %self.name, algorithm = %pair.algorithm(), "generated key");
        self.store(pair, opts.temporary)
    }

    fn key_import(&self, raw: &[u8], opts: &KeyImportOpts) -> Result<KeyHandle> {
        match *opts {
            KeyImportOpts::X509PublicKey { .. } => {
                let cert = Certificate::from_der(raw)?.normalize()?;
                KeyHandle::public(cert.public_key()?)
            }
            KeyImportOpts::EcdsaPrivateKey { temporary } => self.import_private(
                raw,
                |material| matches!(material, PrivateKeyMaterial::Ecdsa { .. }),
                temporary,
            ),
            KeyImportOpts::Sm2PrivateKey { temporary } => self.import_private(
                raw,
                |material| matches!(material, PrivateKeyMaterial::Sm2(_)),
                temporary,
            ),
        }
    }

    fn get_key(&self, ski: &KeyId) -> Result<KeyHandle> {
        match self.lookup(ski)? {
            Some(pair) => KeyHandle::private(pair.public_key()),
            None => Err(CaSignerError::Provider(format!(
                "key with SKI {ski} not found in the {} keystore",
                self.name
            ))),
        }
    }

    fn sign(&self, key: &KeyHandle, message: &[u8]) -> Result<Vec<u8>> {
        if !key.is_private() {
            return Err(CaSignerError::Provider(format!(
                "key {} is a public key and cannot sign",
                key.ski()
            )));
        }
        let pair = self.lookup(key.ski())?.ok_or_else(|| {
            CaSignerError::Provider(format!("key with SKI {} is not held by {}", key.ski(), self.name))
        })?;
        pair.sign_data(message)
    }
}

/// Builds [`SoftwareProvider`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareProviderFactory;

impl ProviderFactory for SoftwareProviderFactory {
    fn create(&self, opts: &ProviderOpts) -> Result<SharedProvider> {
        Ok(Arc::new(SoftwareProvider::new(opts.clone())?))
    }
}
