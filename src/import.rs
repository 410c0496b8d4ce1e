use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{CaSignerError, Result};
use crate::key::PrivateKeyMaterial;
use crate::provider::{KeyHandle, KeyImportOpts, ProviderFactory, ProviderOpts, SharedProvider};
use crate::signer::KeySigner;

/// A key imported from a PEM file, together with the provider that now holds it.
///
/// SM2 keys end up in a national cipher suite provider rather than the one passed to
/// the importer; signing must go through `provider`.
#[derive(Clone, Debug)]
pub struct ImportedKey {
    pub key: KeyHandle,
    pub provider: SharedProvider,
}

impl ImportedKey {
    /// Wraps the key as a signer bound to the provider holding it.
    pub fn into_signer(self) -> Result<KeySigner> {
        KeySigner::new(self.provider, self.key)
    }
}

/// Imports PEM private keys into crypto providers.
#[derive(Clone)]
pub struct PemKeyImporter {
    factory: Arc<dyn ProviderFactory>,
    national_keystore: PathBuf,
}

impl fmt::Debug for PemKeyImporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PemKeyImporter")
            .field("national_keystore", &self.national_keystore)
            .finish_non_exhaustive()
    }
}

impl PemKeyImporter {
    /// `factory` builds the national cipher suite provider used for SM2 keys, which keeps
    /// its keys in `national_keystore`.
    pub fn new(factory: Arc<dyn ProviderFactory>, national_keystore: impl Into<PathBuf>) -> Self {
        Self {
            factory,
            national_keystore: national_keystore.into(),
        }
    }

    /// Imports the private key stored in `path`.
    ///
    /// ECDSA keys go into `provider`. SM2 keys go into a national cipher suite provider
    /// obtained from the factory; `provider` is left untouched. RSA private keys cannot
    /// be imported.
    pub fn import(
        &self,
        path: &Path,
        provider: &SharedProvider,
        temporary: bool,
    ) -> Result<ImportedKey> {
        info!(path = %path.display(), temporary, "importing private key from PEM file");
        let data = fs::read(path).map_err(|e| CaSignerError::io(path, e))?;

        let material =
            PrivateKeyMaterial::from_pem(&data).map_err(|e| CaSignerError::InvalidKeyType {
                path: path.to_path_buf(),
                reason: format!("failed parsing private key: {e}"),
            })?;
        debug!(path = %path.display(), material = ?material, "parsed private key");

        match material {
            PrivateKeyMaterial::Sm2(pkcs8) => {
                let national = self.national_provider()?;
                info!(
                    provider = national.name(),
                    keystore = %self.national_keystore.display(),
                    "switching to national cipher suite provider for SM2 key"
                );
                let key = national
                    .key_import(pkcs8.as_bytes(), &KeyImportOpts::Sm2PrivateKey { temporary })
                    .map_err(|e| {
                        CaSignerError::Provider(format!(
                            "Failed to import SM2 private key from '{}': {e}",
                            path.display()
                        ))
                    })?;
                Ok(ImportedKey {
                    key,
                    provider: national,
                })
            }
            PrivateKeyMaterial::Ecdsa { pkcs8, .. } => {
                let key = provider
                    .key_import(pkcs8.as_bytes(), &KeyImportOpts::EcdsaPrivateKey { temporary })
                    .map_err(|e| {
                        CaSignerError::Provider(format!(
                            "Failed to import ECDSA private key from '{}': {e}",
                            path.display()
                        ))
                    })?;
                Ok(ImportedKey {
                    key,
                    provider: provider.clone(),
                })
            }
            PrivateKeyMaterial::Rsa(_) => Err(CaSignerError::UnsupportedKeyImport {
                path: path.to_path_buf(),
                algorithm: "RSA".to_string(),
            }),
            PrivateKeyMaterial::Unsupported(what) => Err(CaSignerError::InvalidKeyType {
                path: path.to_path_buf(),
                reason: format!("invalid secret key type: {what}"),
            }),
        }
    }

    fn national_provider(&self) -> Result<SharedProvider> {
        let opts = ProviderOpts::national(&self.national_keystore);
        self.factory.create(&opts).map_err(|e| {
            CaSignerError::Provider(format!(
                "Failed to get national cipher suite provider with keystore '{}': {e}",
                self.national_keystore.display()
            ))
        })
    }
}
