use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::cert::{Certificate, read_certificate_file};
use crate::config::CspConfig;
use crate::error::{CaSignerError, Result};
use crate::fallback::FallbackChain;
use crate::import::{ImportedKey, PemKeyImporter};
use crate::provider::{KeyHandle, KeyImportOpts, ProviderFactory, SharedProvider};
use crate::signer::{CaSigner, KeySigner, SigningPolicy};

/// Finds the provider-held private key certified by `cert` and wraps it as a signer.
///
/// The public key is imported as a temporary key only to derive its identifier, so a
/// miss leaves the keystore unchanged.
pub fn resolve_from_cert(
    cert: &Certificate,
    provider: Option<&SharedProvider>,
) -> Result<(KeyHandle, KeySigner)> {
    let provider = provider.ok_or(CaSignerError::ProviderNotInitialized)?;

    let cert_der = cert.to_der()?;
    let public_key = provider
        .key_import(&cert_der, &KeyImportOpts::X509PublicKey { temporary: true })
        .map_err(|e| {
            CaSignerError::Certificate(format!("Failed to import certificate's public key: {e}"))
        })?;
    let ski = public_key.ski();
    info!(ski = %ski, provider = provider.name(), "derived SKI from certificate");

    let key = provider
        .get_key(ski)
        .map_err(|e| CaSignerError::PrivateKeyNotFound {
            ski: ski.to_hex(),
            reason: e.to_string(),
        })?;
    let signer = KeySigner::new(provider.clone(), key.clone())?;
    Ok((key, signer))
}

/// Reads the certificate in `path` and resolves its private key.
///
/// The file may hold PEM (the first `CERTIFICATE` block is used) or raw DER.
pub fn resolve_from_cert_file(
    path: &Path,
    provider: Option<&SharedProvider>,
) -> Result<(KeyHandle, KeySigner, Certificate)> {
    info!(path = %path.display(), "loading signer from certificate file");
    let cert = read_certificate_file(path)?;
    let (key, signer) = resolve_from_cert(&cert, provider)?;
    Ok((key, signer, cert))
}

/// Resolves CA signing keys from certificates, keystores and key files.
#[derive(Clone, Debug)]
pub struct KeyResolver {
    importer: PemKeyImporter,
}

impl KeyResolver {
    pub fn new(factory: Arc<dyn ProviderFactory>, national_keystore: impl Into<PathBuf>) -> Self {
        Self {
            importer: PemKeyImporter::new(factory, national_keystore),
        }
    }

    /// Builds a resolver using the national keystore configured in `config`.
    pub fn from_config(config: &CspConfig, factory: Arc<dyn ProviderFactory>) -> Self {
        Self::new(factory, config.national_keystore.clone())
    }

    /// Imports the private key in `path`; see [`PemKeyImporter::import`].
    pub fn import_from_pem(
        &self,
        path: &Path,
        provider: &SharedProvider,
        temporary: bool,
    ) -> Result<ImportedKey> {
        self.importer.import(path, provider, temporary)
    }

    /// Builds a CA signer for the certificate in `cert_path`.
    ///
    /// The private key is looked up in `provider` by the certificate's key identifier
    /// first; only when that fails is `key_path` read and imported. When both fail the
    /// error lists both attempts.
    pub fn build_ca_backed_signer(
        &self,
        cert_path: &Path,
        key_path: &Path,
        policy: &SigningPolicy,
        provider: &SharedProvider,
    ) -> Result<CaSigner> {
        let ca_cert = read_certificate_file(cert_path);

        let signer = FallbackChain::new()
            .attempt(
                format!("keystore lookup for certificate '{}'", cert_path.display()),
                || {
                    let cert = ca_cert.as_ref().map_err(|e| e.clone())?;
                    let (_, signer) = resolve_from_cert(cert, Some(provider))?;
                    Ok(signer)
                },
            )
            .attempt(format!("key file '{}'", key_path.display()), || {
                debug!(
                    key_path = %key_path.display(),
                    "no key found in keystore, importing key file"
                );
                self.import_from_pem(key_path, provider, false)?
                    .into_signer()
            })
            .run()?;

        CaSigner::new(signer, ca_cert.ok(), policy.clone())
    }
}
