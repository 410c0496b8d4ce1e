//! TLS credential loading.
//!
//! A TLS certificate is served either with a private key held by the crypto provider or,
//! when the provider does not hold it, with a key read from a PEM file next to the
//! certificate.

use std::fs;
use std::path::Path;

use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tracing::{debug, info};

use crate::cert::{Certificate, decode_certificate_chain, parse_pem_blocks};
use crate::error::{CaSignerError, Result};
use crate::fallback::FallbackChain;
use crate::key::PrivateKeyMaterial;
use crate::provider::SharedProvider;
use crate::resolver::resolve_from_cert;
use crate::signer::KeySigner;

/// Private key side of a TLS certificate.
#[derive(Debug)]
pub enum TlsPrivateKey {
    /// The key stays inside the crypto provider and signs through it.
    Provider(KeySigner),
    /// PKCS#8 DER key read from a key file.
    Der(PrivateKeyDer<'static>),
}

/// Certificate chain and private key ready for a TLS server or client.
///
/// # Fields
/// * `certificate` - DER certificates, leaf first, in file order.
/// * `private_key` - The key matching the leaf.
#[derive(Debug)]
pub struct TlsCertificate {
    pub certificate: Vec<CertificateDer<'static>>,
    pub private_key: TlsPrivateKey,
}

impl TlsCertificate {
    pub fn leaf(&self) -> Option<&CertificateDer<'static>> {
        self.certificate.first()
    }

    /// Whether the private key is held by the crypto provider.
    pub fn is_provider_backed(&self) -> bool {
        matches!(self.private_key, TlsPrivateKey::Provider(_))
    }
}

fn to_certificate_ders(chain: Vec<Vec<u8>>) -> Vec<CertificateDer<'static>> {
    chain.into_iter().map(CertificateDer::from).collect()
}

fn read_chain(cert_path: &Path) -> Result<Vec<Vec<u8>>> {
    let data = fs::read(cert_path).map_err(|e| CaSignerError::io(cert_path, e))?;
    decode_certificate_chain(cert_path, &data)
}

/// Loads the TLS certificate in `cert_path` with its private key.
///
/// The provider keystore is searched first. When it does not hold the key and
/// `key_path` is given, the pair is loaded from files with [`load_x509_key_pair`]; an
/// empty `key_path` counts as absent.
pub fn load_tls_pair(
    cert_path: &Path,
    key_path: Option<&Path>,
    provider: Option<&SharedProvider>,
) -> Result<TlsCertificate> {
    info!(
        cert_path = %cert_path.display(),
        key_path = ?key_path,
        "loading TLS certificate"
    );
    let chain = read_chain(cert_path)?;
    let leaf = Certificate::from_der(&chain[0])?.normalize()?;

    let mut strategies = FallbackChain::new().attempt(
        format!("keystore lookup for certificate '{}'", cert_path.display()),
        || {
            let (_, signer) = resolve_from_cert(&leaf, provider)?;
            Ok(TlsCertificate {
                certificate: to_certificate_ders(chain.clone()),
                private_key: TlsPrivateKey::Provider(signer),
            })
        },
    );

    if let Some(key_path) = key_path.filter(|path| !path.as_os_str().is_empty()) {
        strategies = strategies.attempt(format!("key file '{}'", key_path.display()), move || {
            debug!(
                key_path = %key_path.display(),
                "key not found in keystore, loading key file"
            );
            load_x509_key_pair(cert_path, key_path)
        });
    }

    strategies.run()
}

/// Loads a certificate chain and the private key in `key_path` from PEM files.
///
/// The first `*PRIVATE KEY` block of the key file is used and must match the public key
/// of the leaf certificate.
pub fn load_x509_key_pair(cert_path: &Path, key_path: &Path) -> Result<TlsCertificate> {
    let chain = read_chain(cert_path)?;
    let key_data = fs::read(key_path).map_err(|e| CaSignerError::io(key_path, e))?;

    let blocks = parse_pem_blocks(&key_data);
    let Some(block) = blocks.iter().find(|block| block.tag().ends_with("PRIVATE KEY")) else {
        let reason = if blocks.is_empty() {
            "failed to find any PEM data in key input".to_string()
        } else {
            "found a certificate rather than a key in the PEM for the private key".to_string()
        };
        return Err(CaSignerError::InvalidKeyType {
            path: key_path.to_path_buf(),
            reason,
        });
    };

    let invalid_key = |reason: String| CaSignerError::InvalidKeyType {
        path: key_path.to_path_buf(),
        reason,
    };
    let material = PrivateKeyMaterial::from_pem_block(block.tag(), block.contents())
        .map_err(|e| invalid_key(format!("failed parsing private key: {e}")))?;
    let Some(pkcs8) = material.pkcs8_der() else {
        return Err(invalid_key(format!("unsupported private key: {material:?}")));
    };
    let key_pair = material.to_key_pair()?;

    let leaf = Certificate::from_der(&chain[0])?.normalize()?;
    if key_pair.public_key() != leaf.public_key()? {
        return Err(CaSignerError::KeyMismatch {
            path: cert_path.to_path_buf(),
        });
    }
    debug!(ski = %leaf.ski(), "loaded TLS key pair from files");

    Ok(TlsCertificate {
        certificate: to_certificate_ders(chain),
        private_key: TlsPrivateKey::Der(PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
            pkcs8.to_vec(),
        ))),
    })
}
