use bon::Builder;
use serde::Deserialize;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::cert::Certificate;
use crate::error::{CaSignerError, Result};
use crate::key::{KeyAlgorithm, KeyId, PublicKey, SM2_WITH_SM3_OID};
use crate::provider::{KeyHandle, SharedProvider};

/// Represents the signature algorithms a CA signer issues with.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption.
    Sha256WithRSA,
    /// SHA-256 with ECDSA.
    Sha256WithECDSA,
    /// SHA-384 with ECDSA.
    Sha384WithECDSA,
    /// SM2 with SM3.
    Sm2WithSm3,
}

impl SignatureAlgorithm {
    /// Default algorithm for signing with a key of the given family.
    pub fn default_for(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::Rsa => SignatureAlgorithm::Sha256WithRSA,
            KeyAlgorithm::EcdsaP256 => SignatureAlgorithm::Sha256WithECDSA,
            KeyAlgorithm::EcdsaP384 => SignatureAlgorithm::Sha384WithECDSA,
            KeyAlgorithm::Sm2 => SignatureAlgorithm::Sm2WithSm3,
        }
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    fn from(value: SignatureAlgorithm) -> Self {
        let oid = match value {
            SignatureAlgorithm::Sha256WithRSA => const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha256WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
            SignatureAlgorithm::Sha384WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
            SignatureAlgorithm::Sm2WithSm3 => SM2_WITH_SM3_OID,
        };
        AlgorithmIdentifierOwned {
            oid,
            parameters: None,
        }
    }
}

/// Certificate validity period.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    pub fn for_days(days: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            not_before: now,
            not_after: now + Duration::days(days),
        }
    }
}

/// Signing policy a CA signer is bound to.
///
/// # Fields
/// * `expiry_days` - Lifetime of issued certificates.
/// * `usages` - Key usages granted to issued certificates.
/// * `is_ca` - Whether issued certificates may act as CAs.
/// * `max_path_length` - Path length constraint for issued CA certificates.
#[derive(Clone, Debug, PartialEq, Eq, Builder, Deserialize)]
#[serde(default)]
pub struct SigningPolicy {
    #[builder(default = 365)]
    pub expiry_days: i64,
    #[builder(default)]
    pub usages: Vec<String>,
    #[builder(default)]
    pub is_ca: bool,
    pub max_path_length: Option<u32>,
}

impl Default for SigningPolicy {
    fn default() -> Self {
        Self {
            expiry_days: 365,
            usages: ["signing", "key encipherment", "server auth", "client auth"]
                .into_iter()
                .map(String::from)
                .collect(),
            is_ca: false,
            max_path_length: None,
        }
    }
}

impl SigningPolicy {
    /// Validity period of a certificate issued now.
    pub fn validity(&self) -> Validity {
        Validity::for_days(self.expiry_days)
    }
}

/// Generic signer over a provider-held private key.
#[derive(Clone, Debug)]
pub struct KeySigner {
    provider: SharedProvider,
    key: KeyHandle,
}

impl KeySigner {
    /// Wraps `key`; it must be a private key held by `provider`.
    pub fn new(provider: SharedProvider, key: KeyHandle) -> Result<Self> {
        if !key.is_private() {
            return Err(CaSignerError::SignerInit(format!(
                "key {} is not a private key",
                key.ski()
            )));
        }
        Ok(Self { provider, key })
    }

    pub fn key(&self) -> &KeyHandle {
        &self.key
    }

    pub fn ski(&self) -> &KeyId {
        self.key.ski()
    }

    pub fn public_key(&self) -> &PublicKey {
        self.key.public_key()
    }

    /// The provider that holds the key and performs the signing.
    pub fn provider(&self) -> &SharedProvider {
        &self.provider
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.provider.sign(&self.key, message)
    }
}

/// Signer bound to a CA policy.
#[derive(Clone, Debug)]
pub struct CaSigner {
    signer: KeySigner,
    policy: SigningPolicy,
    signature_algorithm: SignatureAlgorithm,
    ca_certificate: Option<Certificate>,
}

impl CaSigner {
    /// Binds `signer` to `policy`. A CA certificate, when given, must certify the
    /// signer's public key.
    pub fn new(
        signer: KeySigner,
        ca_certificate: Option<Certificate>,
        policy: SigningPolicy,
    ) -> Result<Self> {
        if let Some(cert) = &ca_certificate {
            if cert.ski() != *signer.ski() {
                return Err(CaSignerError::SignerInit(format!(
                    "CA certificate key {} does not match signing key {}",
                    cert.ski(),
                    signer.ski()
                )));
            }
        }
        let signature_algorithm = SignatureAlgorithm::default_for(signer.key().algorithm());
        debug!(
            ski = %signer.ski(),
            provider = signer.provider().name(),
            algorithm = ?signature_algorithm,
            "built CA signer"
        );
        Ok(Self {
            signer,
            policy,
            signature_algorithm,
            ca_certificate,
        })
    }

    pub fn key_signer(&self) -> &KeySigner {
        &self.signer
    }

    pub fn public_key(&self) -> &PublicKey {
        self.signer.public_key()
    }

    pub fn ski(&self) -> &KeyId {
        self.signer.ski()
    }

    pub fn policy(&self) -> &SigningPolicy {
        &self.policy
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.signature_algorithm
    }

    pub fn ca_certificate(&self) -> Option<&Certificate> {
        self.ca_certificate.as_ref()
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.signer.sign(message)
    }
}

/// Wraps a provider key as a CA signer bound to `policy`.
pub fn build_signer(
    provider: &SharedProvider,
    key: &KeyHandle,
    policy: &SigningPolicy,
) -> Result<CaSigner> {
    let signer = KeySigner::new(provider.clone(), key.clone())?;
    CaSigner::new(signer, None, policy.clone())
}
