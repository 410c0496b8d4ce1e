//! Error types for key, certificate and signer resolution.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, CaSignerError>;

/// Represents errors that can occur while resolving keys, certificates and signers.
///
/// Every variant carries the context needed to act on it: the offending path, key
/// identifier, or algorithm and size.
#[derive(Debug, Error, Clone)]
pub enum CaSignerError {
    /// Key request names an algorithm that is not known.
    #[error("Invalid algorithm: {0}")]
    InvalidAlgorithm(String),

    /// Key request asks for a size the algorithm family does not offer.
    #[error("Unsupported {algorithm} key size: {size}")]
    UnsupportedKeySize { algorithm: String, size: usize },

    /// Key request asks for an ECDSA size that does not name a curve.
    #[error("Invalid {algorithm} key size: {size}")]
    InvalidKeySize { algorithm: String, size: usize },

    /// Key request names a curve the providers cannot generate yet.
    #[error("Unsupported ECDSA key size: {size}; curve is not available in the crypto provider")]
    UnsupportedCurve { size: usize },

    /// Reading a file failed.
    #[error("Failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Key material could not be parsed, or is of a family this crate does not know.
    #[error("Failed to import key from '{}': {reason}", .path.display())]
    InvalidKeyType { path: PathBuf, reason: String },

    /// Key material was parsed but its family cannot be imported.
    #[error("Failed to import {algorithm} key from '{}'; {algorithm} private key import is not supported", .path.display())]
    UnsupportedKeyImport { path: PathBuf, algorithm: String },

    /// No crypto provider was supplied.
    #[error("Crypto provider was not initialized")]
    ProviderNotInitialized,

    /// The provider keystore holds no private key for the identifier.
    #[error("Could not find matching private key for SKI {ski}: {reason}")]
    PrivateKeyNotFound { ski: String, reason: String },

    /// The certificate file holds no PEM data at all.
    #[error("Failed to find PEM block in file '{}'", .path.display())]
    NoPemData { path: PathBuf },

    /// The certificate file holds PEM blocks, but none of them is a certificate.
    #[error("Failed to find \"CERTIFICATE\" PEM block in file '{}' after skipping PEM blocks of the following types: {skipped:?}", .path.display())]
    NoCertificateBlock { path: PathBuf, skipped: Vec<String> },

    /// The certificate file holds a single private key; certificate and key paths were
    /// most likely swapped.
    #[error("Failed to find certificate PEM data in file '{}', but did find a private key; PEM inputs may have been switched", .path.display())]
    CertKeySwapped { path: PathBuf },

    /// A private key does not belong to the certificate it is paired with.
    #[error("Private key does not match public key in certificate '{}'", .path.display())]
    KeyMismatch { path: PathBuf },

    /// Wrapping a key into a signer failed.
    #[error("Failed initializing signer: {0}")]
    SignerInit(String),

    /// Error reported by a crypto provider.
    #[error("Crypto provider error: {0}")]
    Provider(String),

    /// Error related to certificate contents.
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every strategy of a fallback chain failed.
    #[error("{}", describe_attempts(.attempts))]
    AllStrategiesFailed { attempts: Vec<StrategyFailure> },
}

/// One failed attempt of a [`crate::fallback::FallbackChain`].
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    /// Name of the strategy, including the path or identifier it worked on.
    pub strategy: String,
    /// Why it failed.
    pub error: CaSignerError,
}

fn describe_attempts(attempts: &[StrategyFailure]) -> String {
    if attempts.is_empty() {
        return "No strategy was attempted".to_string();
    }
    let described: Vec<String> = attempts
        .iter()
        .map(|attempt| format!("{}: {}", attempt.strategy, attempt.error))
        .collect();
    format!("All strategies failed: {}", described.join("; "))
}

impl CaSignerError {
    /// Wraps an I/O error together with the path that produced it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaSignerError::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Returns the failed attempts if this is a composite fallback error.
    pub fn attempts(&self) -> Option<&[StrategyFailure]> {
        match self {
            CaSignerError::AllStrategiesFailed { attempts } => Some(attempts),
            _ => None,
        }
    }
}

impl From<der::Error> for CaSignerError {
    /// Converts a `der::Error` into a `CaSignerError`.
    fn from(err: der::Error) -> Self {
        CaSignerError::DecodingError(err.to_string())
    }
}

impl From<pkcs8::Error> for CaSignerError {
    fn from(err: pkcs8::Error) -> Self {
        CaSignerError::DecodingError(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for CaSignerError {
    fn from(err: pkcs8::spki::Error) -> Self {
        CaSignerError::DecodingError(err.to_string())
    }
}

impl From<pem::PemError> for CaSignerError {
    fn from(err: pem::PemError) -> Self {
        CaSignerError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for CaSignerError {
    fn from(err: rsa::Error) -> Self {
        CaSignerError::Provider(err.to_string())
    }
}

impl From<toml::de::Error> for CaSignerError {
    fn from(err: toml::de::Error) -> Self {
        CaSignerError::Config(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for CaSignerError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        CaSignerError::DecodingError(err.to_string())
    }
}

impl From<sec1::Error> for CaSignerError {
    fn from(err: sec1::Error) -> Self {
        CaSignerError::DecodingError(err.to_string())
    }
}
