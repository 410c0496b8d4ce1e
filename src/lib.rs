//! # CaSigner - Key and Signer Resolution for a Certificate Authority
//!
//! CaSigner sits between a certificate authority and its crypto provider. It turns key
//! requests into provider key generation options, imports PEM private keys, finds the
//! private key behind a certificate, and assembles CA signers and TLS credentials,
//! falling back from the provider keystore to key files when a key is not held there.
//!
//! ## Supported Key Types
//!
//! - **RSA**: 2048, 3072, and 4096-bit keys (generation only; RSA private keys are not
//!   imported from PEM)
//! - **ECDSA**: P-256 and P-384 curves
//! - **SM2**: national cipher suite keys, held by a dedicated national provider
//!
//! ## Supported File Formats
//!
//! - **PEM private keys**: `PRIVATE KEY`, `EC PRIVATE KEY`, `RSA PRIVATE KEY` and
//!   `SM2 PRIVATE KEY` blocks
//! - **Certificates**: PEM or DER, including SM2 certificates whose public key algorithm
//!   is written as the SM2 curve OID
//!
//! ## Quick Start
//!
//! ### Resolving Key Generation Options
//!
//! ```rust
//! use casigner::keygen::{KeyRequest, resolve_key_gen_opts};
//! use casigner::provider::KeyGenAlgorithm;
//!
//! # fn main() -> Result<(), casigner::error::CaSignerError> {
//! let request = KeyRequest::new("ecdsa", 384);
//! let opts = resolve_key_gen_opts(Some(&request), false)?;
//! assert_eq!(opts.algorithm, KeyGenAlgorithm::EcdsaP384);
//! # Ok(())
//! # }
//! ```
//!
//! ### Building a CA Signer
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use casigner::config::{CspConfig, init_provider};
//! use casigner::provider::SoftwareProviderFactory;
//! use casigner::resolver::KeyResolver;
//!
//! # fn main() -> Result<(), casigner::error::CaSignerError> {
//! let home = Path::new("/var/lib/ca");
//! let mut config = CspConfig::from_file(&home.join("casigner.toml"))?;
//! let factory = Arc::new(SoftwareProviderFactory);
//! let provider = init_provider(&mut config, factory.as_ref(), home)?;
//!
//! // The key is looked up in the provider keystore first, then read from ca-key.pem.
//! let resolver = KeyResolver::from_config(&config, factory);
//! let signer = resolver.build_ca_backed_signer(
//!     &home.join("ca-cert.pem"),
//!     &home.join("ca-key.pem"),
//!     &config.signing,
//!     &provider,
//! )?;
//! println!("CA signer ready, SKI {}", signer.ski());
//! # Ok(())
//! # }
//! ```
//!
//! ### Loading TLS Credentials
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use casigner::provider::{SharedProvider, SoftwareProvider};
//! use casigner::tls::load_tls_pair;
//!
//! # fn main() -> Result<(), casigner::error::CaSignerError> {
//! let provider: SharedProvider = Arc::new(SoftwareProvider::in_memory());
//! let tls = load_tls_pair(
//!     Path::new("tls-cert.pem"),
//!     Some(Path::new("tls-key.pem")),
//!     Some(&provider),
//! )?;
//! println!("{} certificate(s) loaded", tls.certificate.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`error::CaSignerError`]. When a fallback is involved and every
//! alternative fails, the error lists each attempt:
//!
//! ```rust
//! use std::path::Path;
//!
//! use casigner::error::CaSignerError;
//! use casigner::tls::load_tls_pair;
//!
//! match load_tls_pair(Path::new("/nonexistent/cert.pem"), None, None) {
//!     Ok(_) => println!("loaded"),
//!     Err(CaSignerError::Io { path, .. }) => println!("cannot read {}", path.display()),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`keygen`]: Key requests and provider key generation options
//! - [`import`]: PEM private key import, with the SM2 provider switch
//! - [`resolver`]: Certificate-to-signer resolution and CA-backed signers
//! - [`signer`]: Key signers, CA signers and signing policy
//! - [`tls`]: TLS certificate and key loading
//! - [`provider`]: Crypto provider interface and the software provider
//! - [`config`]: Provider configuration
//! - [`revocation`]: Revocation authority interface
//! - [`key`], [`cert`]: Key and certificate encodings
//! - [`fallback`]: Ordered fallback strategies
//! - [`error`]: Error types

pub mod cert;
pub mod config;
pub mod error;
pub mod fallback;
pub mod import;
pub mod key;
pub mod keygen;
pub mod provider;
pub mod resolver;
pub mod revocation;
pub mod signer;
pub mod tls;
