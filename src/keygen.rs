use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{CaSignerError, Result};
use crate::provider::{KeyGenAlgorithm, KeyGenOpts, KeyHandle, SharedProvider};
use crate::signer::KeySigner;

/// Key generation request, as written in a certificate signing request section.
///
/// `algo` is one of `rsa`, `ecdsa` or `gmsm2` (alias `sm2`); `size` is ignored for the
/// national cipher suite.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct KeyRequest {
    pub algo: String,
    #[serde(default)]
    pub size: usize,
}

impl KeyRequest {
    pub fn new(algo: impl Into<String>, size: usize) -> Self {
        Self {
            algo: algo.into(),
            size,
        }
    }
}

/// Maps a key request onto provider key generation options.
///
/// Without a request the provider's baseline ECDSA curve is used. Only enumerated sizes
/// pass: RSA 2048/3072/4096 and ECDSA 256/384. ECDSA 521 has its own error because the
/// curve is a known gap of the providers rather than a bad size.
pub fn resolve_key_gen_opts(request: Option<&KeyRequest>, ephemeral: bool) -> Result<KeyGenOpts> {
    let Some(request) = request else {
        return Ok(KeyGenOpts {
            algorithm: KeyGenAlgorithm::Ecdsa,
            temporary: ephemeral,
        });
    };
    debug!(algo = %request.algo, size = request.size, "generate key from request");

    let algo = request.algo.to_ascii_lowercase();
    let algorithm = match algo.as_str() {
        "rsa" => match request.size {
            2048 => KeyGenAlgorithm::Rsa2048,
            3072 => KeyGenAlgorithm::Rsa3072,
            4096 => KeyGenAlgorithm::Rsa4096,
            size => {
                return Err(CaSignerError::UnsupportedKeySize {
                    algorithm: "RSA".to_string(),
                    size,
                });
            }
        },
        "ecdsa" => match request.size {
            256 => KeyGenAlgorithm::EcdsaP256,
            384 => KeyGenAlgorithm::EcdsaP384,
            521 => return Err(CaSignerError::UnsupportedCurve { size: 521 }),
            size => {
                return Err(CaSignerError::InvalidKeySize {
                    algorithm: "ECDSA".to_string(),
                    size,
                });
            }
        },
        "gmsm2" | "sm2" => KeyGenAlgorithm::Sm2,
        _ => return Err(CaSignerError::InvalidAlgorithm(request.algo.clone())),
    };

    Ok(KeyGenOpts {
        algorithm,
        temporary: ephemeral,
    })
}

/// Generates a persistent key for `request` in `provider` and wraps it as a signer.
pub fn generate_key(
    request: Option<&KeyRequest>,
    provider: &SharedProvider,
) -> Result<(KeyHandle, KeySigner)> {
    info!(request = ?request, provider = provider.name(), "generating key");
    let opts = resolve_key_gen_opts(request, false)?;
    let key = provider.key_gen(&opts)?;
    let signer = KeySigner::new(provider.clone(), key.clone())?;
    Ok((key, signer))
}
