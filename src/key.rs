use std::fmt;

use const_oid::ObjectIdentifier;
use const_oid::db::rfc5912::{
    ID_EC_PUBLIC_KEY, RSA_ENCRYPTION, SECP_256_R_1, SECP_384_R_1, SECP_521_R_1,
};
use der::asn1::Any;
use der::{Encode, Tag};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, PrivateKeyInfo, SecretDocument};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey as RsaSigningKey;
use rsa::signature::SignatureEncoding;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::error::{CaSignerError, Result};

/// Named curve of the national cipher suite (sm2p256v1).
pub const SM2_CURVE_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.156.10197.1.301");

/// SM2 signature with SM3 digest.
pub const SM2_WITH_SM3_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.156.10197.1.501");

/// Distinguishing identifier used for SM2 signatures when none is configured.
pub const SM2_DEFAULT_DIST_ID: &str = "1234567812345678";

/// Subject key identifier: the stable name a provider files a key under.
///
/// Derived as SHA-256 over the subjectPublicKey bit string of the key's
/// SubjectPublicKeyInfo, so a certificate and its private key always agree on it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KeyId(Vec<u8>);

impl KeyId {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Derives the identifier of the public key carried by `spki`.
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Self {
        let digest = Sha256::digest(spki.subject_public_key.raw_bytes());
        Self(digest.to_vec())
    }

    /// Parses a hex-encoded identifier, as found in keystore file names.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        hex::decode(encoded)
            .map(Self)
            .map_err(|e| CaSignerError::DecodingError(format!("invalid key identifier: {e}")))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self.to_hex())
    }
}

/// Asymmetric key families a provider can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    Rsa,
    EcdsaP256,
    EcdsaP384,
    /// National cipher suite curve.
    Sm2,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::EcdsaP256 => "ECDSA P-256",
            KeyAlgorithm::EcdsaP384 => "ECDSA P-384",
            KeyAlgorithm::Sm2 => "SM2",
        };
        f.write_str(name)
    }
}

/// ECDSA curves accepted for private key import.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EcdsaCurve {
    P256,
    P384,
}

impl EcdsaCurve {
    pub fn algorithm(self) -> KeyAlgorithm {
        match self {
            EcdsaCurve::P256 => KeyAlgorithm::EcdsaP256,
            EcdsaCurve::P384 => KeyAlgorithm::EcdsaP384,
        }
    }
}

/// Public half of a key, as found in certificates and keystore handles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
    Sm2(sm2::PublicKey),
}

impl PublicKey {
    /// Decodes the public key of a SubjectPublicKeyInfo.
    ///
    /// SM2 keys written with the curve OID as the algorithm identifier are accepted and
    /// read as the standard `id-ecPublicKey` form.
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let spki = normalize_spki(spki.clone())?;
        let der = spki.to_der()?;

        match spki.algorithm.oid {
            RSA_ENCRYPTION => Ok(PublicKey::Rsa(RsaPublicKey::from_public_key_der(&der)?)),
            ID_EC_PUBLIC_KEY => match named_curve(&spki.algorithm) {
                Some(SECP_256_R_1) => Ok(PublicKey::EcdsaP256(
                    P256VerifyingKey::from_public_key_der(&der)?,
                )),
                Some(SECP_384_R_1) => Ok(PublicKey::EcdsaP384(
                    P384VerifyingKey::from_public_key_der(&der)?,
                )),
                Some(SM2_CURVE_OID) => Ok(PublicKey::Sm2(sm2::PublicKey::from_public_key_der(
                    &der,
                )?)),
                Some(other) => Err(CaSignerError::Certificate(format!(
                    "unsupported elliptic curve {other}"
                ))),
                None => Err(CaSignerError::Certificate(
                    "elliptic curve public key without a named curve".to_string(),
                )),
            },
            other => Err(CaSignerError::Certificate(format!(
                "unsupported public key algorithm {other}"
            ))),
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PublicKey::Rsa(_) => KeyAlgorithm::Rsa,
            PublicKey::EcdsaP256(_) => KeyAlgorithm::EcdsaP256,
            PublicKey::EcdsaP384(_) => KeyAlgorithm::EcdsaP384,
            PublicKey::Sm2(_) => KeyAlgorithm::Sm2,
        }
    }

    /// Encodes the key as a SubjectPublicKeyInfo.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone())?,
            PublicKey::EcdsaP256(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)?
            }
            PublicKey::EcdsaP384(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)?
            }
            PublicKey::Sm2(public) => SubjectPublicKeyInfoOwned::from_key(*public)?,
        };
        Ok(spki)
    }

    /// DER-encoded SubjectPublicKeyInfo.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_spki()?.to_der()?)
    }

    /// Subject key identifier of this key.
    pub fn ski(&self) -> Result<KeyId> {
        Ok(KeyId::from_spki(&self.to_spki()?))
    }
}

/// Rewrites the alternate SM2 SubjectPublicKeyInfo encoding, whose algorithm
/// identifier is the curve OID itself, into `id-ecPublicKey` with a named curve.
/// Any other key info is returned untouched.
pub fn normalize_spki(mut spki: SubjectPublicKeyInfoOwned) -> Result<SubjectPublicKeyInfoOwned> {
    if spki.algorithm.oid == SM2_CURVE_OID {
        spki.algorithm = AlgorithmIdentifierOwned {
            oid: ID_EC_PUBLIC_KEY,
            parameters: Some(Any::new(Tag::ObjectIdentifier, SM2_CURVE_OID.as_bytes())?),
        };
    }
    Ok(spki)
}

fn named_curve(algorithm: &AlgorithmIdentifierOwned) -> Option<ObjectIdentifier> {
    algorithm
        .parameters
        .as_ref()
        .and_then(|params| params.decode_as::<ObjectIdentifier>().ok())
}

/// Private key material read from a PEM file, classified by family.
///
/// Supported families carry the key re-encoded as PKCS#8 DER, which zeroizes on drop.
/// Anything this crate cannot use is kept as [`PrivateKeyMaterial::Unsupported`] with a
/// description, so callers decide how to report it.
pub enum PrivateKeyMaterial {
    /// National cipher suite key.
    Sm2(SecretDocument),
    Ecdsa {
        curve: EcdsaCurve,
        pkcs8: SecretDocument,
    },
    Rsa(SecretDocument),
    Unsupported(String),
}

impl fmt::Debug for PrivateKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivateKeyMaterial::Sm2(_) => f.write_str("PrivateKeyMaterial::Sm2(..)"),
            PrivateKeyMaterial::Ecdsa { curve, .. } => {
                write!(f, "PrivateKeyMaterial::Ecdsa({curve:?})")
            }
            PrivateKeyMaterial::Rsa(_) => f.write_str("PrivateKeyMaterial::Rsa(..)"),
            PrivateKeyMaterial::Unsupported(what) => {
                write!(f, "PrivateKeyMaterial::Unsupported({what})")
            }
        }
    }
}

impl PrivateKeyMaterial {
    /// Parses the first PEM block of `input`.
    pub fn from_pem(input: &[u8]) -> Result<Self> {
        let block = pem::parse(input)?;
        Self::from_pem_block(block.tag(), block.contents())
    }

    /// Classifies the contents of one PEM block by its label.
    ///
    /// Labels: `PRIVATE KEY` (PKCS#8), `EC PRIVATE KEY` (SEC1), `RSA PRIVATE KEY`
    /// (PKCS#1) and `SM2 PRIVATE KEY` (PKCS#8 or SEC1 on the SM2 curve).
    pub fn from_pem_block(label: &str, der: &[u8]) -> Result<Self> {
        match label {
            "PRIVATE KEY" => Self::from_pkcs8_der(der),
            "EC PRIVATE KEY" => Self::from_sec1_der(der),
            "RSA PRIVATE KEY" => {
                let private = RsaPrivateKey::from_pkcs1_der(der)?;
                Ok(PrivateKeyMaterial::Rsa(private.to_pkcs8_der()?))
            }
            "SM2 PRIVATE KEY" => match PrivateKeyInfo::try_from(der) {
                Ok(_) => Self::from_pkcs8_der(der),
                Err(_) => sm2_from_sec1(der),
            },
            other => Ok(PrivateKeyMaterial::Unsupported(format!(
                "PEM block of type \"{other}\""
            ))),
        }
    }

    /// Classifies a PKCS#8 `PrivateKeyInfo`.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = PrivateKeyInfo::try_from(der)?;

        match info.algorithm.oid {
            RSA_ENCRYPTION => {
                let private = RsaPrivateKey::from_pkcs8_der(der)?;
                Ok(PrivateKeyMaterial::Rsa(private.to_pkcs8_der()?))
            }
            ID_EC_PUBLIC_KEY => match info.algorithm.parameters_oid() {
                Ok(SECP_256_R_1) => Ok(PrivateKeyMaterial::Ecdsa {
                    curve: EcdsaCurve::P256,
                    pkcs8: P256SigningKey::from_pkcs8_der(der)?.to_pkcs8_der()?,
                }),
                Ok(SECP_384_R_1) => Ok(PrivateKeyMaterial::Ecdsa {
                    curve: EcdsaCurve::P384,
                    pkcs8: P384SigningKey::from_pkcs8_der(der)?.to_pkcs8_der()?,
                }),
                Ok(SM2_CURVE_OID) => Ok(PrivateKeyMaterial::Sm2(
                    sm2::SecretKey::from_pkcs8_der(der)?.to_pkcs8_der()?,
                )),
                Ok(SECP_521_R_1) => Ok(PrivateKeyMaterial::Unsupported(
                    "ECDSA P-521 private key".to_string(),
                )),
                Ok(other) => Ok(PrivateKeyMaterial::Unsupported(format!(
                    "elliptic curve {other}"
                ))),
                Err(e) => Err(CaSignerError::DecodingError(format!(
                    "EC private key without a named curve: {e}"
                ))),
            },
            // Alternate encoding: the SM2 curve OID used as the algorithm identifier.
            SM2_CURVE_OID => sm2_from_sec1(info.private_key),
            other => Ok(PrivateKeyMaterial::Unsupported(format!(
                "private key algorithm {other}"
            ))),
        }
    }

    /// Classifies a SEC1 `ECPrivateKey` by its named curve parameter.
    pub fn from_sec1_der(der: &[u8]) -> Result<Self> {
        let ec_key = sec1::EcPrivateKey::try_from(der)?;
        let curve = ec_key.parameters.and_then(|params| params.named_curve());

        match curve {
            Some(SECP_256_R_1) => {
                let secret = p256::SecretKey::from_sec1_der(der).map_err(decoding)?;
                Ok(PrivateKeyMaterial::Ecdsa {
                    curve: EcdsaCurve::P256,
                    pkcs8: secret.to_pkcs8_der()?,
                })
            }
            Some(SECP_384_R_1) => {
                let secret = p384::SecretKey::from_sec1_der(der).map_err(decoding)?;
                Ok(PrivateKeyMaterial::Ecdsa {
                    curve: EcdsaCurve::P384,
                    pkcs8: secret.to_pkcs8_der()?,
                })
            }
            Some(SM2_CURVE_OID) => sm2_from_sec1(der),
            Some(other) => Ok(PrivateKeyMaterial::Unsupported(format!(
                "elliptic curve {other}"
            ))),
            None => Err(CaSignerError::DecodingError(
                "EC private key without a named curve".to_string(),
            )),
        }
    }

    /// Family of the key, if it is one this crate supports.
    pub fn algorithm(&self) -> Option<KeyAlgorithm> {
        match self {
            PrivateKeyMaterial::Sm2(_) => Some(KeyAlgorithm::Sm2),
            PrivateKeyMaterial::Ecdsa { curve, .. } => Some(curve.algorithm()),
            PrivateKeyMaterial::Rsa(_) => Some(KeyAlgorithm::Rsa),
            PrivateKeyMaterial::Unsupported(_) => None,
        }
    }

    /// PKCS#8 DER of the key; `None` for unsupported material.
    pub fn pkcs8_der(&self) -> Option<&[u8]> {
        match self {
            PrivateKeyMaterial::Sm2(doc)
            | PrivateKeyMaterial::Ecdsa { pkcs8: doc, .. }
            | PrivateKeyMaterial::Rsa(doc) => Some(doc.as_bytes()),
            PrivateKeyMaterial::Unsupported(_) => None,
        }
    }

    /// Materializes the key for signing.
    pub fn to_key_pair(&self) -> Result<KeyPair> {
        match self {
            PrivateKeyMaterial::Rsa(doc) => {
                let private = RsaPrivateKey::from_pkcs8_der(doc.as_bytes())?;
                Ok(KeyPair::from_rsa(private))
            }
            PrivateKeyMaterial::Ecdsa {
                curve: EcdsaCurve::P256,
                pkcs8,
            } => {
                let signing_key = P256SigningKey::from_pkcs8_der(pkcs8.as_bytes())?;
                Ok(KeyPair::EcdsaP256 {
                    verifying_key: *signing_key.verifying_key(),
                    signing_key,
                })
            }
            PrivateKeyMaterial::Ecdsa {
                curve: EcdsaCurve::P384,
                pkcs8,
            } => {
                let signing_key = P384SigningKey::from_pkcs8_der(pkcs8.as_bytes())?;
                Ok(KeyPair::EcdsaP384 {
                    verifying_key: *signing_key.verifying_key(),
                    signing_key,
                })
            }
            PrivateKeyMaterial::Sm2(doc) => {
                let secret_key = sm2::SecretKey::from_pkcs8_der(doc.as_bytes())?;
                Ok(KeyPair::from_sm2(secret_key))
            }
            PrivateKeyMaterial::Unsupported(what) => Err(CaSignerError::DecodingError(format!(
                "unsupported private key: {what}"
            ))),
        }
    }
}

fn sm2_from_sec1(der: &[u8]) -> Result<PrivateKeyMaterial> {
    let secret = sm2::SecretKey::from_sec1_der(der).map_err(decoding)?;
    Ok(PrivateKeyMaterial::Sm2(secret.to_pkcs8_der()?))
}

fn decoding(err: impl fmt::Display) -> CaSignerError {
    CaSignerError::DecodingError(err.to_string())
}

/// Supported key pairs, held by providers for signing.
#[derive(Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    EcdsaP384 {
        signing_key: P384SigningKey,
        verifying_key: P384VerifyingKey,
    },
    Sm2 {
        secret_key: sm2::SecretKey,
        public_key: sm2::PublicKey,
    },
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)?;
        Ok(Self::from_rsa(private))
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = P256SigningKey::random(&mut rng);
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = P384SigningKey::random(&mut rng);
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP384 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an SM2 key pair.
    pub fn generate_sm2() -> Self {
        let mut rng = rand_core::OsRng;
        Self::from_sm2(sm2::SecretKey::random(&mut rng))
    }

    fn from_rsa(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair::Rsa {
            private: Box::new(private),
            public,
        }
    }

    fn from_sm2(secret_key: sm2::SecretKey) -> Self {
        let public_key = secret_key.public_key();
        KeyPair::Sm2 {
            secret_key,
            public_key,
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            KeyPair::Rsa { .. } => KeyAlgorithm::Rsa,
            KeyPair::EcdsaP256 { .. } => KeyAlgorithm::EcdsaP256,
            KeyPair::EcdsaP384 { .. } => KeyAlgorithm::EcdsaP384,
            KeyPair::Sm2 { .. } => KeyAlgorithm::Sm2,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(*verifying_key),
            KeyPair::EcdsaP384 { verifying_key, .. } => PublicKey::EcdsaP384(*verifying_key),
            KeyPair::Sm2 { public_key, .. } => PublicKey::Sm2(*public_key),
        }
    }

    /// PKCS#8 encoding of the private key.
    pub fn to_pkcs8_der(&self) -> Result<SecretDocument> {
        let doc = match self {
            KeyPair::Rsa { private, .. } => private.to_pkcs8_der()?,
            KeyPair::EcdsaP256 { signing_key, .. } => signing_key.to_pkcs8_der()?,
            KeyPair::EcdsaP384 { signing_key, .. } => signing_key.to_pkcs8_der()?,
            KeyPair::Sm2 { secret_key, .. } => secret_key.to_pkcs8_der()?,
        };
        Ok(doc)
    }

    /// Signs `data` with the scheme matching the key type: RSA PKCS#1 v1.5 with SHA-256,
    /// DER-encoded ECDSA with the curve's digest, or SM2 with SM3.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            KeyPair::Rsa { private, .. } => {
                let signing_key: RsaSigningKey<Sha256> = RsaSigningKey::new(*(private.clone()));
                let signature = signing_key.sign(data);
                Ok(signature.to_vec())
            }
            KeyPair::EcdsaP256 { signing_key, .. } => {
                let signature: p256::ecdsa::Signature = signing_key.sign(data);
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::EcdsaP384 { signing_key, .. } => {
                let signature: p384::ecdsa::Signature = signing_key.sign(data);
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::Sm2 { secret_key, .. } => {
                let signing_key = sm2::dsa::SigningKey::new(SM2_DEFAULT_DIST_ID, secret_key)
                    .map_err(|e| CaSignerError::Provider(format!("SM2 signing key: {e}")))?;
                let signature: sm2::dsa::Signature = signing_key.sign(data);
                Ok(signature.to_bytes().to_vec())
            }
        }
    }
}
