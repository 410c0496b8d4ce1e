use std::path::Path;

use der::{Decode, Encode, EncodePem};
use tracing::debug;
use x509_cert::certificate::CertificateInner;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{CaSignerError, Result};
use crate::key::{KeyId, PublicKey, normalize_spki};

/// PEM label of certificate blocks.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Represents an X.509 certificate.
///
/// This struct provides methods to decode, normalize and re-encode the certificate.
#[derive(Debug, Clone)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Decodes a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)
            .map_err(|e| CaSignerError::Certificate(format!("failed to parse certificate: {e}")))?;
        Ok(Self { inner })
    }

    /// Encodes the certificate into DER format.
    ///
    /// # Returns
    /// A byte vector containing the DER-encoded certificate.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CaSignerError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    ///
    /// # Returns
    /// A string containing the PEM-encoded certificate.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| CaSignerError::EncodingError(e.to_string()))
    }

    /// Brings the alternate national-suite encoding into the standard form.
    ///
    /// Certificates issued for SM2 keys sometimes name the curve OID as the public key
    /// algorithm; after normalization they carry `id-ecPublicKey` with the curve as
    /// parameter, like any other EC certificate. Standard certificates pass unchanged.
    pub fn normalize(mut self) -> Result<Self> {
        let spki = self.inner.tbs_certificate.subject_public_key_info;
        self.inner.tbs_certificate.subject_public_key_info = normalize_spki(spki)?;
        Ok(self)
    }

    pub fn subject_public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.tbs_certificate.subject_public_key_info
    }

    /// Decodes the subject public key.
    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_spki(self.subject_public_key_info())
    }

    /// Subject key identifier of the certified public key.
    pub fn ski(&self) -> KeyId {
        KeyId::from_spki(self.subject_public_key_info())
    }

    /// Common name of the subject, if it has one.
    pub fn common_name(&self) -> Option<String> {
        for rdn in self.inner.tbs_certificate.subject.0.iter() {
            for attr in rdn.0.iter() {
                if attr.oid.to_string() == "2.5.4.3" {
                    if let Ok(s) = attr.value.decode_as::<String>() {
                        return Some(s);
                    }
                }
            }
        }
        None
    }
}

/// Reads a certificate file and returns its first certificate in standard form.
///
/// PEM files are searched for the first `CERTIFICATE` block; files without any PEM data
/// are read as DER.
pub fn read_certificate_file(path: &Path) -> Result<Certificate> {
    debug!(path = %path.display(), "reading certificate file");
    let data = std::fs::read(path).map_err(|e| CaSignerError::io(path, e))?;

    let chain = match decode_certificate_chain(path, &data) {
        Ok(chain) => chain,
        Err(CaSignerError::NoPemData { .. }) => vec![data],
        Err(e) => return Err(e),
    };

    Certificate::from_der(&chain[0])?.normalize()
}

/// Splits PEM input into DER certificates, in file order.
///
/// Blocks that are not certificates are skipped; when no certificate remains the error
/// says what was found instead, with a dedicated diagnostic for a lone private key,
/// which almost always means certificate and key paths were swapped.
pub fn decode_certificate_chain(path: &Path, data: &[u8]) -> Result<Vec<Vec<u8>>> {
    let blocks = parse_pem_blocks(data);

    let mut chain = Vec::new();
    let mut skipped = Vec::new();
    for block in blocks {
        if block.tag() == CERTIFICATE_LABEL {
            chain.push(block.into_contents());
        } else {
            skipped.push(block.tag().to_string());
        }
    }

    if chain.is_empty() {
        if skipped.is_empty() {
            return Err(CaSignerError::NoPemData {
                path: path.to_path_buf(),
            });
        }
        if skipped.len() == 1 && skipped[0].ends_with("PRIVATE KEY") {
            return Err(CaSignerError::CertKeySwapped {
                path: path.to_path_buf(),
            });
        }
        return Err(CaSignerError::NoCertificateBlock {
            path: path.to_path_buf(),
            skipped,
        });
    }

    Ok(chain)
}

const PEM_BEGIN: &[u8] = b"-----BEGIN ";
const PEM_END: &[u8] = b"-----END ";
const PEM_DASHES: &[u8] = b"-----";

/// Decodes the PEM blocks of `data` in file order.
///
/// A block that fails to decode is skipped and scanning resumes after it, so one garbled
/// block does not hide the valid blocks around it. Text outside blocks is ignored.
pub fn parse_pem_blocks(data: &[u8]) -> Vec<pem::Pem> {
    let mut blocks = Vec::new();
    let mut rest = data;
    while let Some(start) = find(rest, PEM_BEGIN) {
        let block = &rest[start..];
        let Some(end) = find(block, PEM_END) else {
            break;
        };
        let trailer = &block[end + PEM_END.len()..];
        let trailer_len =
            find(trailer, PEM_DASHES).map_or(trailer.len(), |i| i + PEM_DASHES.len());
        let mut len = end + PEM_END.len() + trailer_len;
        len += block[len..]
            .iter()
            .take_while(|b| matches!(**b, b'\r' | b'\n'))
            .count();

        match pem::parse(&block[..len]) {
            Ok(parsed) => blocks.push(parsed),
            Err(e) => debug!(error = %e, "skipping malformed PEM block"),
        }
        rest = &block[len..];
    }
    blocks
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
