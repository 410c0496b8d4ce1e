#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use casigner::cert::Certificate;
use casigner::error::Result;
use casigner::key::{KeyPair, SM2_CURVE_OID};
use casigner::provider::{
    ProviderFactory, ProviderOpts, SharedProvider, SoftwareProvider, SoftwareProviderFactory,
};
use casigner::signer::SignatureAlgorithm;
use der::Encode;
use der::asn1::{BitString, UtcTime};
use x509_cert::Version;
use x509_cert::certificate::{CertificateInner, TbsCertificateInner};
use x509_cert::name::RdnSequence;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::time::{Time, Validity};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn software_provider() -> SharedProvider {
    Arc::new(SoftwareProvider::in_memory())
}

/// Self-signed certificate for `key` with the given common name.
pub fn self_signed_cert(key: &KeyPair, common_name: &str) -> Certificate {
    let spki = key.public_key().to_spki().unwrap();
    sign_cert(key, common_name, spki)
}

/// Self-signed SM2 certificate whose public key algorithm is the SM2 curve OID itself.
pub fn alternate_sm2_cert(key: &KeyPair, common_name: &str) -> Certificate {
    let mut spki = key.public_key().to_spki().unwrap();
    spki.algorithm = AlgorithmIdentifierOwned {
        oid: SM2_CURVE_OID,
        parameters: None,
    };
    sign_cert(key, common_name, spki)
}

fn sign_cert(key: &KeyPair, common_name: &str, spki: SubjectPublicKeyInfoOwned) -> Certificate {
    let name = RdnSequence::from_str(&format!("CN={common_name}")).unwrap();
    let signature_algorithm: AlgorithmIdentifierOwned =
        SignatureAlgorithm::default_for(key.algorithm()).into();

    let now = SystemTime::now();
    let validity = Validity {
        not_before: Time::UtcTime(UtcTime::from_system_time(now).unwrap()),
        not_after: Time::UtcTime(
            UtcTime::from_system_time(now + Duration::from_secs(365 * 24 * 60 * 60)).unwrap(),
        ),
    };

    let tbs_certificate = TbsCertificateInner {
        version: Version::V3,
        serial_number: SerialNumber::new(&[1]).unwrap(),
        signature: signature_algorithm.clone(),
        issuer: name.clone(),
        validity,
        subject: name,
        subject_public_key_info: spki,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: None,
    };
    let signature = key.sign_data(&tbs_certificate.to_der().unwrap()).unwrap();

    Certificate {
        inner: CertificateInner {
            tbs_certificate,
            signature_algorithm,
            signature: BitString::from_bytes(&signature).unwrap(),
        },
    }
}

pub fn write_pem(dir: &Path, name: &str, blocks: &[(&str, Vec<u8>)]) -> PathBuf {
    let pems: Vec<pem::Pem> = blocks
        .iter()
        .map(|(label, der)| pem::Pem::new(*label, der.clone()))
        .collect();
    let path = dir.join(name);
    fs::write(&path, pem::encode_many(&pems)).unwrap();
    path
}

/// Writes `key` as a PKCS#8 `PRIVATE KEY` file.
pub fn write_key(dir: &Path, name: &str, key: &KeyPair) -> PathBuf {
    let der = key.to_pkcs8_der().unwrap();
    write_pem(dir, name, &[("PRIVATE KEY", der.as_bytes().to_vec())])
}

/// Writes the certificates as one PEM chain, in order.
pub fn write_certs(dir: &Path, name: &str, certs: &[&Certificate]) -> PathBuf {
    let blocks: Vec<(&str, Vec<u8>)> = certs
        .iter()
        .map(|cert| ("CERTIFICATE", cert.to_der().unwrap()))
        .collect();
    write_pem(dir, name, &blocks)
}

/// Factory that builds software providers and remembers what it built.
#[derive(Default)]
pub struct RecordingFactory {
    created: Mutex<Vec<(ProviderOpts, SharedProvider)>>,
}

impl RecordingFactory {
    pub fn created(&self) -> Vec<(ProviderOpts, SharedProvider)> {
        self.created.lock().unwrap().clone()
    }
}

impl ProviderFactory for RecordingFactory {
    fn create(&self, opts: &ProviderOpts) -> Result<SharedProvider> {
        let provider = SoftwareProviderFactory.create(opts)?;
        self.created
            .lock()
            .unwrap()
            .push((opts.clone(), provider.clone()));
        Ok(provider)
    }
}
