mod util;

use casigner::error::CaSignerError;
use casigner::key::KeyAlgorithm;
use casigner::keygen::{KeyRequest, generate_key, resolve_key_gen_opts};
use casigner::provider::{KeyGenAlgorithm, ProviderOpts, SoftwareProvider};

fn resolve(algo: &str, size: usize) -> Result<KeyGenAlgorithm, CaSignerError> {
    resolve_key_gen_opts(Some(&KeyRequest::new(algo, size)), false).map(|opts| opts.algorithm)
}

#[test]
fn no_request_defaults_to_ecdsa() {
    let opts = resolve_key_gen_opts(None, true).unwrap();
    assert_eq!(opts.algorithm, KeyGenAlgorithm::Ecdsa);
    assert!(opts.temporary);

    let opts = resolve_key_gen_opts(None, false).unwrap();
    assert!(!opts.temporary);
}

#[test]
fn rsa_sizes() {
    assert_eq!(resolve("rsa", 2048).unwrap(), KeyGenAlgorithm::Rsa2048);
    assert_eq!(resolve("rsa", 3072).unwrap(), KeyGenAlgorithm::Rsa3072);
    assert_eq!(resolve("rsa", 4096).unwrap(), KeyGenAlgorithm::Rsa4096);

    for size in [0, 1024, 2047, 8192] {
        let err = resolve("rsa", size).unwrap_err();
        assert!(
            matches!(err, CaSignerError::UnsupportedKeySize { size: s, .. } if s == size),
            "size {size}: {err}"
        );
    }
}

#[test]
fn ecdsa_sizes() {
    assert_eq!(resolve("ecdsa", 256).unwrap(), KeyGenAlgorithm::EcdsaP256);
    assert_eq!(resolve("ecdsa", 384).unwrap(), KeyGenAlgorithm::EcdsaP384);

    let err = resolve("ecdsa", 521).unwrap_err();
    assert!(matches!(err, CaSignerError::UnsupportedCurve { size: 521 }));
    assert!(err.to_string().contains("521"));

    for size in [0, 128, 512, 2048] {
        let err = resolve("ecdsa", size).unwrap_err();
        assert!(
            matches!(err, CaSignerError::InvalidKeySize { size: s, .. } if s == size),
            "size {size}: {err}"
        );
    }
}

#[test]
fn national_algorithm_ignores_size() {
    assert_eq!(resolve("gmsm2", 0).unwrap(), KeyGenAlgorithm::Sm2);
    assert_eq!(resolve("gmsm2", 4096).unwrap(), KeyGenAlgorithm::Sm2);
    assert_eq!(resolve("sm2", 256).unwrap(), KeyGenAlgorithm::Sm2);
}

#[test]
fn algorithm_names_are_case_insensitive() {
    assert_eq!(resolve("RSA", 2048).unwrap(), KeyGenAlgorithm::Rsa2048);
    assert_eq!(resolve("EcDsA", 256).unwrap(), KeyGenAlgorithm::EcdsaP256);
    assert_eq!(resolve("GMSM2", 0).unwrap(), KeyGenAlgorithm::Sm2);
}

#[test]
fn unknown_algorithm_is_rejected() {
    let err = resolve("ed25519", 256).unwrap_err();
    assert!(matches!(err, CaSignerError::InvalidAlgorithm(ref algo) if algo == "ed25519"));
}

#[test]
fn ephemeral_flag_is_carried() {
    let opts = resolve_key_gen_opts(Some(&KeyRequest::new("ecdsa", 384)), true).unwrap();
    assert!(opts.temporary);
}

#[test]
fn generate_key_wraps_a_signer() {
    util::init_tracing();
    let provider = util::software_provider();

    let (key, signer) = generate_key(Some(&KeyRequest::new("ecdsa", 384)), &provider).unwrap();
    assert_eq!(key.algorithm(), KeyAlgorithm::EcdsaP384);
    assert_eq!(signer.ski(), key.ski());
    assert!(!signer.sign(b"payload").unwrap().is_empty());

    let found = provider.get_key(key.ski()).unwrap();
    assert_eq!(found.public_key(), key.public_key());
}

#[test]
fn generate_key_defaults_to_baseline_curve() {
    let provider = util::software_provider();
    let (key, _) = generate_key(None, &provider).unwrap();
    assert_eq!(key.algorithm(), KeyAlgorithm::EcdsaP256);
}

#[test]
fn generate_sm2_key_needs_national_provider() {
    let dir = tempfile::tempdir().unwrap();
    let request = KeyRequest::new("gmsm2", 0);

    let standard = util::software_provider();
    assert!(generate_key(Some(&request), &standard).is_err());

    let national: casigner::provider::SharedProvider = std::sync::Arc::new(
        SoftwareProvider::new(ProviderOpts::national(dir.path())).unwrap(),
    );
    let (key, signer) = generate_key(Some(&request), &national).unwrap();
    assert_eq!(key.algorithm(), KeyAlgorithm::Sm2);
    assert!(!signer.sign(b"payload").unwrap().is_empty());
}
