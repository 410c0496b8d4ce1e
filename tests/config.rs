mod util;

use std::path::{Path, PathBuf};

use casigner::config::{CspConfig, DEFAULT_NATIONAL_KEYSTORE, init_provider};
use casigner::error::CaSignerError;
use casigner::provider::{CipherFamily, SoftwareProviderFactory};
use casigner::signer::SigningPolicy;

#[test]
fn empty_config_uses_defaults() {
    let config = CspConfig::from_toml_str("").unwrap();
    assert_eq!(config, CspConfig::default());
    assert_eq!(config.provider.family, CipherFamily::Standard);
    assert_eq!(config.provider.hash_family, "SHA2");
    assert_eq!(config.provider.security_level, 256);
    assert_eq!(config.national_keystore, PathBuf::from(DEFAULT_NATIONAL_KEYSTORE));
    assert_eq!(config.signing, SigningPolicy::default());
}

#[test]
fn full_config_is_parsed() {
    let config = CspConfig::from_toml_str(
        r#"
        national_keystore = "gm/keystore"

        [provider]
        family = "GM"
        hash_family = "GMSM3"
        security_level = 256
        keystore = "msp/keystore"

        [signing]
        expiry_days = 3650
        usages = ["cert sign", "crl sign"]
        is_ca = true
        max_path_length = 1
        "#,
    )
    .unwrap();

    assert_eq!(config.provider.family, CipherFamily::National);
    assert_eq!(config.provider.keystore, Some(PathBuf::from("msp/keystore")));
    assert_eq!(config.national_keystore, PathBuf::from("gm/keystore"));
    assert_eq!(config.signing.expiry_days, 3650);
    assert_eq!(config.signing.usages, vec!["cert sign", "crl sign"]);
    assert!(config.signing.is_ca);
    assert_eq!(config.signing.max_path_length, Some(1));
}

#[test]
fn unknown_family_is_rejected() {
    let err = CspConfig::from_toml_str("[provider]\nfamily = \"PKCS11\"\n").unwrap_err();
    assert!(matches!(err, CaSignerError::Config(_)));
}

#[test]
fn relative_paths_are_resolved_against_home() {
    let mut config = CspConfig::from_toml_str(
        r#"
        national_keystore = "gm/keystore"
        [provider]
        keystore = "msp/keystore"
        "#,
    )
    .unwrap();
    config.make_paths_absolute(Path::new("/srv/ca"));

    assert_eq!(
        config.provider.keystore.as_deref(),
        Some(Path::new("/srv/ca/msp/keystore"))
    );
    assert_eq!(config.national_keystore, PathBuf::from("/srv/ca/gm/keystore"));

    let mut absolute = CspConfig::default();
    absolute.make_paths_absolute(Path::new("/srv/ca"));
    assert_eq!(
        absolute.national_keystore,
        PathBuf::from(DEFAULT_NATIONAL_KEYSTORE)
    );
}

#[test]
fn config_file_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("casigner.toml");
    std::fs::write(&path, "[signing]\nexpiry_days = 90\n").unwrap();

    let config = CspConfig::from_file(&path).unwrap();
    assert_eq!(config.signing.expiry_days, 90);

    let err = CspConfig::from_file(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, CaSignerError::Io { .. }));
}

#[test]
fn provider_is_initialized_with_home_relative_keystore() {
    util::init_tracing();
    let home = tempfile::tempdir().unwrap();
    let mut config =
        CspConfig::from_toml_str("[provider]\nkeystore = \"msp/keystore\"\n").unwrap();

    let provider = init_provider(&mut config, &SoftwareProviderFactory, home.path()).unwrap();
    assert_eq!(provider.name(), "SW-256");
    assert!(home.path().join("msp/keystore").is_dir());
}

#[test]
fn invalid_provider_options_are_rejected() {
    let home = tempfile::tempdir().unwrap();
    let mut config = CspConfig::from_toml_str(
        "[provider]\nfamily = \"SW\"\nhash_family = \"GMSM3\"\n",
    )
    .unwrap();

    let err = init_provider(&mut config, &SoftwareProviderFactory, home.path()).unwrap_err();
    assert!(matches!(err, CaSignerError::Provider(_)), "{err}");
}
