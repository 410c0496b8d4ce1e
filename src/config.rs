//! Crypto provider configuration.
//!
//! ```toml
//! national_keystore = "msp/keystore"
//!
//! [provider]
//! family = "SW"
//! hash_family = "SHA2"
//! security_level = 256
//! keystore = "msp/keystore"
//!
//! [signing]
//! expiry_days = 365
//! usages = ["cert sign", "crl sign"]
//! is_ca = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::{CaSignerError, Result};
use crate::provider::{ProviderFactory, ProviderOpts, SharedProvider};
use crate::signer::SigningPolicy;

/// Default location of the national cipher suite keystore.
pub const DEFAULT_NATIONAL_KEYSTORE: &str = "/etc/casigner/msp/keystore";

/// Provider and signing configuration of a CA.
///
/// # Fields
/// * `provider` - Options of the default crypto provider.
/// * `national_keystore` - Keystore of the provider SM2 keys are imported into.
/// * `signing` - Policy CA signers are bound to.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CspConfig {
    pub provider: ProviderOpts,
    pub national_keystore: PathBuf,
    pub signing: SigningPolicy,
}

impl Default for CspConfig {
    fn default() -> Self {
        Self {
            provider: ProviderOpts::default(),
            national_keystore: PathBuf::from(DEFAULT_NATIONAL_KEYSTORE),
            signing: SigningPolicy::default(),
        }
    }
}

impl CspConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Reads a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let input = fs::read_to_string(path).map_err(|e| CaSignerError::io(path, e))?;
        Self::from_toml_str(&input).map_err(|e| {
            CaSignerError::Config(format!("Failed to load '{}': {e}", path.display()))
        })
    }

    /// Resolves relative keystore paths against `home`.
    pub fn make_paths_absolute(&mut self, home: &Path) {
        self.provider.make_paths_absolute(home);
        if self.national_keystore.is_relative() {
            self.national_keystore = home.join(&self.national_keystore);
        }
    }
}

/// Builds the default crypto provider of `config`, with keystore paths resolved against
/// `home`.
pub fn init_provider(
    config: &mut CspConfig,
    factory: &dyn ProviderFactory,
    home: &Path,
) -> Result<SharedProvider> {
    config.make_paths_absolute(home);
    info!(
        family = %config.provider.family,
        keystore = ?config.provider.keystore,
        "initializing crypto provider"
    );
    factory.create(&config.provider).map_err(|e| {
        CaSignerError::Provider(format!("Failed to get crypto provider with opts: {e}"))
    })
}
