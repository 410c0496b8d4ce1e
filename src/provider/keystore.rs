use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::error::{CaSignerError, Result};
use crate::key::{KeyId, KeyPair, PrivateKeyMaterial};

const PRIVATE_KEY_SUFFIX: &str = "_sk";

/// Directory of PKCS#8 PEM private keys, one file per key named `<hex ski>_sk`.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    /// Opens the keystore at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| CaSignerError::io(&dir, e))?;
        Ok(Self { dir })
    }

    fn key_path(&self, ski: &KeyId) -> PathBuf {
        self.dir.join(format!("{}{PRIVATE_KEY_SUFFIX}", ski.to_hex()))
    }

    /// Writes the private key of `pair` under `ski`.
    ///
    /// On Unix the file is created with mode 0600, and an existing file is restricted to
    /// 0600 before any key bytes are written.
    pub fn store(&self, ski: &KeyId, pair: &KeyPair) -> Result<()> {
        let der = pair.to_pkcs8_der()?;
        let pem = pem::Pem::new("PRIVATE KEY", der.as_bytes());
        let encoded = pem::encode_config(&pem, pem::EncodeConfig::new());

        let path = self.key_path(ski);
        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&path).map_err(|e| CaSignerError::io(&path, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| CaSignerError::io(&path, e))?;
        }
        file.write_all(encoded.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| CaSignerError::io(&path, e))?;
        debug!(ski = %ski, path = %path.display(), "stored private key");
        Ok(())
    }

    /// Reads the private key stored under `ski`, if any.
    pub fn load(&self, ski: &KeyId) -> Result<Option<KeyPair>> {
        let path = self.key_path(ski);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CaSignerError::io(&path, e)),
        };
        let pair = PrivateKeyMaterial::from_pem(&data)?.to_key_pair()?;
        Ok(Some(pair))
    }

    /// Identifiers of all stored private keys.
    #[cfg(test)]
    fn list(&self) -> Result<Vec<KeyId>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| CaSignerError::io(&self.dir, e))?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CaSignerError::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(hex_ski) = name
                .to_str()
                .and_then(|name| name.strip_suffix(PRIVATE_KEY_SUFFIX))
            else {
                continue;
            };
            if let Ok(ski) = KeyId::from_hex(hex_ski) {
                ids.push(ski);
            }
        }
        ids.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::open(dir.path().join("keystore")).unwrap();

        let pair = KeyPair::generate_ecdsa_p256();
        let ski = pair.public_key().ski().unwrap();
        store.store(&ski, &pair).unwrap();

        let loaded = store.load(&ski).unwrap().expect("key should be stored");
        assert_eq!(loaded.public_key(), pair.public_key());
        assert_eq!(store.list().unwrap(), vec![ski]);
    }

    #[test]
    fn test_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::open(dir.path()).unwrap();

        let ski = KeyId::new(vec![0xab; 32]);
        assert!(store.load(&ski).unwrap().is_none());
    }

    #[test]
    fn test_list_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("README"), "not a key").unwrap();
        fs::write(dir.path().join("zz_sk"), "not hex").unwrap();

        assert!(store.list().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::open(dir.path()).unwrap();
        let pair = KeyPair::generate_ecdsa_p256();
        let ski = pair.public_key().ski().unwrap();

        store.store(&ski, &pair).unwrap();
        let mode = fs::metadata(store.key_path(&ski)).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_key_file_is_restricted() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::open(dir.path()).unwrap();
        let pair = KeyPair::generate_ecdsa_p256();
        let ski = pair.public_key().ski().unwrap();
        let path = store.key_path(&ski);
        fs::write(&path, "stale").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        store.store(&ski, &pair).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o600);
        assert_eq!(store.load(&ski).unwrap().unwrap().public_key(), pair.public_key());
    }
}
