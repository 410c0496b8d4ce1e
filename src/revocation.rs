//! Revocation authority capability interface.
//!
//! The anonymous credential subsystem publishes revocation information signed by a
//! revocation authority. This crate only defines the interface and a configurable
//! [`MockRevocationAuthority`] that tests substitute for a real authority.

use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{CaSignerError, Result};
use crate::key::PublicKey;

/// Revocation information for one epoch.
///
/// # Fields
/// * `epoch` - Epoch the information is valid for.
/// * `epoch_public_key` - Serialized epoch public key.
/// * `epoch_signature` - Authority's signature over the epoch public key.
/// * `revoked_handles` - Revocation handles revoked as of this epoch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialRevocationInformation {
    pub epoch: i64,
    pub epoch_public_key: Vec<u8>,
    pub epoch_signature: Vec<u8>,
    pub revoked_handles: Vec<RevocationHandle>,
}

/// Revocation handle embedded in an issued credential, a big-endian unsigned integer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RevocationHandle(Vec<u8>);

impl RevocationHandle {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_u64(value: u64) -> Self {
        Self(value.to_be_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Authority that allocates revocation handles and publishes revocation information.
pub trait RevocationAuthority: Send + Sync {
    /// Creates signed revocation information for the current epoch.
    fn create_revocation_info(&self) -> Result<CredentialRevocationInformation>;

    /// Current revocation epoch.
    fn epoch(&self) -> Result<i64>;

    /// Allocates a fresh revocation handle for a credential about to be issued.
    fn new_revocation_handle(&self) -> Result<RevocationHandle>;

    /// Key that verifies the authority's signatures.
    fn public_key(&self) -> PublicKey;
}

/// Calls recorded by [`MockRevocationAuthority`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevocationCall {
    CreateRevocationInfo,
    Epoch,
    NewRevocationHandle,
    PublicKey,
}

/// Revocation authority returning preset results and recording every call.
///
/// Handles are allocated from a counter starting at 1 unless a handle error is set.
#[derive(Debug)]
pub struct MockRevocationAuthority {
    public_key: PublicKey,
    revocation_info: Result<CredentialRevocationInformation>,
    epoch: Result<i64>,
    handle_error: Option<CaSignerError>,
    next_handle: AtomicU64,
    calls: Mutex<Vec<RevocationCall>>,
}

impl MockRevocationAuthority {
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            revocation_info: Ok(CredentialRevocationInformation::default()),
            epoch: Ok(0),
            handle_error: None,
            next_handle: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_revocation_info(mut self, info: Result<CredentialRevocationInformation>) -> Self {
        self.revocation_info = info;
        self
    }

    pub fn with_epoch(mut self, epoch: Result<i64>) -> Self {
        self.epoch = epoch;
        self
    }

    /// Makes every handle allocation fail with `error`.
    pub fn with_handle_error(mut self, error: CaSignerError) -> Self {
        self.handle_error = Some(error);
        self
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<RevocationCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: RevocationCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl RevocationAuthority for MockRevocationAuthority {
    fn create_revocation_info(&self) -> Result<CredentialRevocationInformation> {
        self.record(RevocationCall::CreateRevocationInfo);
        self.revocation_info.clone()
    }

    fn epoch(&self) -> Result<i64> {
        self.record(RevocationCall::Epoch);
        self.epoch.clone()
    }

    fn new_revocation_handle(&self) -> Result<RevocationHandle> {
        self.record(RevocationCall::NewRevocationHandle);
        if let Some(error) = &self.handle_error {
            return Err(error.clone());
        }
        let value = self.next_handle.fetch_add(1, Ordering::SeqCst);
        Ok(RevocationHandle::from_u64(value))
    }

    fn public_key(&self) -> PublicKey {
        self.record(RevocationCall::PublicKey);
        self.public_key.clone()
    }
}
