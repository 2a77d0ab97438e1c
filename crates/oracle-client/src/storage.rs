//! Storage capability for payloads too large to inline on-chain.
//!
//! A backend stores raw bytes under keys it chooses. The only thing written
//! on-chain is the key's string form, so a backend must also recognise its
//! own keys among arbitrary decoded text (`is_key`).

use async_trait::async_trait;
use bytes::Bytes;
use oracle_core::Result;

/// Canonical string form of a storage key, as it gets inlined on-chain.
pub trait StorageKey: Clone + Send + Sync {
    fn encode(&self) -> String;
}

impl StorageKey for String {
    fn encode(&self) -> String {
        self.clone()
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    type Key: StorageKey;

    /// Persist `value`, returning the key that retrieves it.
    /// Fails with `BackendUnavailable` when the backend cannot accept writes.
    async fn put(&self, value: Bytes) -> Result<Self::Key>;

    /// Fetch a stored value. `Ok(None)` when the backend holds nothing for
    /// `key`; transport failures are errors.
    async fn get(&self, key: &Self::Key) -> Result<Option<Bytes>>;

    /// Structural test: could `candidate` be one of this backend's keys?
    /// No I/O.
    fn is_key(&self, candidate: &str) -> Option<Self::Key>;

    /// Backend name, for diagnostics.
    fn describe(&self) -> &str;
}
