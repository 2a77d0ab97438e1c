//! Storage router — inline small payloads, overflow large ones.
//!
//! Encode:
//!   no storage                              → contract bytes of the text
//!   len(utf8) > bytes_limit                 → put, contract bytes of the key
//!   text the backend would take for a key   → put, contract bytes of the key
//!   otherwise                               → contract bytes of the text
//!
//! Decode:
//!   no storage           → decoded text
//!   text is not a key    → decoded text
//!   key, value stored    → stored value
//!   key, nothing stored  → None
//!
//! The limit compares against the UTF-8 length of the text itself, never the
//! hex-expanded contract bytes. Inline text is never something `is_key`
//! accepts, so whatever this router writes decodes back to the same text.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use oracle_core::codec::{decode_bytes, encode_bytes};
use oracle_core::{ContractBytes, OracleError, Result};
use tracing::debug;

use crate::memory_storage::MemoryStorage;
use crate::storage::{Storage, StorageKey};

pub struct StorageRouter<S: Storage = MemoryStorage> {
    bytes_limit: usize,
    storage: Option<Arc<S>>,
}

impl<S: Storage> Clone for StorageRouter<S> {
    fn clone(&self) -> Self {
        Self {
            bytes_limit: self.bytes_limit,
            storage: self.storage.clone(),
        }
    }
}

impl<S: Storage> fmt::Debug for StorageRouter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageRouter")
            .field("bytes_limit", &self.bytes_limit)
            .field("storage", &self.storage.as_ref().map(|s| s.describe()))
            .finish()
    }
}

impl<S: Storage> StorageRouter<S> {
    pub fn new(bytes_limit: usize, storage: Arc<S>) -> Self {
        Self {
            bytes_limit,
            storage: Some(storage),
        }
    }

    /// Router that never overflows.
    pub fn inline_only() -> Self {
        Self {
            bytes_limit: 0,
            storage: None,
        }
    }

    pub async fn to_contract_bytes(&self, text: &str) -> Result<ContractBytes> {
        let Some(storage) = &self.storage else {
            return Ok(encode_bytes(text));
        };
        let oversized = text.len() > self.bytes_limit;
        if !oversized && storage.is_key(text).is_none() {
            return Ok(encode_bytes(text));
        }

        let key = storage
            .put(Bytes::copy_from_slice(text.as_bytes()))
            .await?
            .encode();
        debug!(
            backend = storage.describe(),
            len = text.len(),
            limit = self.bytes_limit,
            oversized,
            key = %key,
            "payload overflowed to storage"
        );
        Ok(encode_bytes(&key))
    }

    pub async fn from_contract_bytes(&self, bytes: &ContractBytes) -> Result<Option<String>> {
        let text = decode_bytes(bytes)?;
        let Some(storage) = &self.storage else {
            return Ok(Some(text));
        };
        let Some(key) = storage.is_key(&text) else {
            return Ok(Some(text));
        };

        match storage.get(&key).await? {
            Some(value) => {
                let value = String::from_utf8(value.to_vec()).map_err(|e| {
                    OracleError::MalformedPayload(format!("stored value is not UTF-8: {e}"))
                })?;
                Ok(Some(value))
            }
            None => {
                debug!(backend = storage.describe(), key = %text, "storage key resolved to nothing");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use oracle_core::codec::encode_bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Treats every string as a key. Values live in an inner MemoryStorage.
    #[derive(Default)]
    struct PermissiveStorage {
        inner: MemoryStorage,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl Storage for PermissiveStorage {
        type Key = String;

        async fn put(&self, value: Bytes) -> Result<String> {
            self.inner.put(value).await
        }

        async fn get(&self, key: &String) -> Result<Option<Bytes>> {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            self.inner.get(key).await
        }

        fn is_key(&self, candidate: &str) -> Option<String> {
            Some(candidate.to_string())
        }

        fn describe(&self) -> &str {
            "Permissive"
        }
    }

    /// Rejects every write.
    struct ReadOnlyStorage;

    #[async_trait]
    impl Storage for ReadOnlyStorage {
        type Key = String;

        async fn put(&self, _value: Bytes) -> Result<String> {
            Err(OracleError::unavailable("ReadOnly", "no credential loaded"))
        }

        async fn get(&self, _key: &String) -> Result<Option<Bytes>> {
            Ok(None)
        }

        fn is_key(&self, _candidate: &str) -> Option<String> {
            None
        }

        fn describe(&self) -> &str {
            "ReadOnly"
        }
    }

    fn memory_router(limit: usize) -> (StorageRouter, MemoryStorage) {
        let storage = MemoryStorage::new();
        (StorageRouter::new(limit, Arc::new(storage.clone())), storage)
    }

    #[tokio::test]
    async fn inline_only_never_touches_storage() {
        let router: StorageRouter = StorageRouter::inline_only();
        let long = "x".repeat(5000);
        let bytes = router.to_contract_bytes(&long).await.unwrap();
        assert_eq!(bytes, encode_bytes(&long));
        assert_eq!(router.from_contract_bytes(&bytes).await.unwrap(), Some(long));
    }

    #[tokio::test]
    async fn exact_limit_inlines() {
        let (router, storage) = memory_router(8);
        let text = "12345678";
        let bytes = router.to_contract_bytes(text).await.unwrap();
        assert_eq!(bytes, encode_bytes(text));
        assert_eq!(storage.put_count(), 0);
        assert_eq!(
            router.from_contract_bytes(&bytes).await.unwrap().as_deref(),
            Some(text)
        );
    }

    #[tokio::test]
    async fn one_past_limit_overflows() {
        let (router, storage) = memory_router(8);
        let text = "123456789";
        let bytes = router.to_contract_bytes(text).await.unwrap();
        assert_eq!(storage.put_count(), 1);
        assert_ne!(bytes, encode_bytes(text));
        assert_eq!(
            router.from_contract_bytes(&bytes).await.unwrap().as_deref(),
            Some(text)
        );
        assert_eq!(storage.get_count(), 1);
    }

    #[tokio::test]
    async fn limit_counts_utf8_bytes() {
        // 4 characters, 8 bytes.
        let (router, storage) = memory_router(6);
        router.to_contract_bytes("éééé").await.unwrap();
        assert_eq!(storage.put_count(), 1);
    }

    #[tokio::test]
    async fn empty_string_inlines() {
        let (router, storage) = memory_router(0);
        let bytes = router.to_contract_bytes("").await.unwrap();
        assert_eq!(bytes.as_str(), "0x");
        assert_eq!(storage.put_count(), 0);
        assert_eq!(router.from_contract_bytes(&bytes).await.unwrap().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn key_string_is_what_goes_on_chain() {
        let (router, storage) = memory_router(4);
        let bytes = router.to_contract_bytes("overflowing").await.unwrap();
        let key = decode_bytes(&bytes).unwrap();
        assert_eq!(storage.is_key(&key), Some(key.clone()));
    }

    #[tokio::test]
    async fn missing_value_is_none() {
        let storage = Arc::new(PermissiveStorage::default());
        let router = StorageRouter::new(4, storage.clone());
        let never_stored = encode_bytes(&"ab".repeat(32));
        assert_eq!(router.from_contract_bytes(&never_stored).await.unwrap(), None);
        assert_eq!(storage.lookups.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn removed_value_is_none() {
        let (router, storage) = memory_router(4);
        let bytes = router.to_contract_bytes("will expire").await.unwrap();
        let key = decode_bytes(&bytes).unwrap();
        storage.remove(&key);
        assert_eq!(router.from_contract_bytes(&bytes).await.unwrap(), None);
    }

    #[tokio::test]
    async fn strict_backend_keeps_hex_literals() {
        let (router, storage) = memory_router(1024);
        // A sha256 digest has the key shape but was never issued.
        let digest = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        let bytes = router.to_contract_bytes(digest).await.unwrap();
        assert_eq!(bytes, encode_bytes(digest));
        assert_eq!(
            router.from_contract_bytes(&bytes).await.unwrap().as_deref(),
            Some(digest)
        );
        assert_eq!(storage.put_count(), 0);
        assert_eq!(storage.get_count(), 0);
    }

    #[tokio::test]
    async fn literal_key_text_overflows() {
        let (router, storage) = memory_router(1024);
        let issued = decode_bytes(&router.to_contract_bytes(&"z".repeat(2000)).await.unwrap())
            .unwrap();

        // Short enough to inline, but it would decode as the stored value.
        let bytes = router.to_contract_bytes(&issued).await.unwrap();
        assert_ne!(bytes, encode_bytes(&issued));
        assert_eq!(storage.put_count(), 2);
        assert_eq!(
            router.from_contract_bytes(&bytes).await.unwrap().as_deref(),
            Some(issued.as_str())
        );
    }

    #[tokio::test]
    async fn permissive_backend_looks_up_everything() {
        let storage = Arc::new(PermissiveStorage::default());
        let router = StorageRouter::new(1024, storage.clone());

        // Written inline by someone else: looked up, nothing there.
        let foreign = encode_bytes("plain words");
        assert_eq!(router.from_contract_bytes(&foreign).await.unwrap(), None);
        assert_eq!(storage.lookups.load(Ordering::Relaxed), 1);

        // Written by this router: every payload is a key candidate, so it overflows.
        let bytes = router.to_contract_bytes("plain words").await.unwrap();
        assert_eq!(storage.inner.put_count(), 1);
        assert_eq!(
            router.from_contract_bytes(&bytes).await.unwrap().as_deref(),
            Some("plain words")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_round_trips_share_storage() {
        let (router, storage) = memory_router(16);
        let payloads: Vec<String> = (0..64)
            .map(|i| {
                if i % 2 == 0 {
                    format!("short {i}")
                } else {
                    format!("overflowing payload number {i}")
                }
            })
            .collect();
        let overflowing = payloads.iter().filter(|p| p.len() > 16).count();

        let mut tasks = Vec::new();
        for payload in payloads.clone() {
            let router = router.clone();
            tasks.push(tokio::spawn(async move {
                let bytes = router.to_contract_bytes(&payload).await.unwrap();
                tokio::task::yield_now().await;
                let back = router.from_contract_bytes(&bytes).await.unwrap();
                (payload, back)
            }));
        }
        for task in tasks {
            let (payload, back) = task.await.unwrap();
            assert_eq!(back, Some(payload));
        }
        assert_eq!(overflowing, 32);
        assert_eq!(storage.put_count(), overflowing);
        assert_eq!(storage.get_count(), overflowing);
        assert_eq!(storage.len(), overflowing);
    }

    #[tokio::test]
    async fn put_failure_propagates() {
        let router = StorageRouter::new(2, Arc::new(ReadOnlyStorage));
        let err = router.to_contract_bytes("too long").await.unwrap_err();
        assert!(matches!(err, OracleError::BackendUnavailable { .. }));
        // Small payloads are unaffected.
        assert!(router.to_contract_bytes("ok").await.is_ok());
    }

    #[tokio::test]
    async fn malformed_bytes_fail() {
        let (router, _) = memory_router(4);
        let err = router
            .from_contract_bytes(&ContractBytes::new("0x123"))
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn threshold_ten_scenario() {
        let (router, storage) = memory_router(10);

        let short = router.to_contract_bytes("short").await.unwrap();
        assert_eq!(
            router.from_contract_bytes(&short).await.unwrap().as_deref(),
            Some("short")
        );
        assert_eq!(storage.put_count(), 0);
        assert_eq!(storage.get_count(), 0);

        let long = "x".repeat(50);
        let bytes = router.to_contract_bytes(&long).await.unwrap();
        assert_eq!(storage.put_count(), 1);
        assert_eq!(router.from_contract_bytes(&bytes).await.unwrap(), Some(long));
        assert_eq!(storage.get_count(), 1);
    }
}
