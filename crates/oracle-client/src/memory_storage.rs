//! In-memory storage backend with random 256-bit hex keys.
//!
//! Used by tests and local development. Cloning shares the underlying map.
//!
//! `is_key` only accepts keys this store handed out, so literal text that
//! happens to look like a key is never mistaken for one. Removing a value
//! keeps its key issued: it then resolves to nothing, like an expired upload.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use oracle_core::Result;
use rand::RngCore;

use crate::storage::Storage;

/// Key length in hex characters (32 random bytes).
pub const KEY_HEX_LEN: usize = 64;

#[derive(Clone, Default)]
pub struct MemoryStorage {
    /// hex key → value
    values: Arc<DashMap<String, Bytes>>,
    /// every key returned by `put`
    issued: Arc<DashSet<String>>,
    puts: Arc<AtomicUsize>,
    gets: Arc<AtomicUsize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop a stored value, as an expiring backend would.
    pub fn remove(&self, key: &str) -> Option<Bytes> {
        self.values.remove(key).map(|(_, v)| v)
    }

    /// Number of `put` calls so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::Relaxed)
    }

    /// Number of `get` calls so far.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    type Key = String;

    async fn put(&self, value: Bytes) -> Result<String> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let key = hex::encode(raw);
        self.issued.insert(key.clone());
        self.values.insert(key.clone(), value);
        Ok(key)
    }

    async fn get(&self, key: &String) -> Result<Option<Bytes>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self.values.get(key).map(|v| v.clone()))
    }

    /// A key previously returned by `put`, whether or not its value remains.
    fn is_key(&self, candidate: &str) -> Option<String> {
        let well_formed = candidate.len() == KEY_HEX_LEN
            && candidate
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        (well_formed && self.issued.contains(candidate)).then(|| candidate.to_string())
    }

    fn describe(&self) -> &str {
        "Memory"
    }
}
