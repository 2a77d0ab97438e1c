//! Oracle integration test harness.
//!
//! Every scenario runs a full `Oracle` against the in-memory coordinator and
//! storage backend, so no chain or gateway is needed:
//!
//!   cargo test --test integration
//!
//! The simulated responder and validator are driven from the test through the
//! `MemoryChain` control methods.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use oracle_client::{MemoryChain, MemoryStorage, Oracle, RequestOptions, StorageRouter};
use oracle_core::codec::encode_bytes;
use oracle_core::{Address, RequestModels, TaskId};

mod lifecycle;
mod request;
mod storage;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const RESPONDER: Address = Address([0x11; 20]);
pub const VALIDATOR: Address = Address([0x22; 20]);

pub struct Harness {
    pub chain: MemoryChain,
    pub storage: MemoryStorage,
    pub oracle: Oracle,
}

impl Harness {
    /// Initialized oracle whose router overflows past `bytes_limit`.
    pub async fn new(bytes_limit: usize) -> Result<Self> {
        let chain = MemoryChain::default();
        let storage = MemoryStorage::new();
        let router = StorageRouter::new(bytes_limit, Arc::new(storage.clone()));
        let mut oracle = Oracle::new(Arc::new(chain.clone()), router);
        oracle
            .init(chain.coordinator_address())
            .await
            .context("init against in-memory coordinator")?;
        Ok(Self {
            chain,
            storage,
            oracle,
        })
    }

    /// Submit a text request with default options and return its task id.
    pub async fn submit(&self, input: &str) -> Result<TaskId> {
        let new = self
            .oracle
            .request(input, &RequestModels::Any, &RequestOptions::default())
            .await?;
        Ok(self.oracle.wait_request(new.tx_hash).await?)
    }

    /// Play responder: store `output` the way a responder would and advance.
    pub async fn respond(&self, task_id: TaskId, output: &str) -> Result<()> {
        let bytes = self.oracle.router().to_contract_bytes(output).await?;
        self.chain
            .respond(task_id, RESPONDER, bytes, encode_bytes(""))?;
        self.chain.advance(task_id)?;
        Ok(())
    }

    /// Play validator: attach score metadata and complete the task.
    pub async fn validate(&self, task_id: TaskId, score: u128, metadata: &str) -> Result<()> {
        let bytes = self.oracle.router().to_contract_bytes(metadata).await?;
        self.chain.validate(task_id, VALIDATOR, vec![score], bytes)?;
        self.chain.advance(task_id)?;
        Ok(())
    }

    /// Wait until `count` status watchers are live.
    pub async fn until_subscribed(&self, count: usize) {
        for _ in 0..200 {
            if self.chain.active_subscriptions() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} status subscriptions");
    }
}
