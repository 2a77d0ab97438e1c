//! Arweave storage backend, read through an HTTP gateway.
//!
//! Reads are plain `GET {gateway}/{id}`. Uploads need a signing client, which
//! this crate does not implement; it is plugged in as an `ArweaveUploader`.
//! Without one the backend is read-only.
//!
//! Keys go on-chain as `{"arweave":"<id>"}`.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use oracle_core::{Amount, OracleError, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::storage::{Storage, StorageKey};

pub const DEFAULT_GATEWAY: &str = "https://gateway.irys.xyz";

const BACKEND: &str = "Arweave";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArweaveKey {
    pub arweave: String,
}

impl StorageKey for ArweaveKey {
    fn encode(&self) -> String {
        serde_json::json!({ "arweave": self.arweave }).to_string()
    }
}

/// Transaction ids are base64url.
fn is_transaction_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Signing upload client, loaded with a wallet.
#[async_trait]
pub trait ArweaveUploader: Send + Sync {
    /// Upload `data`, returning the transaction id.
    async fn upload(&self, data: Bytes) -> Result<String>;

    /// Funded balance, in atomic units.
    async fn balance(&self) -> Result<Amount>;
}

#[derive(Clone)]
pub struct ArweaveStorage {
    gateway_url: String,
    client: Client,
    uploader: Option<Arc<dyn ArweaveUploader>>,
}

impl ArweaveStorage {
    /// Read-only backend on `gateway_url`.
    pub fn new(gateway_url: &str) -> Result<Self> {
        if gateway_url.trim().is_empty() {
            return Err(OracleError::unavailable(BACKEND, "gateway URL is empty"));
        }
        let client = Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| OracleError::unavailable(BACKEND, e))?;
        Ok(Self {
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            client,
            uploader: None,
        })
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn ArweaveUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn can_write(&self) -> bool {
        self.uploader.is_some()
    }

    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    fn url_for(&self, key: &ArweaveKey) -> String {
        format!("{}/{}", self.gateway_url, key.arweave)
    }

    fn uploader(&self) -> Result<&Arc<dyn ArweaveUploader>> {
        self.uploader
            .as_ref()
            .ok_or_else(|| OracleError::unavailable(BACKEND, "no uploader wallet loaded"))
    }

    /// Uploader balance.
    pub async fn balance(&self) -> Result<Amount> {
        self.uploader()?.balance().await
    }
}

#[async_trait]
impl Storage for ArweaveStorage {
    type Key = ArweaveKey;

    async fn put(&self, value: Bytes) -> Result<ArweaveKey> {
        let len = value.len();
        let id = self.uploader()?.upload(value).await?;
        info!(id = %id, len, "uploaded to Arweave");
        Ok(ArweaveKey { arweave: id })
    }

    async fn get(&self, key: &ArweaveKey) -> Result<Option<Bytes>> {
        let url = self.url_for(key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| OracleError::unavailable(BACKEND, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(url = %url, "not found on gateway");
            return Ok(None);
        }
        let response = response.error_for_status().map_err(|e| {
            warn!(url = %url, error = %e, "gateway read failed");
            OracleError::unavailable(BACKEND, e)
        })?;
        let body = response
            .bytes()
            .await
            .map_err(|e| OracleError::unavailable(BACKEND, e))?;
        Ok(Some(body))
    }

    /// A JSON object whose `arweave` field is a transaction id string.
    fn is_key(&self, candidate: &str) -> Option<ArweaveKey> {
        let value: serde_json::Value = serde_json::from_str(candidate).ok()?;
        let id = value.as_object()?.get("arweave")?.as_str()?;
        is_transaction_id(id).then(|| ArweaveKey {
            arweave: id.to_string(),
        })
    }

    fn describe(&self) -> &str {
        BACKEND
    }
}
