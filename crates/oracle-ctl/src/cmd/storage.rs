//! Storage-backed commands and router construction from config.
//!
//! oracle-ctl holds no signing wallet, so the Arweave backend is read-only
//! here: `encode` only succeeds for payloads that stay inline.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use oracle_client::arweave::DEFAULT_GATEWAY;
use oracle_client::{ArweaveKey, ArweaveStorage, MemoryStorage, Storage, StorageKey, StorageRouter};
use oracle_core::ContractBytes;
use oracle_core::config::{OracleConfig, StorageBackendKind};
use tracing::debug;

const MEMORY_UNSUPPORTED: &str =
    "the memory backend does not persist between oracle-ctl runs; use `none` or `arweave`";

fn arweave(config: &OracleConfig) -> Result<ArweaveStorage> {
    ArweaveStorage::new(&config.storage.gateway_url)
        .with_context(|| format!("invalid gateway {}", config.storage.gateway_url))
}

async fn to_bytes<S: Storage>(router: StorageRouter<S>, text: &str) -> Result<ContractBytes> {
    router
        .to_contract_bytes(text)
        .await
        .context("failed to encode payload")
}

async fn from_bytes<S: Storage>(
    router: StorageRouter<S>,
    bytes: &ContractBytes,
) -> Result<Option<String>> {
    router
        .from_contract_bytes(bytes)
        .await
        .context("failed to decode payload")
}

/// Encode through the configured backend.
pub async fn encode(config: &OracleConfig, text: &str) -> Result<ContractBytes> {
    let limit = config.storage.bytes_limit;
    match config.storage.backend {
        StorageBackendKind::None => to_bytes(StorageRouter::<MemoryStorage>::inline_only(), text).await,
        StorageBackendKind::Memory => bail!(MEMORY_UNSUPPORTED),
        StorageBackendKind::Arweave => {
            if text.len() > limit {
                bail!(
                    "payload is {} bytes, over bytes_limit {limit}; the Arweave backend is \
                     read-only in oracle-ctl (raise --limit or use backend `none`)",
                    text.len()
                );
            }
            to_bytes(StorageRouter::new(limit, Arc::new(arweave(config)?)), text).await
        }
    }
}

/// Decode through the configured backend.
pub async fn decode(config: &OracleConfig, bytes: &ContractBytes) -> Result<Option<String>> {
    let limit = config.storage.bytes_limit;
    match config.storage.backend {
        StorageBackendKind::None => {
            from_bytes(StorageRouter::<MemoryStorage>::inline_only(), bytes).await
        }
        StorageBackendKind::Memory => bail!(MEMORY_UNSUPPORTED),
        StorageBackendKind::Arweave => {
            from_bytes(StorageRouter::new(limit, Arc::new(arweave(config)?)), bytes).await
        }
    }
}

/// Fetch a stored payload by transaction id.
pub async fn cmd_fetch(config: &OracleConfig, id: &str) -> Result<()> {
    let storage = if config.storage.gateway_url.is_empty() {
        ArweaveStorage::new(DEFAULT_GATEWAY)?
    } else {
        arweave(config)?
    };
    let key = storage
        .is_key(&ArweaveKey { arweave: id.to_string() }.encode())
        .with_context(|| format!("{id:?} is not an Arweave transaction id"))?;
    debug!(id, gateway = storage.gateway_url(), "fetching stored payload");

    let Some(body) = storage
        .get(&key)
        .await
        .with_context(|| format!("failed to reach gateway {}", storage.gateway_url()))?
    else {
        bail!("nothing stored under {id} on {}", storage.gateway_url());
    };

    match std::str::from_utf8(&body) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{}", ContractBytes::from_bytes(&body)),
    }
    Ok(())
}
