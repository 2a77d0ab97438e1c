//! Error taxonomy shared by every oracle crate.
//!
//! Each variant is a distinct kind a caller can match on. Nothing here is
//! downgraded to a default value on the way up.

use crate::types::{Address, TaskId, TaskStatus, TxHash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    /// On-chain bytes are not valid hex or not valid UTF-8.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Protocol tag does not fit in a `bytes32` field.
    #[error("protocol tag is {len} bytes, at most 32 fit on-chain")]
    TagTooLong { len: usize },

    /// Protocol tag is not of the form `name/version`.
    #[error("protocol tag {0:?} must have the form name/version")]
    InvalidTagFormat(String),

    #[error("task must request at least one generation")]
    ZeroGenerations,

    /// Parameter does not fit its on-chain field.
    #[error("{field} = {value} does not fit in uint40")]
    ParameterOutOfRange { field: &'static str, value: u64 },

    /// Chat continuation references a task that has not completed yet.
    #[error("chat history task {task_id} is not completed")]
    IncompleteHistory { task_id: TaskId },

    /// Explicit model list is empty or contains an unusable name.
    #[error("invalid model selection: {0}")]
    InvalidModels(String),

    /// Storage backend could not serve the call (transport, credentials).
    #[error("{backend} storage unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// Status subscription dropped before the task completed.
    #[error("status subscription for task {task_id} lost: {reason}")]
    SubscriptionLost { task_id: TaskId, reason: String },

    /// Chain handles are not bound yet.
    #[error("oracle client not initialized, call init first")]
    NotInitialized,

    /// Validation metadata points at a stored value that no longer exists.
    #[error("validation metadata from {validator} is missing from storage")]
    MissingMetadata { validator: Address },

    #[error("no Request event in the receipt of {tx_hash}")]
    RequestEventMissing { tx_hash: TxHash },

    #[error("task {task_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// Chain collaborator call failed.
    #[error("chain call failed: {0}")]
    Chain(String),
}

/// Result alias used across the oracle crates.
pub type Result<T> = std::result::Result<T, OracleError>;

impl OracleError {
    pub fn unavailable(backend: impl Into<String>, reason: impl ToString) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }
}
