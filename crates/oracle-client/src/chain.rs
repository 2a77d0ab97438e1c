//! Chain collaborator boundary.
//!
//! The client never speaks the chain wire protocol itself. A `ChainClient`
//! binds typed handles to the coordinator contract and its fee token; every
//! read, write, receipt wait and event subscription goes through them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use oracle_core::{
    Address, Amount, EventFilter, OracleError, Receipt, RequestEvent, Result, StatusUpdate,
    TaskId, TaskRequest, TaskResponse, TaskStatus, TaskSubmission, TaskValidation, TxHash,
};
use tokio::sync::mpsc;

// ── Status subscription ───────────────────────────────────────────────────────

/// Live `StatusUpdate` watch for one task.
///
/// The release hook unregisters the watch on the chain side. It runs exactly
/// once, when the handle is dropped or closed, whichever way the wait ended.
pub struct StatusSubscription {
    task_id: TaskId,
    updates: mpsc::UnboundedReceiver<Result<StatusUpdate>>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl StatusSubscription {
    pub fn new<F>(
        task_id: TaskId,
        updates: mpsc::UnboundedReceiver<Result<StatusUpdate>>,
        release: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            task_id,
            updates,
            release: Some(Box::new(release)),
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Next update. `None` once the chain side has hung up.
    pub async fn next(&mut self) -> Option<Result<StatusUpdate>> {
        self.updates.recv().await
    }

    /// Unsubscribe now.
    pub fn close(self) {}
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.updates.close();
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for StatusSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusSubscription")
            .field("task_id", &self.task_id)
            .finish_non_exhaustive()
    }
}

// ── Contract handles ──────────────────────────────────────────────────────────

/// Bound coordinator contract.
#[async_trait]
pub trait Coordinator: Send + Sync {
    fn address(&self) -> Address;

    /// Address of the token fees are paid in.
    async fn fee_token(&self) -> Result<Address>;

    /// Submit a task request. Returns once the transaction is sent.
    async fn request(&self, submission: TaskSubmission) -> Result<TxHash>;

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt>;

    async fn get_request(&self, task_id: TaskId) -> Result<TaskRequest>;

    async fn get_responses(&self, task_id: TaskId) -> Result<Vec<TaskResponse>>;

    /// Highest-scored response.
    async fn get_best_response(&self, task_id: TaskId) -> Result<TaskResponse>;

    async fn get_validations(&self, task_id: TaskId) -> Result<Vec<TaskValidation>>;

    /// Current status of a task.
    async fn status(&self, task_id: TaskId) -> Result<TaskStatus> {
        Ok(self.get_request(task_id).await?.status)
    }

    /// Watch `StatusUpdate` events indexed by `task_id`.
    async fn watch_status(&self, task_id: TaskId) -> Result<StatusSubscription>;

    /// Past `Request` events.
    async fn request_events(&self, filter: EventFilter) -> Result<Vec<RequestEvent>>;
}

/// Bound ERC-20 fee token.
#[async_trait]
pub trait FeeToken: Send + Sync {
    fn address(&self) -> Address;

    async fn allowance(&self, owner: Address, spender: Address) -> Result<Amount>;

    async fn approve(&self, spender: Address, amount: Amount) -> Result<TxHash>;
}

/// Account-holding chain client that binds contract handles.
pub trait ChainClient: Send + Sync {
    /// Account that signs and pays.
    fn account(&self) -> Address;

    fn coordinator(&self, address: Address) -> Arc<dyn Coordinator>;

    fn token(&self, address: Address) -> Arc<dyn FeeToken>;
}

/// Wrap a collaborator failure.
pub fn chain_error(reason: impl fmt::Display) -> OracleError {
    OracleError::Chain(reason.to_string())
}
