//! Task lifecycle — status lookups and waiting for completion.
//!
//! `None → PendingGeneration → PendingValidation → Completed`, with the
//! validation stage skipped when a task asks for no validations. Task id 0 is
//! the "no history" sentinel and always counts as completed.

use std::sync::Arc;

use async_trait::async_trait;
use oracle_core::{OracleError, Result, TaskId, TaskStatus, NO_HISTORY};
use tracing::{debug, warn};

use crate::chain::Coordinator;
use crate::request::CompletionCheck;

#[derive(Clone)]
pub struct TaskLifecycle {
    coordinator: Arc<dyn Coordinator>,
}

impl TaskLifecycle {
    pub fn new(coordinator: Arc<dyn Coordinator>) -> Self {
        Self { coordinator }
    }

    pub async fn status(&self, task_id: TaskId) -> Result<TaskStatus> {
        self.coordinator.status(task_id).await
    }

    pub async fn is_completed(&self, task_id: TaskId) -> Result<bool> {
        if task_id == NO_HISTORY {
            return Ok(true);
        }
        Ok(self.status(task_id).await?.is_completed())
    }

    /// Suspend until the task reaches `Completed`.
    ///
    /// Returns at once, without subscribing, if it already has. Otherwise the
    /// first `StatusUpdate` whose post-state is `Completed` resolves the wait
    /// and the subscription is released. A failed or closed subscription ends
    /// the wait with `SubscriptionLost`; retrying is safe.
    pub async fn await_completion(&self, task_id: TaskId) -> Result<()> {
        if self.is_completed(task_id).await? {
            return Ok(());
        }

        let mut subscription = self.coordinator.watch_status(task_id).await?;
        // Completion may have landed between the check and the subscription.
        if self.is_completed(task_id).await? {
            return Ok(());
        }
        debug!(task_id, "waiting for completion");

        loop {
            match subscription.next().await {
                Some(Ok(update)) if update.task_id != task_id => continue,
                Some(Ok(update)) => {
                    debug!(task_id, status = ?update.status_after, "status update");
                    if update.status_after == TaskStatus::Completed {
                        subscription.close();
                        return Ok(());
                    }
                }
                Some(Err(e)) => {
                    warn!(task_id, error = %e, "status subscription failed");
                    return Err(OracleError::SubscriptionLost {
                        task_id,
                        reason: e.to_string(),
                    });
                }
                None => {
                    return Err(OracleError::SubscriptionLost {
                        task_id,
                        reason: "subscription closed".to_string(),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl CompletionCheck for TaskLifecycle {
    async fn is_completed(&self, task_id: TaskId) -> Result<bool> {
        TaskLifecycle::is_completed(self, task_id).await
    }
}
