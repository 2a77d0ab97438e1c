use oracle_core::{OracleError, TaskStatus};

use crate::*;

/// A waiter resolves once the responder and validator have both finished.
#[tokio::test]
async fn test_await_completion_follows_responders() -> Result<()> {
    let h = Arc::new(Harness::new(1024).await?);
    let task_id = h.submit("Summarise the news").await?;

    let waiter = tokio::spawn({
        let h = h.clone();
        async move { h.oracle.await_completion(task_id).await }
    });
    h.until_subscribed(1).await;

    h.respond(task_id, "Nothing happened.").await?;
    assert_eq!(h.oracle.status(task_id).await?, TaskStatus::PendingValidation);
    h.validate(task_id, 3, "[]").await?;

    waiter.await??;
    assert_eq!(h.chain.active_subscriptions(), 0);
    Ok(())
}

/// Two waiters on one task resolve off the same completion.
#[tokio::test]
async fn test_concurrent_waiters() -> Result<()> {
    let h = Arc::new(Harness::new(1024).await?);
    let task_id = h.submit("shared").await?;

    let waiters: Vec<_> = (0..2)
        .map(|_| {
            let h = h.clone();
            tokio::spawn(async move { h.oracle.await_completion(task_id).await })
        })
        .collect();
    h.until_subscribed(2).await;

    h.chain.complete(task_id)?;
    for waiter in waiters {
        waiter.await??;
    }
    assert_eq!(h.chain.active_subscriptions(), 0);
    Ok(())
}

/// Completion order follows the responders, not submission order.
#[tokio::test]
async fn test_out_of_order_completion() -> Result<()> {
    let h = Arc::new(Harness::new(1024).await?);
    let first = h.submit("slow").await?;
    let second = h.submit("fast").await?;

    let slow = tokio::spawn({
        let h = h.clone();
        async move { h.oracle.await_completion(first).await }
    });
    let fast = tokio::spawn({
        let h = h.clone();
        async move { h.oracle.await_completion(second).await }
    });
    h.until_subscribed(2).await;

    h.chain.complete(second)?;
    fast.await??;
    assert!(!slow.is_finished());

    h.chain.complete(first)?;
    slow.await??;
    Ok(())
}

/// Transport loss surfaces as SubscriptionLost; a retry after completion
/// returns through the fast path.
#[tokio::test]
async fn test_subscription_lost_then_retry() -> Result<()> {
    let h = Arc::new(Harness::new(1024).await?);
    let task_id = h.submit("fragile").await?;

    let waiter = tokio::spawn({
        let h = h.clone();
        async move { h.oracle.await_completion(task_id).await }
    });
    h.until_subscribed(1).await;
    h.chain.drop_subscriptions("connection reset");

    let err = waiter.await?.unwrap_err();
    assert!(matches!(err, OracleError::SubscriptionLost { .. }));

    h.chain.complete(task_id)?;
    h.oracle.await_completion(task_id).await?;
    assert_eq!(h.chain.active_subscriptions(), 0);
    Ok(())
}

/// Status never goes backwards.
#[tokio::test]
async fn test_status_is_monotonic() -> Result<()> {
    let h = Harness::new(1024).await?;
    let task_id = h.submit("once").await?;
    h.chain.complete(task_id)?;
    let err = h
        .chain
        .set_status(task_id, TaskStatus::PendingValidation)
        .unwrap_err();
    assert!(matches!(err, OracleError::InvalidTransition { .. }));
    assert!(h.oracle.is_completed(task_id).await?);
    Ok(())
}
