use oracle_client::RequestOptions;
use oracle_core::{
    ChatHistoryRequest, OracleError, RequestModels, TaskParameterOverrides, TaskStatus,
};

use crate::*;

/// Plain request through to a validated answer.
#[tokio::test]
async fn test_request_round_trip() -> Result<()> {
    let h = Harness::new(1024).await?;
    let task_id = h.submit("What is 2+2?").await?;

    let read = h.oracle.read_request(task_id).await?;
    assert_eq!(read.input.as_deref(), Some("What is 2+2?"));
    assert_eq!(read.models, RequestModels::Any);
    assert_eq!(read.protocol, "oracle-rs-sdk/0.1.0");
    assert_eq!(read.status, TaskStatus::PendingGeneration);

    h.respond(task_id, "4").await?;
    let scores = serde_json::json!([{
        "helpfulness": 5,
        "instruction_following": 5,
        "truthfulness": 5,
        "final_score": 5,
        "rationale": "correct arithmetic"
    }]);
    h.validate(task_id, 5, &scores.to_string()).await?;
    h.oracle.await_completion(task_id).await?;

    let best = h.oracle.read(task_id).await?;
    assert_eq!(best.output.as_deref(), Some("4"));
    assert_eq!(best.score, 5);

    let validations = h.oracle.get_validations(task_id).await?;
    let processed = h.oracle.process_validation(&validations[0]).await?;
    assert_eq!(processed.metadata[0].rationale, "correct arithmetic");
    Ok(())
}

/// Chat continuation is refused until its history task completes, and
/// nothing is submitted meanwhile.
#[tokio::test]
async fn test_chat_continuation_gating() -> Result<()> {
    let h = Harness::new(1024).await?;
    let first = h.submit("Hi, I am Ada.").await?;
    let follow_up = ChatHistoryRequest {
        history_id: first,
        content: "What is my name?".to_string(),
    };

    let err = h
        .oracle
        .request(follow_up.clone(), &RequestModels::Any, &RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::IncompleteHistory { task_id } if task_id == first));
    assert_eq!(h.chain.submission_count(), 1);

    h.respond(first, "Hello Ada!").await?;
    h.validate(first, 5, "[]").await?;

    let new = h
        .oracle
        .request(follow_up, &RequestModels::Any, &RequestOptions::default())
        .await?;
    let second = h.oracle.wait_request(new.tx_hash).await?;
    let read = h.oracle.read_request(second).await?;
    let input: serde_json::Value = serde_json::from_str(read.input.as_deref().unwrap_or(""))?;
    assert_eq!(input["history_id"], first);
    assert_eq!(input["content"], "What is my name?");
    Ok(())
}

/// History id 0 never triggers a status lookup.
#[tokio::test]
async fn test_sentinel_history_needs_no_lookup() -> Result<()> {
    let h = Harness::new(1024).await?;
    let reads = h.chain.status_reads();
    let chat = ChatHistoryRequest {
        history_id: 0,
        content: "Start fresh".to_string(),
    };
    h.oracle
        .request(chat, &RequestModels::First, &RequestOptions::default())
        .await?;
    assert_eq!(h.chain.status_reads(), reads);
    assert_eq!(h.chain.submission_count(), 1);
    Ok(())
}

/// Zero generations is rejected with no storage write and no submission.
#[tokio::test]
async fn test_zero_generations_rejected() -> Result<()> {
    let h = Harness::new(4).await?;
    let options = RequestOptions {
        parameters: TaskParameterOverrides {
            num_generations: Some(0),
            ..Default::default()
        },
        ..Default::default()
    };
    let err = h
        .oracle
        .request("long enough to overflow", &RequestModels::Any, &options)
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::ZeroGenerations));
    assert_eq!(h.storage.put_count(), 0);
    assert_eq!(h.chain.submission_count(), 0);
    Ok(())
}

/// Tasks without validation complete straight after generation.
#[tokio::test]
async fn test_no_validation_skips_stage() -> Result<()> {
    let h = Harness::new(1024).await?;
    let options = RequestOptions {
        parameters: TaskParameterOverrides {
            num_validations: Some(0),
            ..Default::default()
        },
        ..Default::default()
    };
    let new = h
        .oracle
        .request("quick one", &RequestModels::list(["llama3.1:latest"]), &options)
        .await?;
    let task_id = h.oracle.wait_request(new.tx_hash).await?;

    h.respond(task_id, "done").await?;
    assert_eq!(h.oracle.status(task_id).await?, TaskStatus::Completed);
    assert!(h.oracle.get_validations(task_id).await?.is_empty());
    Ok(())
}

/// Protocol filtering over past Request events.
#[tokio::test]
async fn test_request_events_by_protocol() -> Result<()> {
    let h = Harness::new(1024).await?;
    h.submit("one").await?;
    let options = RequestOptions {
        protocol: Some("agent-state/0.2.0".to_string()),
        ..Default::default()
    };
    h.oracle.request("two", &RequestModels::Any, &options).await?;
    h.submit("three").await?;

    let ours = h
        .oracle
        .get_request_events(Some("oracle-rs-sdk/0.1.0"), None, None)
        .await?;
    assert_eq!(
        ours.iter().map(|e| e.task_id).collect::<Vec<_>>(),
        vec![1, 3]
    );
    let agent = h
        .oracle
        .get_request_events(Some("agent-state/0.2.0"), None, None)
        .await?;
    assert_eq!(agent.len(), 1);
    assert_eq!(agent[0].requester, h.oracle.account());
    Ok(())
}
