use oracle_core::codec::decode_bytes;

use crate::*;

/// Threshold 10: short input stays inline, 50 bytes overflow once.
#[tokio::test]
async fn test_overflow_threshold_end_to_end() -> Result<()> {
    let h = Harness::new(10).await?;

    let short = h.submit("short").await?;
    assert_eq!(h.storage.put_count(), 0);
    let read = h.oracle.read_request(short).await?;
    assert_eq!(read.input.as_deref(), Some("short"));
    assert_eq!(h.storage.get_count(), 0);

    let long_input = "x".repeat(50);
    let long = h.submit(&long_input).await?;
    assert_eq!(h.storage.put_count(), 1);

    // Only the key travels on-chain.
    let raw = h.oracle.get_request(long).await?;
    let on_chain = decode_bytes(&raw.input)?;
    assert_eq!(on_chain.len(), 64);
    assert_ne!(on_chain, long_input);

    let read = h.oracle.read_request(long).await?;
    assert_eq!(read.input, Some(long_input));
    assert_eq!(h.storage.get_count(), 1);
    Ok(())
}

/// A stored output that disappears reads back as None, not as its key.
#[tokio::test]
async fn test_expired_output_reads_as_none() -> Result<()> {
    let h = Harness::new(16).await?;
    let task_id = h.submit("tell me a story").await?;
    h.respond(task_id, &"once upon a time ".repeat(20)).await?;

    let response = h.oracle.get_best_response(task_id).await?;
    let key = decode_bytes(&response.output)?;
    assert!(h.storage.remove(&key).is_some());

    let read = h.oracle.read(task_id).await?;
    assert_eq!(read.output, None);
    assert_eq!(read.metadata.as_deref(), Some(""));
    Ok(())
}

/// Chat output stored off-chain parses back into messages.
#[tokio::test]
async fn test_chat_history_from_stored_output() -> Result<()> {
    let h = Harness::new(32).await?;
    let task_id = h.submit("hello").await?;
    let history = serde_json::json!([
        { "role": "user", "content": "hello" },
        { "role": "assistant", "content": "Hi there, how can I help you today?" }
    ]);
    h.respond(task_id, &history.to_string()).await?;
    assert_eq!(h.storage.put_count(), 1);

    let output = h
        .oracle
        .read(task_id)
        .await?
        .output
        .context("stored output missing")?;
    let messages = Oracle::<MemoryStorage>::to_chat_history(&output)?;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "user");
    assert_eq!(messages[1].content, "Hi there, how can I help you today?");
    Ok(())
}

/// Validation metadata whose stored value is gone is an explicit error.
#[tokio::test]
async fn test_missing_validation_metadata() -> Result<()> {
    let h = Harness::new(8).await?;
    let task_id = h.submit("q").await?;
    h.respond(task_id, "a").await?;
    h.validate(task_id, 4, r#"[{"helpfulness":4,"instruction_following":4,"truthfulness":4,"final_score":4,"rationale":"fine"}]"#)
        .await?;

    let validation = h.oracle.get_validations(task_id).await?.remove(0);
    let key = decode_bytes(&validation.metadata)?;
    h.storage.remove(&key);

    let err = h.oracle.process_validation(&validation).await.unwrap_err();
    assert!(matches!(
        err,
        oracle_core::OracleError::MissingMetadata { validator } if validator == VALIDATOR
    ));
    Ok(())
}
