//! Task request builder.
//!
//! Turns caller input, a model selection and parameter overrides into the
//! coordinator's `request` arguments. Every check runs before the first
//! storage write, so a rejected request has no side effects:
//!
//!   protocol tag → models → parameters → chat history → encode

use async_trait::async_trait;
use oracle_core::codec::{encode_protocol, Bytes32};
use oracle_core::{
    OracleError, RequestModels, Result, TaskId, TaskInput, TaskParameterOverrides,
    TaskParameters, TaskSubmission, DEFAULT_PROTOCOL, NO_HISTORY,
};
use tracing::debug;

use crate::memory_storage::MemoryStorage;
use crate::router::StorageRouter;
use crate::storage::Storage;

/// "Has this task completed?" query, used to gate chat continuations.
#[async_trait]
pub trait CompletionCheck: Send + Sync {
    async fn is_completed(&self, task_id: TaskId) -> Result<bool>;
}

/// Per-call options. Unset fields fall back to the builder defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub protocol: Option<String>,
    pub parameters: TaskParameterOverrides,
}

/// An encoded submission plus what went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltRequest {
    pub submission: TaskSubmission,
    pub protocol: String,
    /// Input as a string, before storage routing.
    pub input: String,
    /// Models as joined on-chain.
    pub models: String,
    pub parameters: TaskParameters,
}

pub struct TaskRequestBuilder<S: Storage = MemoryStorage> {
    router: StorageRouter<S>,
    /// Model lists are short; they are always inlined.
    models_router: StorageRouter<S>,
    parameters: TaskParameters,
    protocol: String,
}

impl<S: Storage> Clone for TaskRequestBuilder<S> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            models_router: self.models_router.clone(),
            parameters: self.parameters,
            protocol: self.protocol.clone(),
        }
    }
}

impl<S: Storage> TaskRequestBuilder<S> {
    pub fn new(router: StorageRouter<S>) -> Self {
        Self {
            router,
            models_router: StorageRouter::inline_only(),
            parameters: TaskParameters::default(),
            protocol: DEFAULT_PROTOCOL.to_string(),
        }
    }

    pub fn router(&self) -> &StorageRouter<S> {
        &self.router
    }

    pub fn parameters(&self) -> TaskParameters {
        self.parameters
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Merge overrides into the default parameters.
    pub fn set_parameters(&mut self, overrides: &TaskParameterOverrides) {
        self.parameters = self.parameters.merged(overrides);
    }

    /// Replace the default protocol tag. Checked when a request is built.
    pub fn set_protocol(&mut self, protocol: impl Into<String>) {
        self.protocol = protocol.into();
    }

    pub async fn build(
        &self,
        input: TaskInput,
        models: &RequestModels,
        options: &RequestOptions,
        history: &dyn CompletionCheck,
    ) -> Result<BuiltRequest> {
        let protocol = options
            .protocol
            .clone()
            .unwrap_or_else(|| self.protocol.clone());
        let protocol_tag: Bytes32 = encode_protocol(&protocol)?;

        let models = models.to_request_string()?;

        let parameters = self.parameters.merged(&options.parameters);
        parameters.validate()?;

        let input = match input {
            TaskInput::Text(text) => text,
            TaskInput::Chat(chat) => {
                if chat.history_id != NO_HISTORY && !history.is_completed(chat.history_id).await? {
                    return Err(OracleError::IncompleteHistory {
                        task_id: chat.history_id,
                    });
                }
                serde_json::to_string(&chat)
                    .map_err(|e| OracleError::MalformedPayload(e.to_string()))?
            }
        };

        let submission = TaskSubmission {
            protocol: protocol_tag,
            input: self.router.to_contract_bytes(&input).await?,
            models: self.models_router.to_contract_bytes(&models).await?,
            parameters,
        };
        debug!(
            protocol = %protocol,
            models = %models,
            input_len = input.len(),
            ?parameters,
            "built task request"
        );

        Ok(BuiltRequest {
            submission,
            protocol,
            input,
            models,
            parameters,
        })
    }
}
