//! Oracle client facade.
//!
//! Owns the chain client, the storage router and the request defaults.
//! Chain handles are bound by `init`; every call that needs them fails with
//! `NotInitialized` before that.

use std::sync::Arc;

use oracle_core::codec::{decode_bytes, decode_tag, encode_protocol};
use oracle_core::config::TaskSettings;
use oracle_core::{
    Address, Amount, ChatHistoryResponse, EventFilter, OracleError, RequestEvent, RequestModels,
    Result, TaskId, TaskInput, TaskParameterOverrides, TaskParameters, TaskRequest, TaskResponse,
    TaskStatus, TaskValidation, TxHash, ValidationScores,
};
use tracing::info;

use crate::chain::{ChainClient, Coordinator, FeeToken};
use crate::lifecycle::TaskLifecycle;
use crate::memory_storage::MemoryStorage;
use crate::request::{RequestOptions, TaskRequestBuilder};
use crate::router::StorageRouter;
use crate::storage::Storage;

/// A submitted request and what went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequest {
    pub tx_hash: TxHash,
    pub protocol: String,
    pub input: String,
    pub models: String,
    pub parameters: TaskParameters,
}

/// A request with its payloads resolved. `None` where a stored value is gone.
pub type ReadRequest = TaskRequest<Option<String>, String, RequestModels>;

/// A response with output and metadata resolved.
pub type ReadResponse = TaskResponse<Option<String>>;

struct Bound {
    coordinator: Arc<dyn Coordinator>,
    token: Arc<dyn FeeToken>,
    lifecycle: TaskLifecycle,
}

pub struct Oracle<S: Storage = MemoryStorage> {
    chain: Arc<dyn ChainClient>,
    builder: TaskRequestBuilder<S>,
    bound: Option<Bound>,
}

impl<S: Storage> Oracle<S> {
    pub fn new(chain: Arc<dyn ChainClient>, router: StorageRouter<S>) -> Self {
        Self {
            chain,
            builder: TaskRequestBuilder::new(router),
            bound: None,
        }
    }

    /// Client with defaults taken from the `[task]` config section.
    pub fn with_settings(
        chain: Arc<dyn ChainClient>,
        router: StorageRouter<S>,
        settings: &TaskSettings,
    ) -> Result<Self> {
        Self::new(chain, router)
            .with_parameters(&settings.parameters.into())
            .with_protocol(&settings.protocol)
    }

    /// Merge overrides into the default task parameters.
    pub fn with_parameters(mut self, overrides: &TaskParameterOverrides) -> Self {
        self.builder.set_parameters(overrides);
        self
    }

    /// Replace the default protocol tag.
    pub fn with_protocol(mut self, protocol: &str) -> Result<Self> {
        encode_protocol(protocol)?;
        self.builder.set_protocol(protocol);
        Ok(self)
    }

    /// Bind the coordinator at `coordinator_address` and its fee token.
    pub async fn init(&mut self, coordinator_address: Address) -> Result<()> {
        let coordinator = self.chain.coordinator(coordinator_address);
        let token_address = coordinator.fee_token().await?;
        let token = self.chain.token(token_address);
        info!(
            account = %self.chain.account(),
            coordinator = %coordinator_address,
            token = %token_address,
            "oracle client initialized"
        );
        self.bound = Some(Bound {
            lifecycle: TaskLifecycle::new(coordinator.clone()),
            coordinator,
            token,
        });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.bound.is_some()
    }

    pub fn account(&self) -> Address {
        self.chain.account()
    }

    pub fn router(&self) -> &StorageRouter<S> {
        self.builder.router()
    }

    pub fn parameters(&self) -> TaskParameters {
        self.builder.parameters()
    }

    pub fn protocol(&self) -> &str {
        self.builder.protocol()
    }

    fn bound(&self) -> Result<&Bound> {
        self.bound.as_ref().ok_or(OracleError::NotInitialized)
    }

    pub fn coordinator(&self) -> Result<&Arc<dyn Coordinator>> {
        Ok(&self.bound()?.coordinator)
    }

    // ── Requests ─────────────────────────────────────────────────────────────

    /// Build and submit a request. Returns once the transaction is sent;
    /// `wait_request` yields the task id.
    pub async fn request(
        &self,
        input: impl Into<TaskInput>,
        models: &RequestModels,
        options: &RequestOptions,
    ) -> Result<NewRequest> {
        let bound = self.bound()?;
        let built = self
            .builder
            .build(input.into(), models, options, &bound.lifecycle)
            .await?;
        let tx_hash = bound.coordinator.request(built.submission).await?;
        info!(tx = %tx_hash, protocol = %built.protocol, "request submitted");
        Ok(NewRequest {
            tx_hash,
            protocol: built.protocol,
            input: built.input,
            models: built.models,
            parameters: built.parameters,
        })
    }

    /// Wait for the request transaction and return the new task id.
    pub async fn wait_request(&self, tx_hash: TxHash) -> Result<TaskId> {
        let receipt = self.bound()?.coordinator.wait_for_receipt(tx_hash).await?;
        receipt
            .request_task_id()
            .ok_or(OracleError::RequestEventMissing { tx_hash })
    }

    pub async fn status(&self, task_id: TaskId) -> Result<TaskStatus> {
        self.bound()?.lifecycle.status(task_id).await
    }

    pub async fn is_completed(&self, task_id: TaskId) -> Result<bool> {
        self.bound()?.lifecycle.is_completed(task_id).await
    }

    pub async fn await_completion(&self, task_id: TaskId) -> Result<()> {
        self.bound()?.lifecycle.await_completion(task_id).await
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub async fn get_request(&self, task_id: TaskId) -> Result<TaskRequest> {
        self.bound()?.coordinator.get_request(task_id).await
    }

    /// Request with protocol tag, input and models decoded.
    pub async fn read_request(&self, task_id: TaskId) -> Result<ReadRequest> {
        let request = self.get_request(task_id).await?;
        Ok(TaskRequest {
            requester: request.requester,
            protocol: decode_tag(&request.protocol)?,
            parameters: request.parameters,
            status: request.status,
            generator_fee: request.generator_fee,
            validator_fee: request.validator_fee,
            platform_fee: request.platform_fee,
            input: self.router().from_contract_bytes(&request.input).await?,
            // Models are never routed to storage.
            models: RequestModels::from_request_string(&decode_bytes(&request.models)?),
        })
    }

    pub async fn get_responses(&self, task_id: TaskId) -> Result<Vec<TaskResponse>> {
        self.bound()?.coordinator.get_responses(task_id).await
    }

    pub async fn get_best_response(&self, task_id: TaskId) -> Result<TaskResponse> {
        self.bound()?.coordinator.get_best_response(task_id).await
    }

    pub async fn get_validations(&self, task_id: TaskId) -> Result<Vec<TaskValidation>> {
        self.bound()?.coordinator.get_validations(task_id).await
    }

    /// Best response, processed.
    pub async fn read(&self, task_id: TaskId) -> Result<ReadResponse> {
        let response = self.get_best_response(task_id).await?;
        self.process_response(&response).await
    }

    /// Resolve output and metadata through the router.
    pub async fn process_response(&self, response: &TaskResponse) -> Result<ReadResponse> {
        Ok(TaskResponse {
            responder: response.responder,
            nonce: response.nonce,
            score: response.score,
            output: self.router().from_contract_bytes(&response.output).await?,
            metadata: self.router().from_contract_bytes(&response.metadata).await?,
        })
    }

    /// Resolve metadata and parse it as per-generation scores.
    pub async fn process_validation(
        &self,
        validation: &TaskValidation,
    ) -> Result<TaskValidation<Vec<ValidationScores>>> {
        let metadata = self
            .router()
            .from_contract_bytes(&validation.metadata)
            .await?
            .ok_or(OracleError::MissingMetadata {
                validator: validation.validator,
            })?;
        let scores: Vec<ValidationScores> = serde_json::from_str(&metadata).map_err(|e| {
            OracleError::MalformedPayload(format!("validation metadata is not score JSON: {e}"))
        })?;
        Ok(TaskValidation {
            validator: validation.validator,
            nonce: validation.nonce,
            scores: validation.scores.clone(),
            metadata: scores,
        })
    }

    /// Parse a chat task output into its messages.
    pub fn to_chat_history(output: &str) -> Result<Vec<ChatHistoryResponse>> {
        serde_json::from_str(output)
            .map_err(|e| OracleError::MalformedPayload(format!("output is not chat history: {e}")))
    }

    // ── Fees ─────────────────────────────────────────────────────────────────

    /// Fee token allowance of this account towards the coordinator.
    pub async fn allowance(&self) -> Result<Amount> {
        let bound = self.bound()?;
        bound
            .token
            .allowance(self.chain.account(), bound.coordinator.address())
            .await
    }

    /// Let the coordinator spend `amount` fee tokens, unlimited by default.
    pub async fn approve(&self, amount: Option<Amount>) -> Result<TxHash> {
        let bound = self.bound()?;
        let amount = amount.unwrap_or(Amount::MAX);
        let tx_hash = bound
            .token
            .approve(bound.coordinator.address(), amount)
            .await?;
        info!(tx = %tx_hash, amount = %amount, "fee token approved");
        Ok(tx_hash)
    }

    // ── Events ───────────────────────────────────────────────────────────────

    /// Past `Request` events, optionally for one protocol, tags decoded.
    pub async fn get_request_events(
        &self,
        protocol: Option<&str>,
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> Result<Vec<RequestEvent<String>>> {
        let filter = EventFilter {
            protocol: protocol.map(encode_protocol).transpose()?,
            from_block,
            to_block,
        };
        self.bound()?
            .coordinator
            .request_events(filter)
            .await?
            .into_iter()
            .map(|event| {
                Ok(RequestEvent {
                    task_id: event.task_id,
                    requester: event.requester,
                    protocol: decode_tag(&event.protocol)?,
                    block_number: event.block_number,
                })
            })
            .collect()
    }
}
