//! In-memory coordinator and fee token.
//!
//! Stands in for a deployed coordinator in tests and local runs. Submissions
//! get sequential task ids from 1, every transaction is mined into its own
//! block immediately, and status changes are pushed to live watchers.
//! Responders and validators are simulated through the control methods
//! (`advance`, `respond`, `validate`).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use oracle_core::{
    Address, Amount, ContractBytes, CoordinatorEvent, EventFilter, OracleError, Receipt,
    RequestEvent, Result, StatusUpdate, TaskId, TaskRequest, TaskResponse, TaskStatus,
    TaskSubmission, TaskValidation, TxHash,
};
use rand::RngCore;
use tokio::sync::mpsc;
use tracing::debug;

use crate::chain::{chain_error, ChainClient, Coordinator, FeeToken, StatusSubscription};

/// Coordinator fee schedule, copied into each request at submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeSchedule {
    pub generator_fee: Amount,
    pub validator_fee: Amount,
    pub platform_fee: Amount,
}

impl FeeSchedule {
    /// Total a requester pays for one task.
    pub fn total(&self, num_generations: u64, num_validations: u64) -> Amount {
        let generations = Amount::from(num_generations);
        let validations = Amount::from(num_validations);
        self.generator_fee
            .saturating_mul(generations)
            .saturating_add(
                self.validator_fee
                    .saturating_mul(validations)
                    .saturating_mul(generations),
            )
            .saturating_add(self.platform_fee)
    }
}

type Watcher = (TaskId, mpsc::UnboundedSender<Result<StatusUpdate>>);

struct ChainState {
    account: Address,
    coordinator: Address,
    token: Address,
    fees: FeeSchedule,
    block: AtomicU64,
    next_task_id: AtomicU64,
    next_watch_id: AtomicU64,
    tasks: DashMap<TaskId, TaskRequest>,
    responses: DashMap<TaskId, Vec<TaskResponse>>,
    validations: DashMap<TaskId, Vec<TaskValidation>>,
    receipts: DashMap<TxHash, Receipt>,
    request_events: DashMap<TaskId, RequestEvent>,
    /// watch id → (task id, sender)
    watchers: DashMap<u64, Watcher>,
    /// (owner, spender) → allowance
    allowances: DashMap<(Address, Address), Amount>,
    submissions: AtomicUsize,
    status_reads: AtomicUsize,
}

#[derive(Clone)]
pub struct MemoryChain {
    state: Arc<ChainState>,
}

fn random_tx_hash() -> TxHash {
    let mut raw = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw);
    TxHash(raw)
}

impl Default for MemoryChain {
    fn default() -> Self {
        Self::new(FeeSchedule::default())
    }
}

impl MemoryChain {
    /// Fresh chain with one account, one coordinator and its fee token.
    pub fn new(fees: FeeSchedule) -> Self {
        Self {
            state: Arc::new(ChainState {
                account: Address([0xaa; 20]),
                coordinator: Address([0xc0; 20]),
                token: Address([0x70; 20]),
                fees,
                block: AtomicU64::new(1),
                next_task_id: AtomicU64::new(1),
                next_watch_id: AtomicU64::new(0),
                tasks: DashMap::new(),
                responses: DashMap::new(),
                validations: DashMap::new(),
                receipts: DashMap::new(),
                request_events: DashMap::new(),
                watchers: DashMap::new(),
                allowances: DashMap::new(),
                submissions: AtomicUsize::new(0),
                status_reads: AtomicUsize::new(0),
            }),
        }
    }

    pub fn coordinator_address(&self) -> Address {
        self.state.coordinator
    }

    pub fn token_address(&self) -> Address {
        self.state.token
    }

    /// Number of accepted `request` calls.
    pub fn submission_count(&self) -> usize {
        self.state.submissions.load(Ordering::SeqCst)
    }

    /// Number of status lookups served.
    pub fn status_reads(&self) -> usize {
        self.state.status_reads.load(Ordering::SeqCst)
    }

    /// Number of live status watchers.
    pub fn active_subscriptions(&self) -> usize {
        self.state.watchers.len()
    }

    fn mine(&self) -> u64 {
        self.state.block.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ── Responder simulation ─────────────────────────────────────────────────

    /// Move a task to `status`, notifying watchers. Only forward edges of the
    /// status graph are accepted.
    pub fn set_status(&self, task_id: TaskId, status: TaskStatus) -> Result<()> {
        let update = {
            let mut task = self
                .state
                .tasks
                .get_mut(&task_id)
                .ok_or_else(|| chain_error(format!("unknown task {task_id}")))?;
            if !task.status.can_transition_to(status) {
                return Err(OracleError::InvalidTransition {
                    task_id,
                    from: task.status,
                    to: status,
                });
            }
            let update = StatusUpdate {
                task_id,
                protocol: task.protocol,
                status_before: task.status,
                status_after: status,
            };
            task.status = status;
            update
        };
        self.mine();
        debug!(task_id, from = ?update.status_before, to = ?status, "status update");
        self.notify(update);
        Ok(())
    }

    /// Step a task to its next status.
    pub fn advance(&self, task_id: TaskId) -> Result<TaskStatus> {
        let (current, num_validations) = {
            let task = self
                .state
                .tasks
                .get(&task_id)
                .ok_or_else(|| chain_error(format!("unknown task {task_id}")))?;
            (task.status, task.parameters.num_validations)
        };
        let next = current
            .next(num_validations)
            .ok_or(OracleError::InvalidTransition {
                task_id,
                from: current,
                to: current,
            })?;
        self.set_status(task_id, next)?;
        Ok(next)
    }

    /// Drive a task all the way to `Completed`.
    pub fn complete(&self, task_id: TaskId) -> Result<()> {
        while self.status_of(task_id)? != TaskStatus::Completed {
            self.advance(task_id)?;
        }
        Ok(())
    }

    fn status_of(&self, task_id: TaskId) -> Result<TaskStatus> {
        self.state
            .tasks
            .get(&task_id)
            .map(|t| t.status)
            .ok_or_else(|| chain_error(format!("unknown task {task_id}")))
    }

    /// Record a generation.
    pub fn respond(
        &self,
        task_id: TaskId,
        responder: Address,
        output: ContractBytes,
        metadata: ContractBytes,
    ) -> Result<()> {
        if !self.state.tasks.contains_key(&task_id) {
            return Err(chain_error(format!("unknown task {task_id}")));
        }
        let mut responses = self.state.responses.entry(task_id).or_default();
        let nonce = responses.len() as u128;
        responses.push(TaskResponse {
            responder,
            nonce,
            score: 0,
            output,
            metadata,
        });
        Ok(())
    }

    /// Record a validation. Each response's score becomes the mean of the
    /// scores validators gave its generation.
    pub fn validate(
        &self,
        task_id: TaskId,
        validator: Address,
        scores: Vec<u128>,
        metadata: ContractBytes,
    ) -> Result<()> {
        let generations = self
            .state
            .responses
            .get(&task_id)
            .map(|r| r.len())
            .unwrap_or(0);
        if scores.len() != generations {
            return Err(chain_error(format!(
                "expected {generations} scores, got {}",
                scores.len()
            )));
        }

        let mut validations = self.state.validations.entry(task_id).or_default();
        let nonce = validations.len() as u128;
        validations.push(TaskValidation {
            validator,
            nonce,
            scores,
            metadata,
        });

        if let Some(mut responses) = self.state.responses.get_mut(&task_id) {
            let count = validations.len() as u128;
            for (i, response) in responses.iter_mut().enumerate() {
                let sum: u128 = validations
                    .iter()
                    .filter_map(|v| v.scores.get(i))
                    .sum();
                response.score = sum / count;
            }
        }
        Ok(())
    }

    /// Fail every live watcher with `reason` and forget them, as a dropped
    /// transport would.
    pub fn drop_subscriptions(&self, reason: &str) {
        let ids: Vec<u64> = self.state.watchers.iter().map(|w| *w.key()).collect();
        for id in ids {
            if let Some((_, (_, sender))) = self.state.watchers.remove(&id) {
                let _ = sender.send(Err(chain_error(reason)));
            }
        }
    }

    fn notify(&self, update: StatusUpdate) {
        for watcher in self.state.watchers.iter() {
            let (task_id, sender) = watcher.value();
            if *task_id == update.task_id {
                let _ = sender.send(Ok(update));
            }
        }
    }

    fn coordinator_handle(&self, address: Address) -> Result<&ChainState> {
        if address != self.state.coordinator {
            return Err(chain_error(format!("no coordinator deployed at {address}")));
        }
        Ok(self.state.as_ref())
    }
}

impl ChainClient for MemoryChain {
    fn account(&self) -> Address {
        self.state.account
    }

    fn coordinator(&self, address: Address) -> Arc<dyn Coordinator> {
        Arc::new(MemoryCoordinator {
            chain: self.clone(),
            address,
        })
    }

    fn token(&self, address: Address) -> Arc<dyn FeeToken> {
        Arc::new(MemoryToken {
            chain: self.clone(),
            address,
        })
    }
}

// ── Coordinator handle ────────────────────────────────────────────────────────

struct MemoryCoordinator {
    chain: MemoryChain,
    address: Address,
}

impl MemoryCoordinator {
    fn state(&self) -> Result<&ChainState> {
        self.chain.coordinator_handle(self.address)
    }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
    fn address(&self) -> Address {
        self.address
    }

    async fn fee_token(&self) -> Result<Address> {
        Ok(self.state()?.token)
    }

    async fn request(&self, submission: TaskSubmission) -> Result<TxHash> {
        let state = self.state()?;
        let params = submission.parameters;
        if params.num_generations == 0 {
            return Err(chain_error("execution reverted: zero generations"));
        }

        let fee = state
            .fees
            .total(params.num_generations, params.num_validations);
        if fee > 0 {
            let mut allowance = state
                .allowances
                .entry((state.account, state.coordinator))
                .or_insert(0);
            if *allowance < fee {
                return Err(chain_error(format!(
                    "execution reverted: insufficient allowance ({} < {fee})",
                    *allowance
                )));
            }
            *allowance -= fee;
        }

        let task_id = state.next_task_id.fetch_add(1, Ordering::SeqCst);
        let block_number = self.chain.mine();
        state.tasks.insert(
            task_id,
            TaskRequest {
                requester: state.account,
                protocol: submission.protocol,
                parameters: params,
                status: TaskStatus::PendingGeneration,
                generator_fee: state.fees.generator_fee,
                validator_fee: state.fees.validator_fee,
                platform_fee: state.fees.platform_fee,
                input: submission.input,
                models: submission.models,
            },
        );
        let event = RequestEvent {
            task_id,
            requester: state.account,
            protocol: submission.protocol,
            block_number,
        };
        state.request_events.insert(task_id, event.clone());

        let update = StatusUpdate {
            task_id,
            protocol: submission.protocol,
            status_before: TaskStatus::None,
            status_after: TaskStatus::PendingGeneration,
        };
        let tx_hash = random_tx_hash();
        state.receipts.insert(
            tx_hash,
            Receipt {
                tx_hash,
                block_number,
                logs: vec![
                    CoordinatorEvent::StatusUpdate(update),
                    CoordinatorEvent::Request(event),
                ],
            },
        );
        state.submissions.fetch_add(1, Ordering::SeqCst);
        debug!(task_id, tx = %tx_hash, "task requested");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt> {
        self.chain
            .state
            .receipts
            .get(&tx_hash)
            .map(|r| r.clone())
            .ok_or_else(|| chain_error(format!("unknown transaction {tx_hash}")))
    }

    async fn get_request(&self, task_id: TaskId) -> Result<TaskRequest> {
        let state = self.state()?;
        Ok(state
            .tasks
            .get(&task_id)
            .map(|t| t.clone())
            .unwrap_or_default())
    }

    async fn get_responses(&self, task_id: TaskId) -> Result<Vec<TaskResponse>> {
        Ok(self
            .state()?
            .responses
            .get(&task_id)
            .map(|r| r.clone())
            .unwrap_or_default())
    }

    async fn get_best_response(&self, task_id: TaskId) -> Result<TaskResponse> {
        let responses = self.get_responses(task_id).await?;
        responses
            .into_iter()
            .reduce(|best, r| if r.score > best.score { r } else { best })
            .ok_or_else(|| chain_error(format!("execution reverted: no responses for task {task_id}")))
    }

    async fn get_validations(&self, task_id: TaskId) -> Result<Vec<TaskValidation>> {
        Ok(self
            .state()?
            .validations
            .get(&task_id)
            .map(|v| v.clone())
            .unwrap_or_default())
    }

    async fn status(&self, task_id: TaskId) -> Result<TaskStatus> {
        let state = self.state()?;
        state.status_reads.fetch_add(1, Ordering::SeqCst);
        Ok(state
            .tasks
            .get(&task_id)
            .map(|t| t.status)
            .unwrap_or_default())
    }

    async fn watch_status(&self, task_id: TaskId) -> Result<StatusSubscription> {
        let state = self.state()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let watch_id = state.next_watch_id.fetch_add(1, Ordering::SeqCst);
        state.watchers.insert(watch_id, (task_id, tx));

        let chain = self.chain.clone();
        Ok(StatusSubscription::new(task_id, rx, move || {
            chain.state.watchers.remove(&watch_id);
        }))
    }

    async fn request_events(&self, filter: EventFilter) -> Result<Vec<RequestEvent>> {
        let mut events: Vec<RequestEvent> = self
            .state()?
            .request_events
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        events.sort_by_key(|e| e.task_id);
        Ok(events)
    }
}

// ── Token handle ──────────────────────────────────────────────────────────────

struct MemoryToken {
    chain: MemoryChain,
    address: Address,
}

#[async_trait]
impl FeeToken for MemoryToken {
    fn address(&self) -> Address {
        self.address
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<Amount> {
        Ok(self
            .chain
            .state
            .allowances
            .get(&(owner, spender))
            .map(|a| *a)
            .unwrap_or(0))
    }

    async fn approve(&self, spender: Address, amount: Amount) -> Result<TxHash> {
        let state = &self.chain.state;
        if self.address != state.token {
            return Err(chain_error(format!("no token deployed at {}", self.address)));
        }
        state.allowances.insert((state.account, spender), amount);
        let block_number = self.chain.mine();
        let tx_hash = random_tx_hash();
        state.receipts.insert(
            tx_hash,
            Receipt {
                tx_hash,
                block_number,
                logs: Vec::new(),
            },
        );
        Ok(tx_hash)
    }
}
