//! Task types — read projections of coordinator state plus the request inputs.
//!
//! Every entity here mirrors a coordinator struct or event. The client reads
//! them and never mutates them; payload fields are generic so the same shape
//! carries raw `ContractBytes` off the chain and decoded strings afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::{Bytes32, ContractBytes};
use crate::error::{OracleError, Result};

/// Coordinator task identifier.
pub type TaskId = u64;

/// Token amount (fees, allowances).
pub type Amount = u128;

/// Task id standing for "no chat history". Always treated as completed.
pub const NO_HISTORY: TaskId = 0;

/// Default protocol tag stamped on requests.
pub const DEFAULT_PROTOCOL: &str = "oracle-rs-sdk/0.1.0";

// ── Hex identifiers ───────────────────────────────────────────────────────────

fn parse_fixed_hex<const N: usize>(text: &str) -> Result<[u8; N]> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    let raw = hex::decode(digits)
        .map_err(|e| OracleError::MalformedPayload(format!("invalid hex {text:?}: {e}")))?;
    raw.try_into().map_err(|raw: Vec<u8>| {
        OracleError::MalformedPayload(format!("expected {N} bytes, got {}", raw.len()))
    })
}

/// 20-byte account or contract address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self> {
        parse_fixed_hex(s).map(Address)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Transaction hash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for TxHash {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self> {
        parse_fixed_hex(s).map(TxHash)
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// ── Status ────────────────────────────────────────────────────────────────────

/// Task status as the coordinator stores it.
///
/// With validation:    None → PendingGeneration → PendingValidation → Completed
/// Without validation: None → PendingGeneration → Completed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TaskStatus {
    #[default]
    None = 0,
    PendingGeneration = 1,
    PendingValidation = 2,
    Completed = 3,
}

impl TaskStatus {
    /// The single legal successor, given how many validations the task asked for.
    /// `None` once the task is completed.
    pub fn next(self, num_validations: u64) -> Option<Self> {
        match self {
            Self::None => Some(Self::PendingGeneration),
            Self::PendingGeneration if num_validations == 0 => Some(Self::Completed),
            Self::PendingGeneration => Some(Self::PendingValidation),
            Self::PendingValidation => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    /// Whether `self → to` is an edge of the status graph. Validation may be
    /// skipped; nothing moves backwards and nothing leaves `Completed`.
    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        matches!(
            (self, to),
            (Self::None, Self::PendingGeneration)
                | (Self::PendingGeneration, Self::PendingValidation)
                | (Self::PendingGeneration, Self::Completed)
                | (Self::PendingValidation, Self::Completed)
        )
    }

    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }
}

// ── Parameters ────────────────────────────────────────────────────────────────

/// Largest value of a `uint40` field.
pub const MAX_UINT40: u64 = (1 << 40) - 1;

/// Per-task parameters. `num_generations` and `num_validations` are `uint40`
/// on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskParameters {
    pub difficulty: u8,
    pub num_generations: u64,
    pub num_validations: u64,
}

impl Default for TaskParameters {
    fn default() -> Self {
        Self {
            difficulty: 2,
            num_generations: 1,
            num_validations: 1,
        }
    }
}

/// Field-by-field overrides of `TaskParameters`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParameterOverrides {
    pub difficulty: Option<u8>,
    pub num_generations: Option<u64>,
    pub num_validations: Option<u64>,
}

impl From<TaskParameters> for TaskParameterOverrides {
    fn from(p: TaskParameters) -> Self {
        Self {
            difficulty: Some(p.difficulty),
            num_generations: Some(p.num_generations),
            num_validations: Some(p.num_validations),
        }
    }
}

impl TaskParameters {
    /// Apply overrides; an override wins where it is set.
    pub fn merged(&self, overrides: &TaskParameterOverrides) -> TaskParameters {
        TaskParameters {
            difficulty: overrides.difficulty.unwrap_or(self.difficulty),
            num_generations: overrides.num_generations.unwrap_or(self.num_generations),
            num_validations: overrides.num_validations.unwrap_or(self.num_validations),
        }
    }

    /// At least one generation, and both counts within `uint40`.
    pub fn validate(&self) -> Result<()> {
        if self.num_generations == 0 {
            return Err(OracleError::ZeroGenerations);
        }
        for (field, value) in [
            ("num_generations", self.num_generations),
            ("num_validations", self.num_validations),
        ] {
            if value > MAX_UINT40 {
                return Err(OracleError::ParameterOutOfRange { field, value });
            }
        }
        Ok(())
    }
}

// ── Models ────────────────────────────────────────────────────────────────────

/// Which models a responder may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestModels {
    /// `*`: any model of the responder.
    Any,
    /// `!`: the responder's first model.
    First,
    /// Explicit list, joined with `,` on-chain.
    List(Vec<String>),
}

impl RequestModels {
    pub fn list<I, T>(models: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::List(models.into_iter().map(Into::into).collect())
    }

    /// The string that goes on-chain.
    pub fn to_request_string(&self) -> Result<String> {
        match self {
            Self::Any => Ok("*".to_string()),
            Self::First => Ok("!".to_string()),
            Self::List(models) => {
                if models.is_empty() {
                    return Err(OracleError::InvalidModels("model list is empty".to_string()));
                }
                if let Some(bad) = models.iter().find(|m| m.is_empty() || m.contains(',')) {
                    return Err(OracleError::InvalidModels(format!(
                        "model name {bad:?} is empty or contains ','"
                    )));
                }
                Ok(models.join(","))
            }
        }
    }

    /// Inverse of `to_request_string`, for reading requests back.
    pub fn from_request_string(text: &str) -> Self {
        match text {
            "*" => Self::Any,
            "!" => Self::First,
            list => Self::List(list.split(',').map(str::to_string).collect()),
        }
    }
}

impl fmt::Display for RequestModels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::First => f.write_str("!"),
            Self::List(models) => f.write_str(&models.join(",")),
        }
    }
}

// ── Input ─────────────────────────────────────────────────────────────────────

/// Chat continuation: the output of `history_id` acts as conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistoryRequest {
    pub history_id: TaskId,
    pub content: String,
}

/// One entry of a chat output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistoryResponse {
    /// Usually `user`, `assistant` or `system`.
    pub role: String,
    pub content: String,
}

/// Request input: free-form text or a chat continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskInput {
    Text(String),
    Chat(ChatHistoryRequest),
}

impl From<&str> for TaskInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TaskInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<ChatHistoryRequest> for TaskInput {
    fn from(value: ChatHistoryRequest) -> Self {
        Self::Chat(value)
    }
}

// ── Coordinator projections ───────────────────────────────────────────────────

/// A task request. Fees are recorded per task in case the schedule changes
/// while it is in flight. Unknown task ids read back as the default value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest<P = ContractBytes, T = Bytes32, M = P> {
    /// Requesting address, also the fee payer.
    pub requester: Address,
    pub protocol: T,
    pub parameters: TaskParameters,
    pub status: TaskStatus,
    /// Paid to each generator per generation.
    pub generator_fee: Amount,
    /// Paid to each validator per validated generation.
    pub validator_fee: Amount,
    pub platform_fee: Amount,
    pub input: P,
    pub models: M,
}

/// A generation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResponse<P = ContractBytes> {
    pub responder: Address,
    /// Proof-of-work nonce.
    pub nonce: u128,
    /// Final validation score, 0 without validation.
    pub score: u128,
    pub output: P,
    pub metadata: P,
}

/// A validation of every generation of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskValidation<M = ContractBytes> {
    pub validator: Address,
    pub nonce: u128,
    /// One score per generation.
    pub scores: Vec<u128>,
    pub metadata: M,
}

/// Validator rationale for one generation, carried as JSON in validation
/// metadata. Scores range 1 (worst) to 5 (best).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationScores {
    pub helpfulness: f64,
    pub instruction_following: f64,
    pub truthfulness: f64,
    /// The score the coordinator actually uses.
    pub final_score: f64,
    pub rationale: String,
}

/// Arguments of the coordinator `request` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSubmission {
    pub protocol: Bytes32,
    pub input: ContractBytes,
    pub models: ContractBytes,
    pub parameters: TaskParameters,
}

// ── Events ────────────────────────────────────────────────────────────────────

/// `Request(taskId, requester, protocol)`, all indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEvent<T = Bytes32> {
    pub task_id: TaskId,
    pub requester: Address,
    pub protocol: T,
    pub block_number: u64,
}

/// `StatusUpdate(taskId, protocol, statusBefore, statusAfter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub task_id: TaskId,
    pub protocol: Bytes32,
    pub status_before: TaskStatus,
    pub status_after: TaskStatus,
}

/// Historical `Request` event query. Block bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub protocol: Option<Bytes32>,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
}

impl EventFilter {
    pub fn matches(&self, event: &RequestEvent) -> bool {
        self.protocol.map_or(true, |p| p == event.protocol)
            && self.from_block.map_or(true, |b| event.block_number >= b)
            && self.to_block.map_or(true, |b| event.block_number <= b)
    }
}

/// Coordinator log entries found in a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    Request(RequestEvent),
    StatusUpdate(StatusUpdate),
}

/// Confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub logs: Vec<CoordinatorEvent>,
}

impl Receipt {
    /// Task id of the first `Request` log.
    pub fn request_task_id(&self) -> Option<TaskId> {
        self.logs.iter().find_map(|log| match log {
            CoordinatorEvent::Request(event) => Some(event.task_id),
            _ => None,
        })
    }
}
