//! oracle-core — byte codec, on-chain task projections, errors and configuration.
//! The async client crate and the CLI both depend on this one.

pub mod codec;
pub mod config;
pub mod error;
pub mod types;

pub use codec::{Bytes32, ContractBytes};
pub use error::{OracleError, Result};
pub use types::{
    Address, Amount, ChatHistoryRequest, ChatHistoryResponse, CoordinatorEvent, EventFilter,
    Receipt, RequestEvent, RequestModels, StatusUpdate, TaskId, TaskInput, TaskParameterOverrides,
    TaskParameters, TaskRequest, TaskResponse, TaskStatus, TaskSubmission, TaskValidation, TxHash,
    ValidationScores, DEFAULT_PROTOCOL, MAX_UINT40, NO_HISTORY,
};
