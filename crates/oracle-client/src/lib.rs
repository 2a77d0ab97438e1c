//! oracle-client — storage indirection, request building, status tracking
//! and the `Oracle` facade over a coordinator.
//!
//! Network edges sit behind traits: `Storage` for overflow payloads and
//! `ChainClient`/`Coordinator`/`FeeToken` for the contract. In-memory
//! implementations of both live alongside the real ones.

pub mod arweave;
pub mod chain;
pub mod lifecycle;
pub mod memory_chain;
pub mod memory_storage;
pub mod oracle;
pub mod request;
pub mod router;
pub mod storage;

pub use arweave::{ArweaveKey, ArweaveStorage, ArweaveUploader};
pub use chain::{ChainClient, Coordinator, FeeToken, StatusSubscription};
pub use lifecycle::TaskLifecycle;
pub use memory_chain::{FeeSchedule, MemoryChain};
pub use memory_storage::MemoryStorage;
pub use oracle::{NewRequest, Oracle, ReadRequest, ReadResponse};
pub use request::{BuiltRequest, CompletionCheck, RequestOptions, TaskRequestBuilder};
pub use router::StorageRouter;
pub use storage::{Storage, StorageKey};
