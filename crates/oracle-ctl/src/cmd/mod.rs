//! CLI command modules.

pub mod codec;
pub mod config;
pub mod storage;
