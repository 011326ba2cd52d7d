//! # Core Error Types
//!
//! Centralized error definitions for the airdrop bot.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Configuration-related errors, raised fail-fast at startup.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}

/// Wallet keypair creation failure during the generate workflow.
///
/// Rows written before the failing index stay in the store; there is no
/// transactional rollback.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("keypair {index} of {total} could not be created: {reason}")]
    Keypair {
        index: u32,
        total: u32,
        reason: String,
    },
}

/// Network-level failures talking to the chain RPC endpoint.
#[derive(Error, Debug, Clone)]
pub enum RpcError {
    #[error("rpc request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    #[error("invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

/// A submitted transaction that did not land successfully.
#[derive(Error, Debug, Clone)]
pub enum TransactionError {
    #[error("transaction {hash} was mined with failure status")]
    Reverted { hash: String },

    #[error("transaction {hash} was dropped before inclusion")]
    Dropped { hash: String },
}

/// Union error returned by chain submissions: either the transport failed or
/// the transaction itself did.
#[derive(Error, Debug, Clone)]
pub enum ChainError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// Key store (SQLite) operation errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database connection failed: {msg}")]
    Connection { msg: String },

    #[error("query failed: {msg}")]
    Query { msg: String },

    #[error("I/O error writing {path}: {msg}")]
    Io { path: String, msg: String },
}
