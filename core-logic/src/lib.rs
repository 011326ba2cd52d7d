//! # Core Logic - Shared Utilities for the Airdrop Bot
//!
//! Chain-agnostic pieces shared by the bot binaries: the persisted wallet
//! key store, the error taxonomy, and logging setup.
//!
//! ## Modules
//!
//! - [`database`] - Async SQLite wallet key store with connection pooling
//! - [`error`] - Typed error handling with thiserror
//! - [`utils`] - Logging setup

pub mod database;
pub mod error;
pub(crate) mod utils;

pub use database::{KeyStore, WalletRecord};
pub use error::{
    ChainError, ConfigError, GenerationError, RpcError, StoreError, TransactionError,
};

pub use utils::setup_logger;
