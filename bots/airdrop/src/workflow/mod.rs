//! The three orchestration workflows: generate, distribute, stake.

pub mod distribute;
pub mod generate;
pub mod stake;

pub use distribute::DistributeWorkflow;
pub use generate::GenerateWorkflow;
pub use stake::StakeWorkflow;

use anyhow::{Context, Result};
use core_logic::WalletRecord;
use ethers::prelude::*;

pub(crate) fn record_address(record: &WalletRecord) -> Result<Address> {
    record
        .address
        .parse()
        .with_context(|| format!("stored address '{}' is not parseable", record.address))
}

pub(crate) fn record_signer(record: &WalletRecord) -> Result<LocalWallet> {
    record
        .private_key
        .parse()
        .with_context(|| format!("stored key for '{}' is not parseable", record.address))
}
