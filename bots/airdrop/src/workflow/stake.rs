use crate::chain::Chain;
use crate::config::BotConfig;
use crate::workflow::{record_address, record_signer};
use anyhow::Result;
use core_logic::{KeyStore, WalletRecord};
use ethers::prelude::*;
use ethers::utils::format_ether;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info};

const SWEEP_GAS_LIMIT: u64 = 21_000;

/// Fixed sweep gas price: 5 gwei.
fn sweep_gas_price() -> U256 {
    U256::from(5u64) * U256::exp10(9)
}

/// Stakes the distributed token balance of each fully transferred wallet,
/// then forwards the wallet's leftover native balance to the next wallet in
/// id order (or back to the funding account for the last one).
///
/// A failure inside one iteration is logged and the loop moves on, so the
/// same wallet is retried on a later cycle. Failures selecting the next
/// wallet are structural and abort the workflow.
pub struct StakeWorkflow {
    chain: Arc<dyn Chain>,
    store: KeyStore,
    config: BotConfig,
}

impl StakeWorkflow {
    pub fn new(chain: Arc<dyn Chain>, store: KeyStore, config: BotConfig) -> Self {
        Self {
            chain,
            store,
            config,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let required = self.config.distribute.len() as i64;
        let token = self.config.staking_token_address()?;
        let staking_contract = self.config.staking_contract()?;
        let fallback = self.config.funding_address()?;

        loop {
            let candidate = self.store.next_eligible_for_staking(required).await?;
            let Some(mut record) = candidate else {
                info!("Staking complete.");
                break;
            };

            if let Err(e) = self
                .stake_one(&mut record, token, staking_contract, fallback)
                .await
            {
                error!("Staking {} failed: {:#}", record.address, e);
            }
            sleep(self.config.staking_pause()).await;
        }
        Ok(())
    }

    async fn stake_one(
        &self,
        record: &mut WalletRecord,
        token: Address,
        staking_contract: Address,
        fallback: Address,
    ) -> Result<()> {
        let owner = record_address(record)?;
        let signer = record_signer(record)?;

        let balance = self.chain.token_balance(token, owner).await?;
        debug!(
            "Balance: {} {} {}",
            record.address,
            format_ether(balance),
            self.config.staking_symbol
        );

        let allowance = self
            .chain
            .token_allowance(token, owner, staking_contract)
            .await?;
        if allowance < balance {
            let hash = self
                .chain
                .approve(token, staking_contract, balance, &signer)
                .await?;
            debug!("approve: hash={:?}", hash);
            sleep(self.config.post_pause()).await;
        }

        let hash = self.chain.deposit(balance, &signer).await?;
        debug!("deposit: hash={:?}", hash);
        record.staking_complete = true;
        self.store.update(record).await?;
        info!(
            "Staked {} {} for {}",
            format_ether(balance),
            self.config.staking_symbol,
            record.address
        );

        self.sweep(record, owner, &signer, fallback).await
    }

    /// Forward whatever native balance remains beyond the fixed transfer fee.
    async fn sweep(
        &self,
        record: &WalletRecord,
        owner: Address,
        signer: &LocalWallet,
        fallback: Address,
    ) -> Result<()> {
        let gas_price = sweep_gas_price();
        let fee = gas_price * U256::from(SWEEP_GAS_LIMIT);
        let balance = self.chain.native_balance(owner).await?;
        if balance <= fee {
            return Ok(());
        }

        let target = match self.store.next_after(record.id).await? {
            Some(next) => record_address(&next)?,
            None => fallback,
        };
        let hash = self
            .chain
            .send_native(target, balance - fee, gas_price, signer)
            .await?;
        debug!("sweep: {} -> {:?} hash={:?}", record.address, target, hash);
        Ok(())
    }
}
