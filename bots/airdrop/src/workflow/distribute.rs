use crate::chain::Chain;
use crate::config::{AmountSpec, BotConfig};
use crate::workflow::record_address;
use anyhow::{Context, Result};
use core_logic::KeyStore;
use ethers::prelude::*;
use rand::rngs::OsRng;
use rand::Rng;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info};

/// Random amounts are stepped by half a whole token.
fn amount_step() -> U256 {
    U256::exp10(17) * 5u64
}

/// Distributes every configured token to all pending wallets in multi-send
/// batches, advancing each wallet's progress marker per completed round.
///
/// Any chain or store failure aborts the whole run. The markers of the failed
/// batch are untouched, so a re-run resumes where the last one stopped.
pub struct DistributeWorkflow {
    chain: Arc<dyn Chain>,
    store: KeyStore,
    config: BotConfig,
    funding: LocalWallet,
}

impl DistributeWorkflow {
    pub fn new(chain: Arc<dyn Chain>, store: KeyStore, config: BotConfig, funding: LocalWallet) -> Self {
        Self {
            chain,
            store,
            config,
            funding,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let multi_send = self.config.multi_send_address()?;
        let total_rounds = self.config.distribute.len();
        let gas_price = self.chain.gas_price().await?;
        debug!("Current gas price: {} wei", gas_price);

        for (i, token) in self.config.distribute.iter().enumerate() {
            let round = (i + 1) as i64;
            let token_addr = token.token_address()?;
            info!(
                "Distributing [{}] (round {}/{})",
                token.symbol, round, total_rounds
            );

            if let Some(addr) = token_addr {
                let hash = self
                    .chain
                    .approve(addr, multi_send, U256::MAX, &self.funding)
                    .await?;
                debug!("approve: hash={:?}", hash);
                sleep(self.config.post_pause()).await;
            }

            let (min_wei, max_wei) = amount_bounds(&token.amount)?;

            loop {
                let page = self
                    .store
                    .find_pending(round, self.config.per_request as i64)
                    .await?;
                if page.is_empty() {
                    break;
                }

                let mut recipients = Vec::with_capacity(page.len());
                let mut amounts = Vec::with_capacity(page.len());
                for record in &page {
                    recipients.push(record_address(record)?);
                    amounts.push(pick_amount(min_wei, max_wei));
                }

                let hash = self
                    .chain
                    .multi_send(token_addr, &recipients, &amounts, &self.funding)
                    .await?;
                debug!("multi_send: hash={:?}", hash);

                for mut record in page {
                    record.transfer_progress = round;
                    self.store.update(&record).await?;
                }
                info!("Distributed {} to {} wallets", token.symbol, recipients.len());
                sleep(self.config.post_pause()).await;
            }
        }
        Ok(())
    }
}

fn amount_bounds(amount: &AmountSpec) -> Result<(U256, U256)> {
    match amount {
        AmountSpec::Fixed(v) => {
            let wei = ethers::utils::parse_ether(*v).context("invalid fixed amount")?;
            Ok((wei, wei))
        }
        AmountSpec::Range(min, max) => {
            let min_wei = ethers::utils::parse_ether(*min).context("invalid minimum amount")?;
            let max_wei = ethers::utils::parse_ether(*max).context("invalid maximum amount")?;
            Ok((min_wei, max_wei))
        }
    }
}

/// Uniform pick from `[min, max)` on the step grid; a degenerate range
/// collapses to `min`.
fn pick_amount(min_wei: U256, max_wei: U256) -> U256 {
    if min_wei >= max_wei {
        return min_wei;
    }
    let step = amount_step();
    let span = max_wei - min_wei;
    let mut steps = (span / step).as_u64();
    if !(span % step).is_zero() {
        steps += 1;
    }
    let k = OsRng.gen_range(0..steps);
    min_wei + step * U256::from(k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenSpec;
    use crate::workflow::testing::{open_store, seed_wallets, test_config, FakeCall, FakeChain};

    fn native_token(amount: AmountSpec) -> TokenSpec {
        TokenSpec {
            address: String::new(),
            symbol: "NATIVE".into(),
            amount,
        }
    }

    fn erc20_token(address: &str, symbol: &str, amount: AmountSpec) -> TokenSpec {
        TokenSpec {
            address: address.into(),
            symbol: symbol.into(),
            amount,
        }
    }

    fn workflow(
        chain: Arc<FakeChain>,
        store: KeyStore,
        config: BotConfig,
    ) -> DistributeWorkflow {
        let funding: LocalWallet = config.main_account_key.parse().unwrap();
        DistributeWorkflow::new(chain, store, config, funding)
    }

    #[tokio::test]
    async fn three_wallets_batch_into_two_multi_sends() {
        let (store, _dir) = open_store().await;
        let wallets = seed_wallets(&store, 3).await;
        let chain = Arc::new(FakeChain::new());
        let config = test_config(2, vec![native_token(AmountSpec::Fixed(10.0))], "NATIVE");

        workflow(Arc::clone(&chain), store.clone(), config)
            .run()
            .await
            .unwrap();

        let sends = chain.multi_send_calls();
        assert_eq!(sends.len(), 2);
        let expected = ethers::utils::parse_ether(10.0).unwrap();
        match &sends[0] {
            FakeCall::MultiSend {
                token,
                recipients,
                amounts,
                ..
            } => {
                assert!(token.is_none());
                assert_eq!(recipients.len(), 2);
                assert_eq!(amounts, &vec![expected, expected]);
            }
            other => panic!("unexpected call: {:?}", other),
        }
        match &sends[1] {
            FakeCall::MultiSend { recipients, amounts, .. } => {
                assert_eq!(recipients.len(), 1);
                assert_eq!(amounts, &vec![expected]);
            }
            other => panic!("unexpected call: {:?}", other),
        }

        for (id, _) in &wallets {
            let record = store.find_by_id(*id).await.unwrap().unwrap();
            assert_eq!(record.transfer_progress, 1);
        }
    }

    #[tokio::test]
    async fn rerun_after_full_pass_sends_nothing() {
        let (store, _dir) = open_store().await;
        seed_wallets(&store, 3).await;
        let chain = Arc::new(FakeChain::new());
        let config = test_config(2, vec![native_token(AmountSpec::Fixed(10.0))], "NATIVE");

        let flow = workflow(Arc::clone(&chain), store.clone(), config);
        flow.run().await.unwrap();
        let after_first = chain.multi_send_calls().len();
        assert_eq!(after_first, 2);

        flow.run().await.unwrap();
        assert_eq!(chain.multi_send_calls().len(), after_first);
    }

    #[tokio::test]
    async fn erc20_round_approves_the_multi_send_contract_first() {
        let (store, _dir) = open_store().await;
        seed_wallets(&store, 2).await;
        let chain = Arc::new(FakeChain::new());
        let token = "0x00000000000000000000000000000000000000c1";
        let config = test_config(
            4,
            vec![erc20_token(token, "STK", AmountSpec::Fixed(2.0))],
            "STK",
        );

        workflow(Arc::clone(&chain), store.clone(), config)
            .run()
            .await
            .unwrap();

        let calls = chain.calls();
        let token_addr: Address = token.parse().unwrap();
        let spender: Address = crate::workflow::testing::MULTI_SEND.parse().unwrap();
        match &calls[0] {
            FakeCall::Approve {
                token,
                spender: s,
                amount,
                ..
            } => {
                assert_eq!(*token, token_addr);
                assert_eq!(*s, spender);
                assert_eq!(*amount, U256::MAX);
            }
            other => panic!("expected approve first, got {:?}", other),
        }
        match &calls[1] {
            FakeCall::MultiSend { token, .. } => assert_eq!(*token, Some(token_addr)),
            other => panic!("expected multi_send, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn second_round_advances_progress_to_two() {
        let (store, _dir) = open_store().await;
        let wallets = seed_wallets(&store, 3).await;
        let chain = Arc::new(FakeChain::new());
        let config = test_config(
            2,
            vec![
                native_token(AmountSpec::Fixed(10.0)),
                erc20_token("0x00000000000000000000000000000000000000c1", "STK", AmountSpec::Fixed(1.0)),
            ],
            "STK",
        );

        workflow(Arc::clone(&chain), store.clone(), config)
            .run()
            .await
            .unwrap();

        // One approve plus two batches per round.
        assert_eq!(chain.multi_send_calls().len(), 4);
        for (id, _) in &wallets {
            let record = store.find_by_id(*id).await.unwrap().unwrap();
            assert_eq!(record.transfer_progress, 2);
        }
    }

    #[tokio::test]
    async fn batches_never_exceed_per_request_and_stay_aligned() {
        let (store, _dir) = open_store().await;
        seed_wallets(&store, 7).await;
        let chain = Arc::new(FakeChain::new());
        let config = test_config(3, vec![native_token(AmountSpec::Range(1.0, 5.0))], "NATIVE");

        workflow(Arc::clone(&chain), store.clone(), config)
            .run()
            .await
            .unwrap();

        let sends = chain.multi_send_calls();
        assert_eq!(sends.len(), 3);
        let min = ethers::utils::parse_ether(1.0).unwrap();
        let max = ethers::utils::parse_ether(5.0).unwrap();
        for call in &sends {
            let FakeCall::MultiSend { recipients, amounts, .. } = call else {
                panic!("unexpected call");
            };
            assert_eq!(recipients.len(), amounts.len());
            assert!(recipients.len() <= 3);
            for amount in amounts {
                assert!(*amount >= min && *amount < max);
            }
        }
    }

    #[tokio::test]
    async fn failed_batch_aborts_and_leaves_markers_untouched() {
        let (store, _dir) = open_store().await;
        let wallets = seed_wallets(&store, 3).await;
        let chain = Arc::new(FakeChain::new());
        chain.fail_next_multi_send();
        let config = test_config(2, vec![native_token(AmountSpec::Fixed(10.0))], "NATIVE");

        let result = workflow(Arc::clone(&chain), store.clone(), config)
            .run()
            .await;
        assert!(result.is_err());
        assert!(chain.multi_send_calls().is_empty());
        for (id, _) in &wallets {
            let record = store.find_by_id(*id).await.unwrap().unwrap();
            assert_eq!(record.transfer_progress, 0);
        }
    }

    #[test]
    fn degenerate_range_collapses_to_fixed_amount() {
        let wei = ethers::utils::parse_ether(3.0).unwrap();
        assert_eq!(pick_amount(wei, wei), wei);
    }

    #[test]
    fn random_amounts_land_on_the_step_grid() {
        let min = ethers::utils::parse_ether(1.0).unwrap();
        let max = ethers::utils::parse_ether(4.0).unwrap();
        for _ in 0..50 {
            let amount = pick_amount(min, max);
            assert!(amount >= min && amount < max);
            assert!(((amount - min) % amount_step()).is_zero());
        }
    }
}
