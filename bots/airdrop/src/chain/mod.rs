//! Chain client adapter.
//!
//! [`Chain`] is the seam between the workflows and the RPC endpoint: the
//! production implementation [`EvmChain`] signs and submits real
//! transactions, tests substitute a recording fake. Every submit fetches the
//! signer's pending nonce, so transactions for one signer must stay
//! serialized.

mod abi;

use async_trait::async_trait;
use core_logic::{ChainError, RpcError, TransactionError};
use ethers::abi::Abi;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use tracing::debug;

#[async_trait]
pub trait Chain: Send + Sync {
    async fn gas_price(&self) -> Result<U256, ChainError>;

    async fn native_balance(&self, address: Address) -> Result<U256, ChainError>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError>;

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError>;

    /// Authorize `spender` to move up to `amount` of `token` held by the
    /// signer.
    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
        signer: &LocalWallet,
    ) -> Result<H256, ChainError>;

    /// One multi-send transaction covering the whole batch. `token` of `None`
    /// distributes the native coin; the summed amounts ride in the value
    /// field.
    async fn multi_send(
        &self,
        token: Option<Address>,
        recipients: &[Address],
        amounts: &[U256],
        signer: &LocalWallet,
    ) -> Result<H256, ChainError>;

    /// Deposit `amount` into the staking contract on behalf of the signer.
    async fn deposit(&self, amount: U256, signer: &LocalWallet) -> Result<H256, ChainError>;

    /// Plain native-coin transfer at a caller-chosen gas price.
    async fn send_native(
        &self,
        to: Address,
        amount: U256,
        gas_price: U256,
        signer: &LocalWallet,
    ) -> Result<H256, ChainError>;
}

/// Production adapter over an HTTP JSON-RPC endpoint.
pub struct EvmChain {
    provider: Provider<Http>,
    endpoint: String,
    chain_id: u64,
    multi_send_addr: Address,
    staking_addr: Address,
    multi_send: BaseContract,
    erc20: BaseContract,
    staking: BaseContract,
}

impl EvmChain {
    pub const GAS_LIMIT_TRANSFER: u64 = 21_000;

    pub fn new(
        rpc_url: &str,
        chain_id: u64,
        multi_send_addr: Address,
        staking_addr: Address,
    ) -> anyhow::Result<Self> {
        use anyhow::Context;

        let provider = Provider::<Http>::try_from(rpc_url).context("Invalid RPC endpoint")?;
        let multi_send = BaseContract::from(
            serde_json::from_str::<Abi>(abi::MULTI_SEND).context("MultiSend ABI")?,
        );
        let erc20 =
            BaseContract::from(serde_json::from_str::<Abi>(abi::ERC20).context("ERC20 ABI")?);
        let staking = BaseContract::from(
            serde_json::from_str::<Abi>(abi::ERC20_STAKING).context("ERC20Staking ABI")?,
        );

        Ok(Self {
            provider,
            endpoint: rpc_url.to_string(),
            chain_id,
            multi_send_addr,
            staking_addr,
            multi_send,
            erc20,
            staking,
        })
    }

    fn rpc_err<E: std::fmt::Display>(&self, e: E) -> ChainError {
        ChainError::Rpc(RpcError::Request {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })
    }

    fn abi_err<E: std::fmt::Display>(&self, e: E) -> ChainError {
        ChainError::Rpc(RpcError::InvalidResponse {
            endpoint: self.endpoint.clone(),
            reason: format!("abi: {}", e),
        })
    }

    async fn call_view(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        self.provider
            .call(&tx, None)
            .await
            .map_err(|e| self.rpc_err(e))
    }

    /// Build a legacy transaction with the current gas price (unless pinned by
    /// the caller) and the signer's pending nonce, sign, submit and wait for
    /// the receipt.
    async fn submit(
        &self,
        to: Address,
        data: Option<Bytes>,
        value: Option<U256>,
        gas_price: Option<U256>,
        gas_limit: Option<U256>,
        signer: &LocalWallet,
    ) -> Result<H256, ChainError> {
        let from = signer.address();

        let gas_price = match gas_price {
            Some(price) => price,
            None => self
                .provider
                .get_gas_price()
                .await
                .map_err(|e| self.rpc_err(e))?,
        };
        let nonce = self
            .provider
            .get_transaction_count(from, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| self.rpc_err(e))?;

        let mut tx = TransactionRequest::new()
            .from(from)
            .to(to)
            .gas_price(gas_price)
            .nonce(nonce);
        if let Some(data) = data {
            tx = tx.data(data);
        }
        if let Some(value) = value {
            tx = tx.value(value);
        }
        if let Some(gas_limit) = gas_limit {
            tx = tx.gas(gas_limit);
        }

        let wallet = signer.clone().with_chain_id(self.chain_id);
        let client = SignerMiddleware::new(self.provider.clone(), wallet);
        let pending = client
            .send_transaction(tx, None)
            .await
            .map_err(|e| self.rpc_err(e))?;
        let tx_hash = pending.tx_hash();
        debug!("tx submitted: hash={:?} nonce={}", tx_hash, nonce);

        let receipt = pending
            .await
            .map_err(|e| self.rpc_err(e))?
            .ok_or_else(|| TransactionError::Dropped {
                hash: format!("{:?}", tx_hash),
            })?;

        if receipt.status == Some(U64::from(1)) {
            Ok(receipt.transaction_hash)
        } else {
            Err(TransactionError::Reverted {
                hash: format!("{:?}", receipt.transaction_hash),
            }
            .into())
        }
    }
}

#[async_trait]
impl Chain for EvmChain {
    async fn gas_price(&self) -> Result<U256, ChainError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| self.rpc_err(e))
    }

    async fn native_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(|e| self.rpc_err(e))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        let data = self
            .erc20
            .encode("balanceOf", owner)
            .map_err(|e| self.abi_err(e))?;
        let raw = self.call_view(token, data).await?;
        self.erc20
            .decode_output("balanceOf", raw)
            .map_err(|e| self.abi_err(e))
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        let data = self
            .erc20
            .encode("allowance", (owner, spender))
            .map_err(|e| self.abi_err(e))?;
        let raw = self.call_view(token, data).await?;
        self.erc20
            .decode_output("allowance", raw)
            .map_err(|e| self.abi_err(e))
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
        signer: &LocalWallet,
    ) -> Result<H256, ChainError> {
        let data = self
            .erc20
            .encode("approve", (spender, amount))
            .map_err(|e| self.abi_err(e))?;
        self.submit(token, Some(data), None, None, None, signer).await
    }

    async fn multi_send(
        &self,
        token: Option<Address>,
        recipients: &[Address],
        amounts: &[U256],
        signer: &LocalWallet,
    ) -> Result<H256, ChainError> {
        let data = self
            .multi_send
            .encode(
                "multi_send_token",
                (
                    token.unwrap_or_else(Address::zero),
                    recipients.to_vec(),
                    amounts.to_vec(),
                ),
            )
            .map_err(|e| self.abi_err(e))?;

        // Native distribution carries the batch total in the value field.
        let value = match token {
            Some(_) => None,
            None => Some(amounts.iter().copied().fold(U256::zero(), |acc, a| acc + a)),
        };
        self.submit(self.multi_send_addr, Some(data), value, None, None, signer)
            .await
    }

    async fn deposit(&self, amount: U256, signer: &LocalWallet) -> Result<H256, ChainError> {
        let data = self
            .staking
            .encode("deposit", amount)
            .map_err(|e| self.abi_err(e))?;
        self.submit(self.staking_addr, Some(data), None, None, None, signer)
            .await
    }

    async fn send_native(
        &self,
        to: Address,
        amount: U256,
        gas_price: U256,
        signer: &LocalWallet,
    ) -> Result<H256, ChainError> {
        self.submit(
            to,
            None,
            Some(amount),
            Some(gas_price),
            Some(U256::from(Self::GAS_LIMIT_TRANSFER)),
            signer,
        )
        .await
    }
}
