use core_logic::{GenerationError, KeyStore};
use ethers::prelude::*;
use ethers::utils::to_checksum;
use rand::rngs::OsRng;
use tracing::info;

/// Creates `count` fresh wallets and persists them.
pub struct GenerateWorkflow {
    store: KeyStore,
    count: u32,
}

impl GenerateWorkflow {
    pub fn new(store: KeyStore, count: u32) -> Self {
        Self { store, count }
    }

    /// Rows inserted before a failure stay in place; there is no rollback.
    pub async fn run(&self) -> Result<u32, GenerationError> {
        info!("Generating {} wallets...", self.count);
        for i in 0..self.count {
            let wallet = LocalWallet::new(&mut OsRng);
            let address = to_checksum(&wallet.address(), None);
            let key = format!("0x{}", hex::encode(wallet.signer().to_bytes()));
            self.store
                .insert(&address, &key)
                .await
                .map_err(|e| GenerationError::Keypair {
                    index: i,
                    total: self.count,
                    reason: e.to_string(),
                })?;
        }
        info!("Generated {} wallets.", self.count);
        Ok(self.count)
    }
}
