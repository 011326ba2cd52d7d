use anyhow::Result;
use config::{Config, File};
use core_logic::ConfigError;
use ethers::types::Address;
use serde::Deserialize;
use std::time::Duration;

/// Validated bot configuration, loaded from a JSON file.
///
/// The funding key can be overridden with the `MAIN_ACCOUNT_KEY` environment
/// variable so it does not have to live in the config file.
#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    pub chain_rpc: String,
    pub chain_id: u64,
    pub database: DatabaseConfig,
    pub main_account: String,
    pub main_account_key: String,
    pub contracts: ContractsConfig,
    pub distribute: Vec<TokenSpec>,
    pub account_count: u32,
    pub per_request: u32,
    /// Pause between consecutive transactions, in seconds.
    pub post_interval: u64,
    /// Pause between staking iterations, in seconds.
    pub staking_interval: u64,
    pub staking_symbol: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContractsConfig {
    #[serde(rename = "MultiSend")]
    pub multi_send: String,
    #[serde(rename = "ERC20Staking")]
    pub erc20_staking: String,
}

/// One entry of the ordered distribution list. An empty `address` means the
/// chain's native coin.
#[derive(Debug, Deserialize, Clone)]
pub struct TokenSpec {
    #[serde(default)]
    pub address: String,
    pub symbol: String,
    pub amount: AmountSpec,
}

/// Per-wallet amount: a fixed value, or `[min, max]` picked uniformly at
/// random (max exclusive), in whole tokens.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(untagged)]
pub enum AmountSpec {
    Fixed(f64),
    Range(f64, f64),
}

impl TokenSpec {
    pub fn is_native(&self) -> bool {
        self.address.trim().is_empty()
    }

    /// `None` for the native coin, the parsed contract address otherwise.
    pub fn token_address(&self) -> Result<Option<Address>, ConfigError> {
        if self.is_native() {
            Ok(None)
        } else {
            parse_address(&self.address, "distribute.address").map(Some)
        }
    }
}

impl BotConfig {
    pub fn load(path: &str) -> Result<Self> {
        if !std::path::Path::new(path).exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string(),
            }
            .into());
        }

        let settings = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        let mut config: BotConfig = settings
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!(e))?;

        if let Ok(key) = std::env::var("MAIN_ACCOUNT_KEY") {
            config.main_account_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    /// Fail-fast field validation, run once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_rpc.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "chain_rpc".into(),
            });
        }
        if !self.chain_rpc.starts_with("http") {
            return Err(ConfigError::InvalidValue {
                field: "chain_rpc".into(),
                reason: "expected an http(s) endpoint".into(),
            });
        }
        if self.chain_id == 0 {
            return Err(ConfigError::InvalidValue {
                field: "chain_id".into(),
                reason: "must be non-zero".into(),
            });
        }
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "database.path".into(),
            });
        }
        parse_address(&self.main_account, "main_account")?;
        if self.main_account_key.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "main_account_key".into(),
            });
        }
        parse_address(&self.contracts.multi_send, "contracts.MultiSend")?;
        parse_address(&self.contracts.erc20_staking, "contracts.ERC20Staking")?;
        if self.account_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "account_count".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.per_request == 0 {
            return Err(ConfigError::InvalidValue {
                field: "per_request".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.distribute.is_empty() {
            return Err(ConfigError::MissingField {
                field: "distribute".into(),
            });
        }

        for (i, token) in self.distribute.iter().enumerate() {
            if token.symbol.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: format!("distribute[{}].symbol", i),
                });
            }
            if !token.is_native() {
                parse_address(&token.address, &format!("distribute[{}].address", i))?;
            }
            match token.amount {
                AmountSpec::Fixed(v) => {
                    if v <= 0.0 {
                        return Err(ConfigError::InvalidValue {
                            field: format!("distribute[{}].amount", i),
                            reason: "must be positive".into(),
                        });
                    }
                }
                AmountSpec::Range(min, max) => {
                    if min < 0.0 || min >= max {
                        return Err(ConfigError::InvalidValue {
                            field: format!("distribute[{}].amount", i),
                            reason: "range minimum must be non-negative and below maximum".into(),
                        });
                    }
                }
            }
        }

        let staking = self
            .distribute
            .iter()
            .find(|t| t.symbol == self.staking_symbol)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "staking_symbol".into(),
                reason: format!("'{}' does not name a distribute entry", self.staking_symbol),
            })?;
        if staking.is_native() {
            return Err(ConfigError::InvalidValue {
                field: "staking_symbol".into(),
                reason: "staking token must be an ERC20 contract".into(),
            });
        }

        Ok(())
    }

    pub fn multi_send_address(&self) -> Result<Address, ConfigError> {
        parse_address(&self.contracts.multi_send, "contracts.MultiSend")
    }

    pub fn staking_contract(&self) -> Result<Address, ConfigError> {
        parse_address(&self.contracts.erc20_staking, "contracts.ERC20Staking")
    }

    pub fn funding_address(&self) -> Result<Address, ConfigError> {
        parse_address(&self.main_account, "main_account")
    }

    /// The ERC20 address of the configured staking token.
    pub fn staking_token_address(&self) -> Result<Address, ConfigError> {
        let token = self
            .distribute
            .iter()
            .find(|t| t.symbol == self.staking_symbol)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "staking_symbol".into(),
                reason: format!("'{}' does not name a distribute entry", self.staking_symbol),
            })?;
        parse_address(&token.address, "staking_symbol")
    }

    pub fn post_pause(&self) -> Duration {
        Duration::from_secs(self.post_interval)
    }

    pub fn staking_pause(&self) -> Duration {
        Duration::from_secs(self.staking_interval)
    }
}

fn parse_address(value: &str, field: &str) -> Result<Address, ConfigError> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: e.to_string(),
        })
}
