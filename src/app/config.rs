// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants;
use crate::domain::error::AppError;
use crate::domain::types::MiningEconomics;
use crate::network::ledger::ContractAddresses;
use alloy::primitives::Address;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalSettings {
    // General
    #[serde(default = "default_false")]
    pub debug: bool,
    #[serde(default = "default_false")]
    pub log_json: bool,

    // Identity
    #[serde(default)]
    pub wallet_key: String,
    /// Optional cross-check against the address derived from `wallet_key`.
    pub wallet_address: Option<Address>,

    // Ledger
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    pub mining_engine_address: Option<Address>,
    pub game_manager_address: Option<Address>,
    pub miner_nft_address: Option<Address>,

    // Scheduling
    #[serde(default = "default_cadence_ms")]
    pub cadence_ms: u64,
    #[serde(default = "default_true")]
    pub auto_optimize: bool,
    #[serde(default = "default_fee_poll_secs")]
    pub fee_poll_secs: u64,
    #[serde(default = "default_round_poll_secs")]
    pub round_poll_secs: u64,

    // Economics
    #[serde(default = "default_gas_estimate")]
    pub gas_estimate: u64,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_priority_fee_gwei")]
    pub priority_fee_gwei: u64,
    #[serde(default = "default_reward_per_success")]
    pub reward_per_success: f64,
    #[serde(default = "default_reward_value_native")]
    pub reward_value_native: f64,

    // Receipts
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,

    // Control API
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    #[serde(default = "default_control_bind")]
    pub control_bind: String,
}

fn default_false() -> bool {
    false
}
fn default_true() -> bool {
    true
}
fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}
fn default_cadence_ms() -> u64 {
    constants::DEFAULT_CADENCE_MS
}
fn default_fee_poll_secs() -> u64 {
    constants::DEFAULT_FEE_POLL_SECS
}
fn default_round_poll_secs() -> u64 {
    constants::DEFAULT_ROUND_POLL_SECS
}
fn default_gas_estimate() -> u64 {
    constants::DEFAULT_GAS_ESTIMATE
}
fn default_gas_limit() -> u64 {
    constants::DEFAULT_GAS_LIMIT
}
fn default_priority_fee_gwei() -> u64 {
    constants::DEFAULT_PRIORITY_FEE_GWEI
}
fn default_reward_per_success() -> f64 {
    constants::DEFAULT_REWARD_PER_SUCCESS
}
fn default_reward_value_native() -> f64 {
    constants::DEFAULT_REWARD_VALUE_NATIVE
}
fn default_receipt_poll_ms() -> u64 {
    constants::DEFAULT_RECEIPT_POLL_MS
}
fn default_receipt_timeout_ms() -> u64 {
    constants::DEFAULT_RECEIPT_TIMEOUT_MS
}
fn default_control_port() -> u16 {
    constants::DEFAULT_CONTROL_PORT
}
fn default_control_bind() -> String {
    "127.0.0.1".to_string()
}

impl GlobalSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(selected) = path {
            builder = builder.add_source(File::from(Path::new(selected)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // CLI (in main) > env/.env > file.
        builder = builder.add_source(Environment::default().try_parsing(true));

        let settings: GlobalSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load() -> Result<Self, AppError> {
        Self::load_with_path(None)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(constants::MIN_CADENCE_MS..=constants::MAX_CADENCE_MS).contains(&self.cadence_ms) {
            return Err(AppError::Validation {
                field: "cadence_ms".into(),
                message: format!(
                    "{} outside {}..={}",
                    self.cadence_ms,
                    constants::MIN_CADENCE_MS,
                    constants::MAX_CADENCE_MS
                ),
            });
        }
        for (field, value) in [
            ("fee_poll_secs", self.fee_poll_secs),
            ("round_poll_secs", self.round_poll_secs),
            ("gas_limit", self.gas_limit),
        ] {
            if value == 0 {
                return Err(AppError::Validation {
                    field: field.into(),
                    message: "must be positive".into(),
                });
            }
        }
        if !self.reward_per_success.is_finite() || !self.reward_value_native.is_finite() {
            return Err(AppError::Validation {
                field: "reward_per_success".into(),
                message: "reward values must be finite".into(),
            });
        }
        self.control_bind_value()?;
        Ok(())
    }

    /// Live mode needs a signer, an endpoint and all three contracts.
    pub fn require_live(&self) -> Result<ContractAddresses, AppError> {
        if self.wallet_key.trim().is_empty() {
            return Err(AppError::Config("WALLET_KEY is missing".to_string()));
        }
        self.rpc_url_value()?;
        let missing = |name: &str| AppError::Config(format!("{name} is missing"));
        Ok(ContractAddresses {
            game_manager: self
                .game_manager_address
                .ok_or_else(|| missing("GAME_MANAGER_ADDRESS"))?,
            miner_nft: self.miner_nft_address.ok_or_else(|| missing("MINER_NFT_ADDRESS"))?,
            mining_engine: self
                .mining_engine_address
                .ok_or_else(|| missing("MINING_ENGINE_ADDRESS"))?,
        })
    }

    pub fn rpc_url_value(&self) -> Result<Url, AppError> {
        Url::parse(self.rpc_url.trim())
            .map_err(|e| AppError::Config(format!("Invalid RPC_URL {}: {}", self.rpc_url, e)))
    }

    pub fn control_bind_value(&self) -> Result<IpAddr, AppError> {
        IpAddr::from_str(self.control_bind.trim()).map_err(|e| AppError::Validation {
            field: "control_bind".into(),
            message: format!("{}: {}", self.control_bind, e),
        })
    }

    pub fn fee_poll_interval(&self) -> Duration {
        Duration::from_secs(self.fee_poll_secs.max(1))
    }

    pub fn round_poll_interval(&self) -> Duration {
        Duration::from_secs(self.round_poll_secs.max(1))
    }

    pub fn receipt_poll_ms_value(&self) -> u64 {
        self.receipt_poll_ms.max(100)
    }

    pub fn receipt_timeout_ms_value(&self) -> u64 {
        self.receipt_timeout_ms.max(self.receipt_poll_ms_value())
    }

    pub fn economics(&self) -> MiningEconomics {
        MiningEconomics {
            reward_per_success: self.reward_per_success,
            reward_value_native: self.reward_value_native,
            gas_estimate: self.gas_estimate,
            gas_limit: self.gas_limit,
            priority_fee_wei: self.priority_fee_gwei as u128 * constants::WEI_PER_GWEI,
        }
    }
}
