// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Ledger collaborator: the GameManager / MinerNFT / MiningEngine contracts.
//!
//! The core only talks to the [`Ledger`] trait. [`EvmLedger`] is the live
//! implementation backed by an alloy provider with the operator signer attached.

use crate::common::error::LedgerError;
use crate::domain::types::{CandidateStats, MinerClass, Pattern, RoundState, rate_from_bps};
use crate::infrastructure::data::contracts::{IGameManager, IMinerNFT, IMiningEngine};
use crate::network::provider::WalletProvider;
use alloy::primitives::{Address, B256, Log, U256};
use alloy::providers::Provider;
use async_trait::async_trait;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Handle to a submitted, not yet finalized action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAction {
    pub tx_hash: B256,
    pub candidate_id: u64,
}

/// Receipt data the outcome processor needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedRecord {
    pub tx_hash: B256,
    pub gas_used: u64,
    pub effective_gas_price: u128,
    pub block_number: Option<u64>,
    pub logs: Vec<Log>,
}

impl FinalizedRecord {
    pub fn cost_wei(&self) -> u128 {
        (self.gas_used as u128).saturating_mul(self.effective_gas_price)
    }
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Operator address, `None` when no wallet is connected.
    fn actor(&self) -> Option<Address>;
    async fn read_round(&self) -> Result<RoundState, LedgerError>;
    async fn read_owned_candidates(&self) -> Result<Vec<u64>, LedgerError>;
    async fn read_candidate_stats(&self, candidate_id: u64) -> Result<CandidateStats, LedgerError>;
    async fn read_effective_success_rate(
        &self,
        candidate_id: u64,
        pattern: Pattern,
    ) -> Result<f64, LedgerError>;
    async fn read_current_fee_price(&self) -> Result<u128, LedgerError>;
    async fn submit_action(&self, candidate_id: u64, fee_bid: u128) -> Result<PendingAction, LedgerError>;
    async fn await_finalization(&self, pending: PendingAction) -> Result<FinalizedRecord, LedgerError>;
}

pub type SharedLedger = Arc<dyn Ledger>;

#[derive(Debug, Clone, Copy)]
pub struct ContractAddresses {
    pub game_manager: Address,
    pub miner_nft: Address,
    pub mining_engine: Address,
}

pub struct EvmLedger {
    provider: WalletProvider,
    operator: Address,
    contracts: ContractAddresses,
    gas_limit: u64,
    receipt_poll: Duration,
    receipt_timeout: Duration,
}

impl EvmLedger {
    pub fn new(
        provider: WalletProvider,
        operator: Address,
        contracts: ContractAddresses,
        gas_limit: u64,
        receipt_poll: Duration,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            operator,
            contracts,
            gas_limit,
            receipt_poll,
            receipt_timeout,
        }
    }
}

fn read_error(err: impl Display) -> LedgerError {
    let message = err.to_string();
    if message.to_ascii_lowercase().contains("revert") {
        LedgerError::Rejected(message)
    } else {
        LedgerError::Transport(message)
    }
}

fn u256_to_u64(value: U256, field: &str) -> Result<u64, LedgerError> {
    u64::try_from(value).map_err(|_| LedgerError::Decode(format!("{field} does not fit in u64: {value}")))
}

#[async_trait]
impl Ledger for EvmLedger {
    fn actor(&self) -> Option<Address> {
        Some(self.operator)
    }

    async fn read_round(&self) -> Result<RoundState, LedgerError> {
        let manager = IGameManager::new(self.contracts.game_manager, self.provider.clone());
        let round = manager.getCurrentRound().call().await.map_err(read_error)?;
        Ok(RoundState {
            round_id: u256_to_u64(round.roundId, "roundId")?,
            pattern: Pattern::from_code(round.pattern),
            range_min: u256_to_u64(round.minRange, "minRange")?,
            range_max: u256_to_u64(round.maxRange, "maxRange")?,
        })
    }

    async fn read_owned_candidates(&self) -> Result<Vec<u64>, LedgerError> {
        let nft = IMinerNFT::new(self.contracts.miner_nft, self.provider.clone());
        let owned = nft
            .getOwnedMiners(self.operator)
            .call()
            .await
            .map_err(read_error)?;
        owned
            .into_iter()
            .map(|id| u256_to_u64(id, "nftId"))
            .collect()
    }

    async fn read_candidate_stats(&self, candidate_id: u64) -> Result<CandidateStats, LedgerError> {
        let engine = IMiningEngine::new(self.contracts.mining_engine, self.provider.clone());
        let stats = engine
            .getMinerStats(U256::from(candidate_id))
            .call()
            .await
            .map_err(read_error)?;
        Ok(CandidateStats {
            name: stats.name,
            class: MinerClass::from_code(stats.minerType),
            base_success_rate: rate_from_bps(stats.baseSuccessRate),
        })
    }

    async fn read_effective_success_rate(
        &self,
        candidate_id: u64,
        pattern: Pattern,
    ) -> Result<f64, LedgerError> {
        let engine = IMiningEngine::new(self.contracts.mining_engine, self.provider.clone());
        let bps = engine
            .calculateEffectiveSuccessRate(U256::from(candidate_id), pattern.code())
            .call()
            .await
            .map_err(read_error)?;
        Ok(rate_from_bps(bps))
    }

    async fn read_current_fee_price(&self) -> Result<u128, LedgerError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| LedgerError::Transport(format!("gas price fetch failed: {e}")))
    }

    async fn submit_action(&self, candidate_id: u64, fee_bid: u128) -> Result<PendingAction, LedgerError> {
        let engine = IMiningEngine::new(self.contracts.mining_engine, self.provider.clone());
        let pending = engine
            .attemptMining(U256::from(candidate_id))
            .gas(self.gas_limit)
            .gas_price(fee_bid)
            .send()
            .await
            .map_err(|e| LedgerError::from_rpc_message(e.to_string()))?;
        let tx_hash = *pending.tx_hash();
        tracing::debug!(target: "ledger", candidate_id, fee_bid, tx = %tx_hash, "attemptMining submitted");
        Ok(PendingAction {
            tx_hash,
            candidate_id,
        })
    }

    async fn await_finalization(&self, pending: PendingAction) -> Result<FinalizedRecord, LedgerError> {
        let started = Instant::now();
        loop {
            match self.provider.get_transaction_receipt(pending.tx_hash).await {
                Ok(Some(receipt)) => {
                    let logs = receipt
                        .inner
                        .logs()
                        .iter()
                        .map(|log| log.inner.clone())
                        .collect();
                    return Ok(FinalizedRecord {
                        tx_hash: receipt.transaction_hash,
                        gas_used: receipt.gas_used,
                        effective_gas_price: receipt.effective_gas_price,
                        block_number: receipt.block_number,
                        logs,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(target: "ledger", tx = %pending.tx_hash, error = %e, "Receipt poll failed");
                }
            }
            if started.elapsed() >= self.receipt_timeout {
                return Err(LedgerError::FinalizationTimeout {
                    tx: format!("{:#x}", pending.tx_hash),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            sleep(self.receipt_poll).await;
        }
    }
}
