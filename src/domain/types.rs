// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::{RATE_SCALE, WEI_PER_GWEI, WEI_PER_NATIVE};
use alloy::primitives::{B256, U256};
use serde::Serialize;
use std::fmt;

/// Round pattern published by the GameManager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Pattern {
    Even,
    Odd,
    Prime,
    Pi,
    Square,
    Unknown(u8),
}

impl Pattern {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Pattern::Even,
            1 => Pattern::Odd,
            2 => Pattern::Prime,
            3 => Pattern::Pi,
            4 => Pattern::Square,
            other => Pattern::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Pattern::Even => 0,
            Pattern::Odd => 1,
            Pattern::Prime => 2,
            Pattern::Pi => 3,
            Pattern::Square => 4,
            Pattern::Unknown(code) => code,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Even => f.write_str("EVEN"),
            Pattern::Odd => f.write_str("ODD"),
            Pattern::Prime => f.write_str("PRIME"),
            Pattern::Pi => f.write_str("PI"),
            Pattern::Square => f.write_str("SQUARE"),
            Pattern::Unknown(_) => f.write_str("UNKNOWN"),
        }
    }
}

/// Miner NFT class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MinerClass {
    EvenBlaster,
    PrimeSniper,
    BalancedScan,
    PiSniper,
    SquareSeeker,
    Unknown(u8),
}

impl MinerClass {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => MinerClass::EvenBlaster,
            1 => MinerClass::PrimeSniper,
            2 => MinerClass::BalancedScan,
            3 => MinerClass::PiSniper,
            4 => MinerClass::SquareSeeker,
            other => MinerClass::Unknown(other),
        }
    }
}

impl fmt::Display for MinerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinerClass::EvenBlaster => f.write_str("EvenBlaster"),
            MinerClass::PrimeSniper => f.write_str("PrimeSniper"),
            MinerClass::BalancedScan => f.write_str("BalancedScan"),
            MinerClass::PiSniper => f.write_str("PiSniper"),
            MinerClass::SquareSeeker => f.write_str("SquareSeeker"),
            MinerClass::Unknown(_) => f.write_str("Unknown"),
        }
    }
}

/// Convert an on-chain rate in basis points into a fraction.
pub fn rate_from_bps(bps: U256) -> f64 {
    let bps: u64 = bps.saturating_to();
    bps.min(RATE_SCALE) as f64 / RATE_SCALE as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateStats {
    pub name: String,
    pub class: MinerClass,
    pub base_success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: u64,
    pub name: String,
    pub class: MinerClass,
    pub base_success_rate: f64,
}

impl Candidate {
    pub fn from_stats(id: u64, stats: CandidateStats) -> Self {
        Self {
            id,
            name: stats.name,
            class: stats.class,
            base_success_rate: stats.base_success_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundState {
    pub round_id: u64,
    pub pattern: Pattern,
    pub range_min: u64,
    pub range_max: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSample {
    /// Fee price in wei.
    pub value: u128,
    /// Unix millis; zero until the first successful poll.
    pub observed_at: u64,
}

/// Fixed parameters of the expected-value model and of each submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MiningEconomics {
    pub reward_per_success: f64,
    pub reward_value_native: f64,
    pub gas_estimate: u64,
    pub gas_limit: u64,
    pub priority_fee_wei: u128,
}

impl MiningEconomics {
    /// Native value credited for one successful attempt.
    pub fn revenue_per_success_native(&self) -> f64 {
        self.reward_per_success * self.reward_value_native
    }

    pub fn revenue_per_success_wei(&self) -> u128 {
        native_to_wei(self.revenue_per_success_native())
    }

    pub fn fee_bid(&self, fee: FeeSample) -> u128 {
        fee.value.saturating_add(self.priority_fee_wei)
    }
}

impl Default for MiningEconomics {
    fn default() -> Self {
        use crate::domain::constants::*;
        Self {
            reward_per_success: DEFAULT_REWARD_PER_SUCCESS,
            reward_value_native: DEFAULT_REWARD_VALUE_NATIVE,
            gas_estimate: DEFAULT_GAS_ESTIMATE,
            gas_limit: DEFAULT_GAS_LIMIT,
            priority_fee_wei: DEFAULT_PRIORITY_FEE_GWEI as u128 * WEI_PER_GWEI,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedCandidate {
    pub candidate: Candidate,
    pub effective_success_rate: f64,
    /// Native units.
    pub expected_revenue: f64,
    /// Native units.
    pub expected_cost: f64,
    pub expected_net_value: f64,
    pub is_optimal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Success,
    Failure,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningEvent {
    /// Unix millis at resolution.
    pub timestamp: u64,
    pub candidate_id: u64,
    pub outcome: Outcome,
    pub randomness: Option<U256>,
    /// Realized cost in wei.
    pub cost: u128,
    pub gas_used: u64,
    pub gas_price: u128,
    pub transaction_ref: Option<B256>,
    pub confirmed_at_block: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Idle,
    Running,
    Stopping,
}

/// Conditions that force a running session back to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FatalCondition {
    InsufficientBalance,
    OperatorDeclined,
}

impl fmt::Display for FatalCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalCondition::InsufficientBalance => f.write_str("insufficient balance"),
            FatalCondition::OperatorDeclined => f.write_str("operator declined the transaction"),
        }
    }
}

pub fn wei_to_native(wei: u128) -> f64 {
    wei as f64 / WEI_PER_NATIVE
}

pub fn native_to_wei(native: f64) -> u128 {
    if native.is_finite() && native > 0.0 {
        (native * WEI_PER_NATIVE) as u128
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_codes_round_trip_known_values() {
        for code in 0u8..5 {
            assert_eq!(Pattern::from_code(code).code(), code);
        }
        assert_eq!(Pattern::from_code(9), Pattern::Unknown(9));
        assert_eq!(Pattern::Prime.to_string(), "PRIME");
        assert_eq!(MinerClass::from_code(3).to_string(), "PiSniper");
    }

    #[test]
    fn rate_is_clamped_to_unit_interval() {
        assert!((rate_from_bps(U256::from(2_000u64)) - 0.2).abs() < 1e-12);
        assert_eq!(rate_from_bps(U256::from(50_000u64)), 1.0);
        assert_eq!(rate_from_bps(U256::MAX), 1.0);
    }

    #[test]
    fn fee_bid_adds_priority_increment() {
        let econ = MiningEconomics::default();
        let fee = FeeSample {
            value: 3 * WEI_PER_GWEI,
            observed_at: 1,
        };
        assert_eq!(econ.fee_bid(fee), 4 * WEI_PER_GWEI);
        assert_eq!(econ.revenue_per_success_wei(), 27_000_000_000_000_000_000);
    }
}
