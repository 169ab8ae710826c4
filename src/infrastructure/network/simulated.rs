// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! In-memory ledger used for dry runs and tests.
//!
//! Outcomes come from a script queue when one is loaded, otherwise from a
//! keccak-derived draw against the candidate's effective rate. Every submission is
//! journaled with its submit and resolve instants.

use crate::common::constants::RATE_SCALE;
use crate::common::error::LedgerError;
use crate::common::time_utils::current_unix_ms;
use crate::domain::types::{CandidateStats, MinerClass, Pattern, RoundState};
use crate::infrastructure::data::contracts::IMiningEngine::MiningAttemptMade;
use crate::network::ledger::{FinalizedRecord, Ledger, PendingAction};
use alloy::primitives::{Address, B256, Log, U256, keccak256};
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{Instant, sleep};

const SIMULATED_ENGINE: Address = Address::repeat_byte(0xee);
const SIMULATED_GAS_USED: u64 = 180_000;
/// Unfinalized submissions kept before the oldest is forgotten.
const PENDING_CAPACITY: usize = 64;

/// Forced result for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    Success,
    Failure,
    /// Finalizes without any MiningAttemptMade log.
    NoEvent,
    /// Finalizes with an event for a different candidate.
    ForeignEvent,
    SubmitError(LedgerError),
    FinalizeError(LedgerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTrace {
    pub candidate_id: u64,
    pub fee_bid: u128,
    pub submitted_at: Instant,
    pub resolved_at: Option<Instant>,
}

struct SimulatedMiner {
    stats: CandidateStats,
    effective_rate_bps: u64,
}

struct SimState {
    round: RoundState,
    fee: u128,
    fee_error: Option<LedgerError>,
    miners: BTreeMap<u64, SimulatedMiner>,
    failing_reads: HashSet<u64>,
    script: VecDeque<ScriptedOutcome>,
    pending: HashMap<B256, (usize, ScriptedOutcome)>,
    journal: Vec<ActionTrace>,
    nonce: u64,
    awaiting: usize,
    max_awaiting: usize,
}

pub struct SimulatedLedger {
    actor: Option<Address>,
    submit_delay: Duration,
    finalize_delay: Duration,
    gas_used: u64,
    state: Mutex<SimState>,
}

impl SimulatedLedger {
    pub fn new(actor: Option<Address>) -> Self {
        Self {
            actor,
            submit_delay: Duration::ZERO,
            finalize_delay: Duration::ZERO,
            gas_used: SIMULATED_GAS_USED,
            state: Mutex::new(SimState {
                round: RoundState {
                    round_id: 1,
                    pattern: Pattern::Even,
                    range_min: 1,
                    range_max: 100,
                },
                fee: 1_000_000_000,
                fee_error: None,
                miners: BTreeMap::new(),
                failing_reads: HashSet::new(),
                script: VecDeque::new(),
                pending: HashMap::new(),
                journal: Vec::new(),
                nonce: 0,
                awaiting: 0,
                max_awaiting: 0,
            }),
        }
    }

    /// One miner of every class with rates spread across the classes.
    pub fn demo(actor: Address) -> Self {
        let ledger = Self::new(Some(actor)).with_finalize_delay(Duration::from_millis(400));
        for (id, class, rate) in [
            (1u64, MinerClass::EvenBlaster, 0.12),
            (2, MinerClass::PrimeSniper, 0.08),
            (3, MinerClass::BalancedScan, 0.10),
            (4, MinerClass::PiSniper, 0.06),
            (5, MinerClass::SquareSeeker, 0.09),
        ] {
            ledger.add_candidate(id, format!("{class} #{id}"), class, rate);
        }
        ledger
    }

    pub fn with_finalize_delay(mut self, delay: Duration) -> Self {
        self.finalize_delay = delay;
        self
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn with_gas_used(mut self, gas_used: u64) -> Self {
        self.gas_used = gas_used;
        self
    }

    pub fn with_candidate(self, id: u64, rate: f64) -> Self {
        self.add_candidate(id, format!("Miner #{id}"), MinerClass::BalancedScan, rate);
        self
    }

    pub fn add_candidate(&self, id: u64, name: String, class: MinerClass, rate: f64) {
        let bps = (rate.clamp(0.0, 1.0) * RATE_SCALE as f64).round() as u64;
        self.lock().miners.insert(
            id,
            SimulatedMiner {
                stats: CandidateStats {
                    name,
                    class,
                    base_success_rate: rate,
                },
                effective_rate_bps: bps,
            },
        );
    }

    pub fn remove_candidate(&self, id: u64) {
        self.lock().miners.remove(&id);
    }

    pub fn set_round(&self, round: RoundState) {
        self.lock().round = round;
    }

    pub fn set_fee(&self, fee: u128) {
        self.lock().fee = fee;
    }

    pub fn set_fee_error(&self, error: Option<LedgerError>) {
        self.lock().fee_error = error;
    }

    pub fn fail_reads_for(&self, id: u64) {
        self.lock().failing_reads.insert(id);
    }

    pub fn push_script(&self, outcome: ScriptedOutcome) {
        self.lock().script.push_back(outcome);
    }

    pub fn journal(&self) -> Vec<ActionTrace> {
        self.lock().journal.clone()
    }

    pub fn submissions(&self) -> usize {
        self.lock().journal.len()
    }

    /// Submissions that have not been finalized yet.
    pub fn pending_actions(&self) -> usize {
        self.lock().pending.len()
    }

    /// Highest number of concurrent finalization waits observed.
    pub fn max_concurrent_finalizations(&self) -> usize {
        self.lock().max_awaiting
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn draw(nonce: u64, candidate_id: u64) -> U256 {
        let mut seed = [0u8; 16];
        seed[..8].copy_from_slice(&nonce.to_be_bytes());
        seed[8..].copy_from_slice(&candidate_id.to_be_bytes());
        U256::from_be_bytes(keccak256(seed).0)
    }

    fn attempt_log(&self, player: Address, candidate_id: u64, random: U256, success: bool, round_id: u64) -> Log {
        let event = MiningAttemptMade {
            player,
            nftId: U256::from(candidate_id),
            randomNumber: random,
            success,
            roundId: U256::from(round_id),
            timestamp: U256::from(current_unix_ms() / 1000),
        };
        Log {
            address: SIMULATED_ENGINE,
            data: event.encode_log_data(),
        }
    }
}

#[async_trait]
impl Ledger for SimulatedLedger {
    fn actor(&self) -> Option<Address> {
        self.actor
    }

    async fn read_round(&self) -> Result<RoundState, LedgerError> {
        Ok(self.lock().round)
    }

    async fn read_owned_candidates(&self) -> Result<Vec<u64>, LedgerError> {
        Ok(self.lock().miners.keys().copied().collect())
    }

    async fn read_candidate_stats(&self, candidate_id: u64) -> Result<CandidateStats, LedgerError> {
        let state = self.lock();
        if state.failing_reads.contains(&candidate_id) {
            return Err(LedgerError::Rejected(format!("miner {candidate_id} unreadable")));
        }
        state
            .miners
            .get(&candidate_id)
            .map(|m| m.stats.clone())
            .ok_or_else(|| LedgerError::Rejected(format!("unknown miner {candidate_id}")))
    }

    async fn read_effective_success_rate(
        &self,
        candidate_id: u64,
        _pattern: Pattern,
    ) -> Result<f64, LedgerError> {
        let state = self.lock();
        if state.failing_reads.contains(&candidate_id) {
            return Err(LedgerError::Rejected(format!("miner {candidate_id} unreadable")));
        }
        state
            .miners
            .get(&candidate_id)
            .map(|m| m.effective_rate_bps as f64 / RATE_SCALE as f64)
            .ok_or_else(|| LedgerError::Rejected(format!("unknown miner {candidate_id}")))
    }

    async fn read_current_fee_price(&self) -> Result<u128, LedgerError> {
        let state = self.lock();
        match &state.fee_error {
            Some(err) => Err(err.clone()),
            None => Ok(state.fee),
        }
    }

    async fn submit_action(&self, candidate_id: u64, fee_bid: u128) -> Result<PendingAction, LedgerError> {
        if !self.submit_delay.is_zero() {
            sleep(self.submit_delay).await;
        }
        let mut state = self.lock();
        let outcome = match state.script.pop_front() {
            Some(ScriptedOutcome::SubmitError(err)) => return Err(err),
            Some(outcome) => outcome,
            None => {
                let random = Self::draw(state.nonce, candidate_id);
                let bps = state
                    .miners
                    .get(&candidate_id)
                    .map(|m| m.effective_rate_bps)
                    .unwrap_or(0);
                if random % U256::from(RATE_SCALE) < U256::from(bps) {
                    ScriptedOutcome::Success
                } else {
                    ScriptedOutcome::Failure
                }
            }
        };
        state.nonce += 1;
        let mut hash_seed = [0u8; 8];
        hash_seed.copy_from_slice(&state.nonce.to_be_bytes());
        let tx_hash = keccak256(hash_seed);
        let index = state.journal.len();
        state.journal.push(ActionTrace {
            candidate_id,
            fee_bid,
            submitted_at: Instant::now(),
            resolved_at: None,
        });
        if state.pending.len() >= PENDING_CAPACITY
            && let Some(stale) = state
                .pending
                .iter()
                .min_by_key(|(_, (idx, _))| *idx)
                .map(|(hash, _)| *hash)
        {
            state.pending.remove(&stale);
        }
        state.pending.insert(tx_hash, (index, outcome));
        Ok(PendingAction {
            tx_hash,
            candidate_id,
        })
    }

    async fn await_finalization(&self, pending: PendingAction) -> Result<FinalizedRecord, LedgerError> {
        {
            let mut state = self.lock();
            state.awaiting += 1;
            state.max_awaiting = state.max_awaiting.max(state.awaiting);
        }
        if !self.finalize_delay.is_zero() {
            sleep(self.finalize_delay).await;
        }

        let mut state = self.lock();
        state.awaiting -= 1;
        let (index, outcome) = state
            .pending
            .remove(&pending.tx_hash)
            .ok_or_else(|| LedgerError::Decode(format!("unknown tx {:#x}", pending.tx_hash)))?;
        if let Some(trace) = state.journal.get_mut(index) {
            trace.resolved_at = Some(Instant::now());
        }

        let player = self.actor.unwrap_or(Address::ZERO);
        let random = Self::draw(index as u64, pending.candidate_id);
        let round_id = state.round.round_id;
        let logs = match outcome {
            ScriptedOutcome::FinalizeError(err) => return Err(err),
            ScriptedOutcome::Success => vec![self.attempt_log(player, pending.candidate_id, random, true, round_id)],
            ScriptedOutcome::Failure => vec![self.attempt_log(player, pending.candidate_id, random, false, round_id)],
            ScriptedOutcome::ForeignEvent => vec![self.attempt_log(
                player,
                pending.candidate_id.wrapping_add(1),
                random,
                true,
                round_id,
            )],
            ScriptedOutcome::NoEvent | ScriptedOutcome::SubmitError(_) => Vec::new(),
        };

        Ok(FinalizedRecord {
            tx_hash: pending.tx_hash,
            gas_used: self.gas_used,
            effective_gas_price: state.fee,
            block_number: Some(1_000 + index as u64),
            logs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_outcomes_are_consumed_in_order() {
        let ledger = SimulatedLedger::new(Some(Address::repeat_byte(1))).with_candidate(7, 0.5);
        ledger.push_script(ScriptedOutcome::SubmitError(LedgerError::InsufficientFunds("x".into())));
        ledger.push_script(ScriptedOutcome::NoEvent);

        assert!(matches!(
            ledger.submit_action(7, 10).await,
            Err(LedgerError::InsufficientFunds(_))
        ));
        let pending = ledger.submit_action(7, 10).await.expect("submit");
        let record = ledger.await_finalization(pending).await.expect("finalize");
        assert!(record.logs.is_empty());
        assert_eq!(ledger.submissions(), 1);
        assert!(ledger.journal()[0].resolved_at.is_some());
    }

    #[tokio::test]
    async fn unscripted_attempts_emit_one_event() {
        let ledger = SimulatedLedger::new(Some(Address::repeat_byte(1))).with_candidate(3, 1.0);
        let pending = ledger.submit_action(3, 10).await.expect("submit");
        let record = ledger.await_finalization(pending).await.expect("finalize");
        assert_eq!(record.logs.len(), 1);
        let decoded = MiningAttemptMade::decode_log_data(&record.logs[0].data).expect("decode");
        assert!(decoded.success, "rate 1.0 always succeeds");
        assert_eq!(decoded.nftId, U256::from(3u64));
    }

    #[tokio::test]
    async fn unawaited_submissions_are_bounded() {
        let ledger = SimulatedLedger::new(Some(Address::repeat_byte(1))).with_candidate(1, 0.5);
        for _ in 0..PENDING_CAPACITY * 2 {
            ledger.submit_action(1, 10).await.expect("submit");
        }
        assert_eq!(ledger.pending_actions(), PENDING_CAPACITY);

        let latest = ledger.submit_action(1, 10).await.expect("submit");
        assert!(ledger.await_finalization(latest).await.is_ok());
        assert_eq!(ledger.pending_actions(), PENDING_CAPACITY - 1);
    }

    #[tokio::test]
    async fn failing_reads_are_rejected() {
        let ledger = SimulatedLedger::new(None).with_candidate(1, 0.1);
        ledger.fail_reads_for(1);
        assert!(ledger.read_candidate_stats(1).await.is_err());
        assert!(ledger.read_effective_success_rate(1, Pattern::Odd).await.is_err());
        assert_eq!(ledger.read_owned_candidates().await.unwrap(), vec![1]);
    }
}
