// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::LedgerError;
use crate::common::time_utils::current_unix_ms;
use crate::domain::types::{FatalCondition, MiningEconomics, MiningEvent, Outcome};
use crate::infrastructure::data::contracts::IMiningEngine::MiningAttemptMade;
use crate::network::gas::FeeTracker;
use crate::network::ledger::{FinalizedRecord, SharedLedger};
use crate::services::mining::notifier::{Notice, SharedNotifier};
use crate::services::mining::stats::StatisticsLedger;
use alloy::primitives::{Address, B256, Log, U256};
use alloy::sol_types::SolEvent;
use std::sync::Arc;

/// Result of one submitted attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Non-fatal; the event is already in the statistics ledger.
    Recorded(MiningEvent),
    /// Session-stopping; nothing was recorded.
    Fatal(FatalCondition),
}

#[derive(Clone)]
pub struct OutcomeProcessor {
    ledger: SharedLedger,
    fees: FeeTracker,
    stats: Arc<StatisticsLedger>,
    notifier: SharedNotifier,
    economics: MiningEconomics,
}

impl OutcomeProcessor {
    pub fn new(
        ledger: SharedLedger,
        fees: FeeTracker,
        stats: Arc<StatisticsLedger>,
        notifier: SharedNotifier,
        economics: MiningEconomics,
    ) -> Self {
        Self {
            ledger,
            fees,
            stats,
            notifier,
            economics,
        }
    }

    pub fn stats(&self) -> &Arc<StatisticsLedger> {
        &self.stats
    }

    /// Fee bid for the next submission.
    pub fn current_bid(&self) -> u128 {
        self.economics.fee_bid(self.fees.current_fee())
    }

    /// Submit one attempt for `candidate_id` and wait until it is classified.
    pub async fn submit_and_resolve(&self, candidate_id: u64) -> Resolution {
        let fee_bid = self.current_bid();
        let pending = match self.ledger.submit_action(candidate_id, fee_bid).await {
            Ok(pending) => pending,
            Err(e) => return self.resolve_failure(candidate_id, e, None),
        };

        match self.ledger.await_finalization(pending).await {
            Ok(record) => Resolution::Recorded(self.resolve_finalized(candidate_id, record)),
            Err(e) => self.resolve_failure(candidate_id, e, Some(pending.tx_hash)),
        }
    }

    fn resolve_failure(&self, candidate_id: u64, err: LedgerError, tx: Option<B256>) -> Resolution {
        if let Some(condition) = err.fatal_condition() {
            tracing::warn!(target: "outcome", candidate_id, error = %err, %condition, "Fatal mining error");
            return Resolution::Fatal(condition);
        }

        tracing::warn!(
            target: "outcome",
            candidate_id,
            tx = ?tx,
            error = %err,
            "Mining attempt errored"
        );
        let event = MiningEvent {
            timestamp: current_unix_ms(),
            candidate_id,
            outcome: Outcome::Error,
            randomness: None,
            cost: 0,
            gas_used: 0,
            gas_price: 0,
            transaction_ref: tx,
            confirmed_at_block: None,
        };
        self.stats.record(event.clone());
        Resolution::Recorded(event)
    }

    fn resolve_finalized(&self, candidate_id: u64, record: FinalizedRecord) -> MiningEvent {
        let attempt = find_attempt(&record.logs, self.ledger.actor(), candidate_id);
        let (outcome, randomness) = match &attempt {
            Some(ev) if ev.success => (Outcome::Success, Some(ev.randomNumber)),
            Some(ev) => (Outcome::Failure, Some(ev.randomNumber)),
            None => {
                tracing::warn!(
                    target: "outcome",
                    candidate_id,
                    tx = %record.tx_hash,
                    logs = record.logs.len(),
                    "No MiningAttemptMade event for this attempt"
                );
                (Outcome::Error, None)
            }
        };

        let event = MiningEvent {
            timestamp: current_unix_ms(),
            candidate_id,
            outcome,
            randomness,
            cost: record.cost_wei(),
            gas_used: record.gas_used,
            gas_price: record.effective_gas_price,
            transaction_ref: Some(record.tx_hash),
            confirmed_at_block: record.block_number,
        };
        self.stats.record(event.clone());

        tracing::debug!(
            target: "outcome",
            candidate_id,
            outcome = ?outcome,
            gas_used = record.gas_used,
            cost_wei = event.cost,
            block = ?record.block_number,
            "Attempt resolved"
        );

        if outcome == Outcome::Success {
            let snapshot = self.stats.snapshot();
            self.notifier.notify(Notice::MiningSucceeded {
                candidate_id,
                successes: snapshot.successes,
                reward: self.economics.reward_per_success,
            });
        }
        event
    }
}

/// First `MiningAttemptMade` log for `candidate_id` emitted on behalf of `actor`.
pub fn find_attempt(logs: &[Log], actor: Option<Address>, candidate_id: u64) -> Option<MiningAttemptMade> {
    let nft_id = U256::from(candidate_id);
    logs.iter()
        .filter(|log| log.data.topics().first() == Some(&MiningAttemptMade::SIGNATURE_HASH))
        .filter_map(|log| MiningAttemptMade::decode_log_data(&log.data).ok())
        .find(|ev| ev.nftId == nft_id && actor.is_none_or(|actor| ev.player == actor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::simulated::{ScriptedOutcome, SimulatedLedger};
    use crate::services::mining::notifier::BufferedNotifier;
    use std::time::Duration;

    const ACTOR: Address = Address::repeat_byte(0x42);

    struct Harness {
        ledger: Arc<SimulatedLedger>,
        notifier: Arc<BufferedNotifier>,
        processor: OutcomeProcessor,
    }

    async fn harness(ledger: SimulatedLedger) -> Harness {
        let ledger = Arc::new(ledger);
        let notifier = Arc::new(BufferedNotifier::default());
        let econ = MiningEconomics::default();
        let fees = FeeTracker::new(ledger.clone(), Duration::from_secs(10));
        fees.refresh().await;
        let stats = Arc::new(StatisticsLedger::new(econ.revenue_per_success_wei(), econ.reward_per_success));
        let processor = OutcomeProcessor::new(ledger.clone(), fees, stats, notifier.clone(), econ);
        Harness {
            ledger,
            notifier,
            processor,
        }
    }

    #[tokio::test]
    async fn success_is_recorded_and_announced() {
        let h = harness(SimulatedLedger::new(Some(ACTOR)).with_candidate(1, 0.2)).await;
        h.ledger.push_script(ScriptedOutcome::Success);

        let Resolution::Recorded(event) = h.processor.submit_and_resolve(1).await else {
            panic!("expected a recorded event");
        };
        assert_eq!(event.outcome, Outcome::Success);
        assert!(event.randomness.is_some());
        assert!(event.transaction_ref.is_some());
        assert_eq!(h.processor.stats().snapshot().successes, 1);
        assert!(matches!(
            h.notifier.notices().as_slice(),
            [Notice::MiningSucceeded { successes: 1, .. }]
        ));
    }

    #[tokio::test]
    async fn missing_event_is_an_error_outcome() {
        let h = harness(SimulatedLedger::new(Some(ACTOR)).with_candidate(1, 0.2)).await;
        h.ledger.push_script(ScriptedOutcome::NoEvent);

        let Resolution::Recorded(event) = h.processor.submit_and_resolve(1).await else {
            panic!("expected a recorded event");
        };
        assert_eq!(event.outcome, Outcome::Error);
        assert_eq!(event.randomness, None);
        let snap = h.processor.stats().snapshot();
        assert_eq!((snap.attempts, snap.successes, snap.errors), (1, 0, 1));
    }

    #[tokio::test]
    async fn events_for_other_miners_do_not_match() {
        let h = harness(SimulatedLedger::new(Some(ACTOR)).with_candidate(1, 0.2)).await;
        h.ledger.push_script(ScriptedOutcome::ForeignEvent);

        let Resolution::Recorded(event) = h.processor.submit_and_resolve(1).await else {
            panic!("expected a recorded event");
        };
        assert_eq!(event.outcome, Outcome::Error);
        assert!(h.notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn finalization_timeout_is_not_fatal() {
        let h = harness(SimulatedLedger::new(Some(ACTOR)).with_candidate(1, 0.2)).await;
        h.ledger.push_script(ScriptedOutcome::FinalizeError(LedgerError::FinalizationTimeout {
            tx: "0x01".into(),
            waited_ms: 60_000,
        }));

        let Resolution::Recorded(event) = h.processor.submit_and_resolve(1).await else {
            panic!("expected a recorded event");
        };
        assert_eq!(event.outcome, Outcome::Error);
        assert!(event.transaction_ref.is_some());
        assert_eq!(event.cost, 0);
    }

    #[tokio::test]
    async fn fatal_submissions_are_returned_not_recorded() {
        let h = harness(SimulatedLedger::new(Some(ACTOR)).with_candidate(1, 0.2)).await;
        h.ledger
            .push_script(ScriptedOutcome::SubmitError(LedgerError::Declined("user rejected".into())));

        assert_eq!(
            h.processor.submit_and_resolve(1).await,
            Resolution::Fatal(FatalCondition::OperatorDeclined)
        );
        assert_eq!(h.processor.stats().attempts(), 0);
    }

    #[tokio::test]
    async fn other_submission_errors_have_no_transaction_ref() {
        let h = harness(SimulatedLedger::new(Some(ACTOR)).with_candidate(1, 0.2)).await;
        h.ledger
            .push_script(ScriptedOutcome::SubmitError(LedgerError::Submission("nonce too low".into())));

        let Resolution::Recorded(event) = h.processor.submit_and_resolve(1).await else {
            panic!("expected a recorded event");
        };
        assert_eq!(event.outcome, Outcome::Error);
        assert_eq!(event.transaction_ref, None);
    }

    #[tokio::test]
    async fn cost_comes_from_receipt_not_bid() {
        let h = harness(
            SimulatedLedger::new(Some(ACTOR))
                .with_candidate(1, 0.2)
                .with_gas_used(100_000),
        )
        .await;
        h.ledger.set_fee(7);
        h.ledger.push_script(ScriptedOutcome::Failure);

        let Resolution::Recorded(event) = h.processor.submit_and_resolve(1).await else {
            panic!("expected a recorded event");
        };
        assert_eq!(event.outcome, Outcome::Failure);
        assert_eq!(event.gas_price, 7);
        assert_eq!(event.cost, 700_000);
        // Bid was computed from the refreshed 1 gwei sample plus the increment.
        assert_eq!(h.ledger.journal()[0].fee_bid, 2_000_000_000);
    }
}
