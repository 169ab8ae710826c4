// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::types::{Candidate, FeeSample, RoundState};
use crate::network::gas::FeeTracker;
use crate::network::round::RoundWatcher;
use crate::services::mining::evaluator::TargetEvaluator;
use crate::services::mining::scheduler::MiningScheduler;
use tokio_util::sync::CancellationToken;

/// Re-ranks owned miners whenever the fee or the round changes and hands the
/// result to the scheduler.
pub struct Optimizer {
    evaluator: TargetEvaluator,
    scheduler: MiningScheduler,
    candidates: Vec<Candidate>,
    loaded_for_round: Option<u64>,
}

impl Optimizer {
    pub fn new(evaluator: TargetEvaluator, scheduler: MiningScheduler) -> Self {
        Self {
            evaluator,
            scheduler,
            candidates: Vec::new(),
            loaded_for_round: None,
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// One evaluation pass. Owned miners are re-read when the round id moves.
    pub async fn cycle(&mut self, round: RoundState, fee: FeeSample) {
        if self.loaded_for_round != Some(round.round_id) {
            match self.evaluator.discover_candidates().await {
                Ok(found) => {
                    tracing::info!(
                        target: "evaluator",
                        round_id = round.round_id,
                        owned = found.len(),
                        "Owned miners loaded"
                    );
                    self.candidates = found;
                    self.loaded_for_round = Some(round.round_id);
                }
                Err(e) => {
                    tracing::warn!(
                        target: "evaluator",
                        round_id = round.round_id,
                        error = %e,
                        cached = self.candidates.len(),
                        "Owned miner discovery failed; using cached set"
                    );
                }
            }
        }

        let evaluated = self.evaluator.evaluate(&self.candidates, &round, fee).await;
        self.scheduler.apply_evaluation(evaluated);
    }

    pub async fn run(mut self, fees: FeeTracker, rounds: RoundWatcher, shutdown: CancellationToken) {
        let mut fee_rx = fees.subscribe();
        let mut round_rx = rounds.subscribe();
        tracing::info!(target: "evaluator", "Optimizer started");

        loop {
            let round = *round_rx.borrow_and_update();
            let fee = *fee_rx.borrow_and_update();
            match round {
                Some(round) => self.cycle(round, fee).await,
                None => tracing::debug!(target: "evaluator", "No round yet; skipping evaluation"),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = fee_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = round_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!(target: "evaluator", "Optimizer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{MinerClass, MiningEconomics, Pattern};
    use crate::network::ledger::Ledger;
    use crate::network::simulated::SimulatedLedger;
    use crate::services::mining::notifier::BufferedNotifier;
    use crate::services::mining::outcome::OutcomeProcessor;
    use crate::services::mining::scheduler::SchedulerSettings;
    use crate::services::mining::stats::StatisticsLedger;
    use std::sync::Arc;
    use std::time::Duration;

    fn optimizer(ledger: Arc<SimulatedLedger>) -> (Optimizer, MiningScheduler) {
        let econ = MiningEconomics::default();
        let notifier = Arc::new(BufferedNotifier::default());
        let fees = FeeTracker::new(ledger.clone(), Duration::from_secs(10));
        let stats = Arc::new(StatisticsLedger::new(0, 0.0));
        let outcome = OutcomeProcessor::new(ledger.clone(), fees, stats, notifier.clone(), econ);
        let scheduler = MiningScheduler::new(
            ledger.clone(),
            outcome,
            notifier,
            SchedulerSettings {
                cadence_ms: 200,
                auto_optimize: true,
            },
        );
        let evaluator = TargetEvaluator::new(ledger, econ);
        (Optimizer::new(evaluator, scheduler.clone()), scheduler)
    }

    #[tokio::test]
    async fn round_change_reloads_owned_miners() {
        let ledger = Arc::new(SimulatedLedger::new(None).with_candidate(1, 0.1));
        let (mut optimizer, scheduler) = optimizer(ledger.clone());
        let round = ledger.read_round().await.expect("round");

        optimizer.cycle(round, FeeSample::default()).await;
        assert_eq!(scheduler.snapshot().selected_candidate, Some(1));

        ledger.add_candidate(2, "Sniper".into(), MinerClass::PrimeSniper, 0.5);
        optimizer.cycle(round, FeeSample::default()).await;
        assert_eq!(optimizer.candidates().len(), 1, "same round keeps the cached set");

        let next = RoundState {
            round_id: round.round_id + 1,
            pattern: Pattern::Prime,
            ..round
        };
        optimizer.cycle(next, FeeSample::default()).await;
        assert_eq!(optimizer.candidates().len(), 2);
        assert_eq!(scheduler.snapshot().selected_candidate, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn run_reacts_to_round_updates() {
        let ledger = Arc::new(SimulatedLedger::new(None).with_candidate(3, 0.3));
        let (optimizer, scheduler) = optimizer(ledger.clone());
        let fees = FeeTracker::new(ledger.clone(), Duration::from_secs(10));
        let rounds = RoundWatcher::new(ledger, Duration::from_secs(5));
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(optimizer.run(fees, rounds.clone(), shutdown.clone()));
        rounds.refresh().await;
        let mut view = scheduler.subscribe();
        while view.borrow_and_update().candidates.is_empty() {
            view.changed().await.expect("scheduler alive");
        }
        assert_eq!(scheduler.snapshot().selected_candidate, Some(3));

        shutdown.cancel();
        task.await.expect("optimizer task");
    }
}
