// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::LedgerError;
use crate::domain::types::{
    Candidate, EvaluatedCandidate, FeeSample, MiningEconomics, RoundState, wei_to_native,
};
use crate::network::ledger::SharedLedger;
use futures::future::join_all;

/// Ranks owned miners by expected net value per attempt.
#[derive(Clone)]
pub struct TargetEvaluator {
    ledger: SharedLedger,
    economics: MiningEconomics,
}

impl TargetEvaluator {
    pub fn new(ledger: SharedLedger, economics: MiningEconomics) -> Self {
        Self { ledger, economics }
    }

    pub fn economics(&self) -> &MiningEconomics {
        &self.economics
    }

    /// Read the operator's owned miners and their stats.
    pub async fn discover_candidates(&self) -> Result<Vec<Candidate>, LedgerError> {
        let ids = self.ledger.read_owned_candidates().await?;
        Ok(self.load_candidates(&ids).await)
    }

    /// Fetch stats for `ids`; unreadable miners are skipped.
    pub async fn load_candidates(&self, ids: &[u64]) -> Vec<Candidate> {
        let reads = ids.iter().map(|&id| {
            let ledger = self.ledger.clone();
            async move { (id, ledger.read_candidate_stats(id).await) }
        });
        join_all(reads)
            .await
            .into_iter()
            .filter_map(|(id, res)| match res {
                Ok(stats) => Some(Candidate::from_stats(id, stats)),
                Err(e) => {
                    tracing::warn!(target: "evaluator", candidate_id = id, error = %e, "Miner stats read failed; skipping");
                    None
                }
            })
            .collect()
    }

    /// Score every candidate for the round and fee. Input order is kept; a candidate
    /// whose effective rate cannot be read is left out of this cycle.
    pub async fn evaluate(
        &self,
        candidates: &[Candidate],
        round: &RoundState,
        fee: FeeSample,
    ) -> Vec<EvaluatedCandidate> {
        let reads = candidates.iter().map(|candidate| {
            let ledger = self.ledger.clone();
            let pattern = round.pattern;
            async move {
                (
                    candidate,
                    ledger.read_effective_success_rate(candidate.id, pattern).await,
                )
            }
        });

        let mut evaluated: Vec<EvaluatedCandidate> = join_all(reads)
            .await
            .into_iter()
            .filter_map(|(candidate, res)| match res {
                Ok(rate) => Some(score(candidate, rate, fee, &self.economics)),
                Err(e) => {
                    tracing::warn!(
                        target: "evaluator",
                        candidate_id = candidate.id,
                        round_id = round.round_id,
                        error = %e,
                        "Effective rate read failed; excluded this cycle"
                    );
                    None
                }
            })
            .collect();

        if let Some(best) = mark_optimal(&mut evaluated) {
            let best = &evaluated[best];
            tracing::debug!(
                target: "evaluator",
                round_id = round.round_id,
                pattern = %round.pattern,
                fee_wei = fee.value,
                candidate_id = best.candidate.id,
                expected_net = best.expected_net_value,
                "Optimal miner selected"
            );
        }
        evaluated
    }
}

pub fn score(
    candidate: &Candidate,
    effective_success_rate: f64,
    fee: FeeSample,
    economics: &MiningEconomics,
) -> EvaluatedCandidate {
    let expected_revenue = effective_success_rate * economics.revenue_per_success_native();
    let expected_cost = wei_to_native(fee.value.saturating_mul(economics.gas_estimate as u128));
    EvaluatedCandidate {
        candidate: candidate.clone(),
        effective_success_rate,
        expected_revenue,
        expected_cost,
        expected_net_value: expected_revenue - expected_cost,
        is_optimal: false,
    }
}

/// Flag the arg-max by expected net value; the first seen wins ties.
pub fn mark_optimal(evaluated: &mut [EvaluatedCandidate]) -> Option<usize> {
    let key = |e: &EvaluatedCandidate| {
        if e.expected_net_value.is_nan() {
            f64::NEG_INFINITY
        } else {
            e.expected_net_value
        }
    };
    let mut best: Option<usize> = None;
    for idx in 0..evaluated.len() {
        evaluated[idx].is_optimal = false;
        match best {
            Some(current) if key(&evaluated[idx]) <= key(&evaluated[current]) => {}
            _ => best = Some(idx),
        }
    }
    if let Some(idx) = best {
        evaluated[idx].is_optimal = true;
    }
    best
}

pub fn optimal(evaluated: &[EvaluatedCandidate]) -> Option<&EvaluatedCandidate> {
    evaluated.iter().find(|e| e.is_optimal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{MinerClass, Pattern};
    use crate::network::simulated::SimulatedLedger;
    use std::sync::Arc;

    fn round() -> RoundState {
        RoundState {
            round_id: 3,
            pattern: Pattern::Odd,
            range_min: 1,
            range_max: 100,
        }
    }

    fn candidate(id: u64, rate: f64) -> Candidate {
        Candidate {
            id,
            name: format!("Miner #{id}"),
            class: MinerClass::BalancedScan,
            base_success_rate: rate,
        }
    }

    fn fee(value: u128) -> FeeSample {
        FeeSample {
            value,
            observed_at: 1,
        }
    }

    #[tokio::test]
    async fn higher_rate_wins_at_equal_fee() {
        let ledger = Arc::new(
            SimulatedLedger::new(None)
                .with_candidate(1, 0.10)
                .with_candidate(2, 0.20),
        );
        let evaluator = TargetEvaluator::new(ledger, MiningEconomics::default());
        let candidates = vec![candidate(1, 0.10), candidate(2, 0.20)];

        let ranked = evaluator.evaluate(&candidates, &round(), fee(1_000_000_000)).await;
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked.iter().filter(|e| e.is_optimal).count(), 1);
        assert_eq!(optimal(&ranked).map(|e| e.candidate.id), Some(2));
        assert!((ranked[0].expected_revenue - 2.7).abs() < 1e-9);
        assert!((ranked[0].expected_cost - 0.0002).abs() < 1e-12);
    }

    #[tokio::test]
    async fn unreadable_candidates_are_excluded() {
        let ledger = Arc::new(
            SimulatedLedger::new(None)
                .with_candidate(1, 0.10)
                .with_candidate(2, 0.90),
        );
        ledger.fail_reads_for(2);
        let evaluator = TargetEvaluator::new(ledger, MiningEconomics::default());

        let ranked = evaluator
            .evaluate(&[candidate(1, 0.1), candidate(2, 0.9)], &round(), fee(0))
            .await;
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].is_optimal);
        assert_eq!(ranked[0].candidate.id, 1);
    }

    #[tokio::test]
    async fn discovery_skips_failed_stat_reads() {
        let ledger = Arc::new(
            SimulatedLedger::new(None)
                .with_candidate(4, 0.1)
                .with_candidate(5, 0.2),
        );
        ledger.fail_reads_for(4);
        let evaluator = TargetEvaluator::new(ledger, MiningEconomics::default());
        let found = evaluator.discover_candidates().await.expect("owned");
        assert_eq!(found.iter().map(|c| c.id).collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn ties_go_to_first_seen() {
        let econ = MiningEconomics::default();
        let mut ranked = vec![
            score(&candidate(8, 0.2), 0.2, fee(5), &econ),
            score(&candidate(9, 0.2), 0.2, fee(5), &econ),
        ];
        assert_eq!(mark_optimal(&mut ranked), Some(0));
        assert!(ranked[0].is_optimal && !ranked[1].is_optimal);
    }

    #[test]
    fn exactly_one_optimal_for_any_non_empty_set() {
        let econ = MiningEconomics::default();
        for n in 1..12u64 {
            let mut ranked: Vec<_> = (0..n)
                .map(|i| {
                    let rate = ((i * 7) % 5) as f64 / 10.0;
                    score(&candidate(i, rate), rate, fee(1_000 * i as u128), &econ)
                })
                .collect();
            ranked[0].is_optimal = true;
            mark_optimal(&mut ranked);
            assert_eq!(ranked.iter().filter(|e| e.is_optimal).count(), 1, "n={n}");
        }
        assert_eq!(mark_optimal(&mut []), None);
    }

    #[test]
    fn high_fee_can_make_net_value_negative() {
        let econ = MiningEconomics::default();
        let scored = score(&candidate(1, 0.0001), 0.0001, fee(100_000_000_000_000), &econ);
        assert!(scored.expected_net_value < 0.0);
    }
}
