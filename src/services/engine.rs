// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use crate::domain::types::MiningEconomics;
use crate::network::gas::FeeTracker;
use crate::network::ledger::SharedLedger;
use crate::network::round::RoundWatcher;
use crate::services::control::spawn_control_server;
use crate::services::mining::evaluator::TargetEvaluator;
use crate::services::mining::notifier::BufferedNotifier;
use crate::services::mining::optimizer::Optimizer;
use crate::services::mining::outcome::OutcomeProcessor;
use crate::services::mining::scheduler::{MiningScheduler, SchedulerSettings};
use crate::services::mining::stats::StatisticsLedger;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub economics: MiningEconomics,
    pub scheduler: SchedulerSettings,
    pub fee_poll: Duration,
    pub round_poll: Duration,
    pub control_bind: IpAddr,
    /// `None` disables the control endpoint.
    pub control_port: Option<u16>,
    pub initial_candidate: Option<u64>,
    pub autostart: bool,
}

pub struct Engine {
    config: EngineConfig,
    fees: FeeTracker,
    rounds: RoundWatcher,
    evaluator: TargetEvaluator,
    scheduler: MiningScheduler,
    notices: Arc<BufferedNotifier>,
}

impl Engine {
    pub fn new(ledger: SharedLedger, config: EngineConfig) -> Self {
        let notices = Arc::new(BufferedNotifier::default());
        let fees = FeeTracker::new(ledger.clone(), config.fee_poll);
        let rounds = RoundWatcher::new(ledger.clone(), config.round_poll);
        let stats = Arc::new(StatisticsLedger::new(
            config.economics.revenue_per_success_wei(),
            config.economics.reward_per_success,
        ));
        let outcome = OutcomeProcessor::new(
            ledger.clone(),
            fees.clone(),
            stats,
            notices.clone(),
            config.economics,
        );
        let scheduler = MiningScheduler::new(ledger.clone(), outcome, notices.clone(), config.scheduler);
        let evaluator = TargetEvaluator::new(ledger, config.economics);
        Self {
            config,
            fees,
            rounds,
            evaluator,
            scheduler,
            notices,
        }
    }

    pub fn scheduler(&self) -> &MiningScheduler {
        &self.scheduler
    }

    pub fn notices(&self) -> &Arc<BufferedNotifier> {
        &self.notices
    }

    /// Run until `shutdown` fires. A running session is stopped on the way out.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AppError> {
        // Prime fee and round so the first evaluation has inputs.
        self.fees.refresh().await;
        let round = self.rounds.refresh().await;

        if let Some(id) = self.config.initial_candidate {
            self.scheduler.select_candidate(id);
        }
        let mut optimizer = Optimizer::new(self.evaluator.clone(), self.scheduler.clone());
        if let Some(round) = round {
            optimizer.cycle(round, self.fees.current_fee()).await;
        }

        if let Some(port) = self.config.control_port {
            spawn_control_server(
                self.config.control_bind,
                port,
                self.scheduler.clone(),
                self.notices.clone(),
                shutdown.clone(),
            )
            .await;
        }

        if self.config.autostart {
            self.scheduler.start(self.config.initial_candidate, None).await;
        }

        let fee_task = tokio::spawn(self.fees.clone().run(shutdown.clone()));
        let round_task = tokio::spawn(self.rounds.clone().run(shutdown.clone()));
        let optimizer_task = tokio::spawn(optimizer.run(self.fees.clone(), self.rounds.clone(), shutdown.clone()));

        let joined = tokio::try_join!(fee_task, round_task, optimizer_task)
            .map(|_| ())
            .map_err(|e| AppError::Unknown(e.into()));

        self.scheduler.stop();
        let stats = self.scheduler.snapshot().stats;
        tracing::info!(
            attempts = stats.attempts,
            successes = stats.successes,
            net_value_native = stats.net_value_native,
            "Engine stopped"
        );
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::DEFAULT_CADENCE_MS;
    use crate::domain::types::SessionStatus;
    use crate::network::simulated::SimulatedLedger;
    use alloy::primitives::Address;
    use std::net::Ipv4Addr;

    #[tokio::test(start_paused = true)]
    async fn autostart_mines_until_shutdown() {
        let ledger = Arc::new(SimulatedLedger::demo(Address::repeat_byte(9)));
        let engine = Engine::new(
            ledger.clone(),
            EngineConfig {
                economics: MiningEconomics::default(),
                scheduler: SchedulerSettings {
                    cadence_ms: DEFAULT_CADENCE_MS,
                    auto_optimize: true,
                },
                fee_poll: Duration::from_secs(10),
                round_poll: Duration::from_secs(5),
                control_bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
                control_port: None,
                initial_candidate: None,
                autostart: true,
            },
        );
        let scheduler = engine.scheduler().clone();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(engine.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(scheduler.status(), SessionStatus::Running);
        // Demo ledger ranks EvenBlaster #1 first.
        assert_eq!(scheduler.snapshot().selected_candidate, Some(1));
        assert!(scheduler.snapshot().stats.attempts > 0);

        shutdown.cancel();
        task.await.expect("join").expect("engine");
        assert_eq!(scheduler.status(), SessionStatus::Idle);
    }
}
