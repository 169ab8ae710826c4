// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Run/stop state machine for auto-mining.
//!
//! A session is one `Idle -> Running -> Idle` cycle. While running, a single loop
//! task submits one attempt, waits for it to resolve, then sleeps for the cadence
//! before the next one. The in-flight slot is shared with `start` so a probe for a
//! new session can never overlap an attempt left over from the previous one.

use crate::domain::constants::{FIRST_TICK_DELAY_MS, MAX_CADENCE_MS, MIN_CADENCE_MS};
use crate::domain::types::{EvaluatedCandidate, FatalCondition, SessionStatus};
use crate::network::ledger::SharedLedger;
use crate::services::mining::evaluator::optimal;
use crate::services::mining::notifier::{Notice, SharedNotifier};
use crate::services::mining::outcome::{OutcomeProcessor, Resolution};
use crate::services::mining::stats::{StatisticsLedger, StatsSnapshot};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub cadence_ms: u64,
    pub auto_optimize: bool,
}

/// Everything the presentation layer renders, in one read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub session_id: u64,
    pub selected_candidate: Option<u64>,
    pub cadence_ms: u64,
    pub target_tps: f64,
    pub auto_optimize: bool,
    pub candidates: Vec<EvaluatedCandidate>,
    pub stats: StatsSnapshot,
}

struct SessionState {
    status: SessionStatus,
    session_id: u64,
    selected: Option<u64>,
    cadence_ms: u64,
    auto_optimize: bool,
    candidates: Vec<EvaluatedCandidate>,
    timer: Option<CancellationToken>,
    /// A start probe is outstanding.
    starting: bool,
    stop_requested: bool,
}

struct Inner {
    ledger: SharedLedger,
    outcome: OutcomeProcessor,
    stats: Arc<StatisticsLedger>,
    notifier: SharedNotifier,
    state: Mutex<SessionState>,
    in_flight: tokio::sync::Mutex<()>,
    view: watch::Sender<SessionSnapshot>,
}

#[derive(Clone)]
pub struct MiningScheduler {
    inner: Arc<Inner>,
}

pub fn cadence_in_range(cadence_ms: u64) -> bool {
    (MIN_CADENCE_MS..=MAX_CADENCE_MS).contains(&cadence_ms)
}

impl MiningScheduler {
    pub fn new(
        ledger: SharedLedger,
        outcome: OutcomeProcessor,
        notifier: SharedNotifier,
        settings: SchedulerSettings,
    ) -> Self {
        let stats = outcome.stats().clone();
        let state = SessionState {
            status: SessionStatus::Idle,
            session_id: 0,
            selected: None,
            cadence_ms: settings.cadence_ms.clamp(MIN_CADENCE_MS, MAX_CADENCE_MS),
            auto_optimize: settings.auto_optimize,
            candidates: Vec::new(),
            timer: None,
            starting: false,
            stop_requested: false,
        };
        let initial = build_snapshot(&state, stats.snapshot());
        let (view, _) = watch::channel(initial);
        Self {
            inner: Arc::new(Inner {
                ledger,
                outcome,
                stats,
                notifier,
                state: Mutex::new(state),
                in_flight: tokio::sync::Mutex::new(()),
                view,
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.view.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.lock().status
    }

    /// Start a session. Outcomes are reported through notices.
    pub async fn start(&self, candidate_id: Option<u64>, cadence_ms: Option<u64>) {
        let inner = &self.inner;
        if inner.lock().status != SessionStatus::Idle {
            inner.reject("auto-mining is already running");
            return;
        }
        if let Some(ms) = cadence_ms
            && !cadence_in_range(ms)
        {
            inner.reject(format!("cadence {ms}ms outside {MIN_CADENCE_MS}..={MAX_CADENCE_MS}ms"));
            return;
        }

        if inner.ledger.actor().is_none() {
            inner.reject("no operator wallet connected");
            return;
        }

        let slot = inner.in_flight.lock().await;

        let claimed = {
            let mut state = inner.lock();
            if state.status != SessionStatus::Idle {
                Err("auto-mining is already running")
            } else if let Some(id) = candidate_id.or(state.selected) {
                state.selected = Some(id);
                state.starting = true;
                state.stop_requested = false;
                Ok(id)
            } else {
                Err("no miner selected")
            }
        };
        let candidate = match claimed {
            Ok(id) => id,
            Err(reason) => {
                inner.reject(reason);
                return;
            }
        };
        inner.publish();

        // Authorization probe: submitted, never awaited or counted.
        let fee_bid = inner.outcome.current_bid();
        if let Err(e) = inner.ledger.submit_action(candidate, fee_bid).await {
            inner.finish_starting();
            tracing::warn!(target: "scheduler", candidate_id = candidate, error = %e, "Start probe failed");
            inner.notifier.notify(Notice::StartFailed { reason: e.to_string() });
            return;
        }

        let token = CancellationToken::new();
        let begun = {
            let mut state = inner.lock();
            state.starting = false;
            if std::mem::take(&mut state.stop_requested) {
                None
            } else {
                if let Some(ms) = cadence_ms {
                    state.cadence_ms = ms;
                }
                state.session_id += 1;
                state.status = SessionStatus::Running;
                state.timer = Some(token.clone());
                Some((state.session_id, state.cadence_ms))
            }
        };
        let Some((session_id, cadence)) = begun else {
            drop(slot);
            tracing::info!(target: "scheduler", candidate_id = candidate, "Start cancelled by stop request");
            inner.publish();
            return;
        };
        inner.stats.reset();
        drop(slot);

        tracing::info!(target: "scheduler", session_id, candidate_id = candidate, cadence_ms = cadence, "Auto-mining started");
        inner.publish();
        inner.notifier.notify(Notice::Started {
            candidate_id: candidate,
            cadence_ms: cadence,
        });

        tokio::spawn(run_session(inner.clone(), session_id, token));
    }

    /// Stop the running session; a no-op when idle.
    pub fn stop(&self) {
        let inner = &self.inner;
        let (timer, session_id) = {
            let mut state = inner.lock();
            if state.status != SessionStatus::Running {
                if state.starting && !state.stop_requested {
                    state.stop_requested = true;
                    tracing::debug!(target: "scheduler", "Stop recorded while start probe is outstanding");
                }
                return;
            }
            state.status = SessionStatus::Stopping;
            let timer = state.timer.take();
            state.status = SessionStatus::Idle;
            (timer, state.session_id)
        };
        if let Some(timer) = timer {
            timer.cancel();
        }
        tracing::info!(target: "scheduler", session_id, "Auto-mining stopped");
        inner.publish();
        inner.notifier.notify(Notice::Stopped);
    }

    pub fn select_candidate(&self, candidate_id: u64) {
        let previous = {
            let mut state = self.inner.lock();
            state.selected.replace(candidate_id)
        };
        if previous != Some(candidate_id) {
            tracing::info!(target: "scheduler", candidate_id, previous = ?previous, "Miner selected");
        }
        self.inner.publish();
    }

    pub fn set_cadence(&self, cadence_ms: u64) {
        if !cadence_in_range(cadence_ms) {
            self.inner
                .reject(format!("cadence {cadence_ms}ms outside {MIN_CADENCE_MS}..={MAX_CADENCE_MS}ms"));
            return;
        }
        self.inner.lock().cadence_ms = cadence_ms;
        tracing::info!(target: "scheduler", cadence_ms, "Cadence updated");
        self.inner.publish();
    }

    pub fn set_auto_optimize(&self, enabled: bool) {
        let (swapped, running) = {
            let mut state = self.inner.lock();
            state.auto_optimize = enabled;
            (swap_to_optimum(&mut state), state.status == SessionStatus::Running)
        };
        tracing::info!(target: "scheduler", enabled, "Auto-optimize toggled");
        self.inner.announce_swap(swapped, running);
        self.inner.publish();
    }

    /// Replace the evaluated candidate set; with auto-optimize on, the selection
    /// follows the optimum from the next tick.
    pub fn apply_evaluation(&self, evaluated: Vec<EvaluatedCandidate>) {
        let (swapped, running) = {
            let mut state = self.inner.lock();
            state.candidates = evaluated;
            (swap_to_optimum(&mut state), state.status == SessionStatus::Running)
        };
        self.inner.announce_swap(swapped, running);
        self.inner.publish();
    }
}

/// Move the selection to the current optimum. An empty selection always adopts it.
fn swap_to_optimum(state: &mut SessionState) -> Option<(u64, String)> {
    let best = optimal(&state.candidates)?;
    if state.selected == Some(best.candidate.id) {
        return None;
    }
    if !state.auto_optimize && state.selected.is_some() {
        return None;
    }
    state.selected = Some(best.candidate.id);
    Some((best.candidate.id, best.candidate.name.clone()))
}

fn build_snapshot(state: &SessionState, stats: StatsSnapshot) -> SessionSnapshot {
    SessionSnapshot {
        status: state.status,
        session_id: state.session_id,
        selected_candidate: state.selected,
        cadence_ms: state.cadence_ms,
        target_tps: 1000.0 / state.cadence_ms as f64,
        auto_optimize: state.auto_optimize,
        candidates: state.candidates.clone(),
        stats,
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot(&self) -> SessionSnapshot {
        let stats = self.stats.snapshot();
        build_snapshot(&self.lock(), stats)
    }

    fn publish(&self) {
        self.view.send_replace(self.snapshot());
    }

    fn reject(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(target: "scheduler", %reason, "Command rejected");
        self.notifier.notify(Notice::CommandRejected { reason });
    }

    fn announce_swap(&self, swapped: Option<(u64, String)>, running: bool) {
        let Some((candidate_id, name)) = swapped else {
            return;
        };
        tracing::info!(target: "scheduler", candidate_id, %name, running, "Selection moved to optimal miner");
        if running {
            self.notifier.notify(Notice::CandidateSwapped { candidate_id, name });
        }
    }

    /// Miner for the next tick, or `None` once `session_id` is no longer running.
    fn tick_target(&self, session_id: u64) -> Option<u64> {
        let state = self.lock();
        if state.status != SessionStatus::Running || state.session_id != session_id {
            return None;
        }
        state.selected
    }

    fn finish_starting(&self) {
        let mut state = self.lock();
        state.starting = false;
        state.stop_requested = false;
    }

    fn cadence(&self) -> Duration {
        Duration::from_millis(self.lock().cadence_ms)
    }

    fn halt(&self, session_id: u64, condition: FatalCondition) {
        let timer = {
            let mut state = self.lock();
            if state.status != SessionStatus::Running || state.session_id != session_id {
                tracing::debug!(target: "scheduler", session_id, %condition, "Fatal result after session ended");
                return;
            }
            state.status = SessionStatus::Idle;
            state.timer.take()
        };
        if let Some(timer) = timer {
            timer.cancel();
        }
        tracing::error!(target: "scheduler", session_id, %condition, "Auto-mining halted");
        self.publish();
        self.notifier.notify(Notice::Halted { condition });
    }
}

async fn run_session(inner: Arc<Inner>, session_id: u64, timer: CancellationToken) {
    let mut delay = Duration::from_millis(FIRST_TICK_DELAY_MS);
    loop {
        tokio::select! {
            biased;
            _ = timer.cancelled() => break,
            _ = sleep(delay) => {}
        }

        let slot = inner.in_flight.lock().await;
        let Some(candidate_id) = inner.tick_target(session_id) else {
            break;
        };
        let resolution = inner.outcome.submit_and_resolve(candidate_id).await;
        drop(slot);

        match resolution {
            Resolution::Recorded(event) => {
                tracing::debug!(target: "scheduler", session_id, candidate_id, outcome = ?event.outcome, "Tick complete");
                inner.publish();
            }
            Resolution::Fatal(condition) => {
                inner.halt(session_id, condition);
                break;
            }
        }
        delay = inner.cadence();
    }
    tracing::debug!(target: "scheduler", session_id, "Session loop exited");
}
