// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::constants::EVENT_LOG_CAPACITY;
use crate::common::time_utils::current_unix_ms;
use crate::domain::types::{MiningEvent, Outcome, wei_to_native};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

/// Running session counters plus a bounded log of the most recent events.
pub struct StatisticsLedger {
    capacity: usize,
    revenue_per_success_wei: u128,
    reward_per_success: f64,
    inner: Mutex<LedgerState>,
}

struct LedgerState {
    attempts: u64,
    successes: u64,
    failures: u64,
    errors: u64,
    total_cost_wei: u128,
    total_revenue_wei: u128,
    total_gas_used: u128,
    /// Events that carried a receipt.
    metered: u64,
    last_gas_used: u64,
    started_at: Instant,
    started_at_unix_ms: u64,
    events: VecDeque<MiningEvent>,
}

impl LedgerState {
    fn fresh() -> Self {
        Self {
            attempts: 0,
            successes: 0,
            failures: 0,
            errors: 0,
            total_cost_wei: 0,
            total_revenue_wei: 0,
            total_gas_used: 0,
            metered: 0,
            last_gas_used: 0,
            started_at: Instant::now(),
            started_at_unix_ms: current_unix_ms(),
            events: VecDeque::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub errors: u64,
    pub success_rate: f64,
    /// Attempts per second since the session started.
    pub throughput: f64,
    pub total_cost_wei: u128,
    pub total_revenue_wei: u128,
    pub net_value_wei: i128,
    pub net_value_native: f64,
    pub rewards_earned: f64,
    pub last_gas_used: u64,
    pub avg_gas_used: u64,
    pub started_at: u64,
    pub elapsed_ms: u64,
    /// Oldest first.
    pub recent_events: Vec<MiningEvent>,
}

impl StatisticsLedger {
    pub fn new(revenue_per_success_wei: u128, reward_per_success: f64) -> Self {
        Self::with_capacity(EVENT_LOG_CAPACITY, revenue_per_success_wei, reward_per_success)
    }

    pub fn with_capacity(capacity: usize, revenue_per_success_wei: u128, reward_per_success: f64) -> Self {
        Self {
            capacity: capacity.max(1),
            revenue_per_success_wei,
            reward_per_success,
            inner: Mutex::new(LedgerState::fresh()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Clear counters and log; the throughput clock restarts now.
    pub fn reset(&self) {
        *self.lock() = LedgerState::fresh();
    }

    pub fn record(&self, event: MiningEvent) {
        let mut state = self.lock();
        state.attempts += 1;
        match event.outcome {
            Outcome::Success => {
                state.successes += 1;
                state.total_revenue_wei = state.total_revenue_wei.saturating_add(self.revenue_per_success_wei);
            }
            Outcome::Failure => state.failures += 1,
            Outcome::Error => state.errors += 1,
        }
        state.total_cost_wei = state.total_cost_wei.saturating_add(event.cost);
        if event.gas_used > 0 {
            state.total_gas_used = state.total_gas_used.saturating_add(event.gas_used as u128);
            state.metered += 1;
            state.last_gas_used = event.gas_used;
        }
        if state.events.len() >= self.capacity {
            state.events.pop_front();
        }
        state.events.push_back(event);
    }

    pub fn attempts(&self) -> u64 {
        self.lock().attempts
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let state = self.lock();
        let elapsed = state.started_at.elapsed();
        let elapsed_secs = elapsed.as_secs_f64();
        let success_rate = if state.attempts == 0 {
            0.0
        } else {
            state.successes as f64 / state.attempts as f64
        };
        let throughput = if elapsed_secs > 0.0 {
            state.attempts as f64 / elapsed_secs
        } else {
            0.0
        };
        let net_value_wei = i128::try_from(state.total_revenue_wei)
            .unwrap_or(i128::MAX)
            .saturating_sub(i128::try_from(state.total_cost_wei).unwrap_or(i128::MAX));
        let avg_gas_used = if state.metered == 0 {
            0
        } else {
            (state.total_gas_used / state.metered as u128) as u64
        };

        StatsSnapshot {
            attempts: state.attempts,
            successes: state.successes,
            failures: state.failures,
            errors: state.errors,
            success_rate,
            throughput,
            total_cost_wei: state.total_cost_wei,
            total_revenue_wei: state.total_revenue_wei,
            net_value_wei,
            net_value_native: wei_to_native(state.total_revenue_wei) - wei_to_native(state.total_cost_wei),
            rewards_earned: state.successes as f64 * self.reward_per_success,
            last_gas_used: state.last_gas_used,
            avg_gas_used,
            started_at: state.started_at_unix_ms,
            elapsed_ms: elapsed.as_millis() as u64,
            recent_events: state.events.iter().cloned().collect(),
        }
    }
}
