// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::constants::{READ_RETRY_ATTEMPTS, READ_RETRY_DELAY_MS};
use crate::common::error::LedgerError;
use crate::common::retry::retry_async_if;
use crate::common::time_utils::current_unix_ms;
use crate::domain::types::FeeSample;
use crate::network::ledger::SharedLedger;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

/// Tracks the ledger's current fee price.
///
/// The latest sample is published on a watch channel, so readers never block
/// and dependants can await changes. A failed poll keeps the previous sample.
#[derive(Clone)]
pub struct FeeTracker {
    ledger: SharedLedger,
    poll_interval: Duration,
    latest: watch::Sender<FeeSample>,
}

impl FeeTracker {
    pub fn new(ledger: SharedLedger, poll_interval: Duration) -> Self {
        let (latest, _) = watch::channel(FeeSample::default());
        Self {
            ledger,
            poll_interval,
            latest,
        }
    }

    pub fn current_fee(&self) -> FeeSample {
        *self.latest.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeeSample> {
        self.latest.subscribe()
    }

    /// Poll once; returns the sample now current.
    pub async fn refresh(&self) -> FeeSample {
        let ledger = self.ledger.clone();
        let fetched = retry_async_if(
            move |_| {
                let ledger = ledger.clone();
                async move { ledger.read_current_fee_price().await }
            },
            READ_RETRY_ATTEMPTS,
            Duration::from_millis(READ_RETRY_DELAY_MS),
            LedgerError::is_transient,
        )
        .await;

        match fetched {
            Ok(value) => {
                let observed_at = current_unix_ms();
                self.latest.send_if_modified(|sample| {
                    let changed = sample.value != value || sample.observed_at == 0;
                    *sample = FeeSample { value, observed_at };
                    changed
                });
                tracing::debug!(target: "fee", fee_wei = value, "Fee price updated");
            }
            Err(e) => {
                let stale = self.current_fee();
                tracing::warn!(
                    target: "fee",
                    error = %e,
                    stale_fee_wei = stale.value,
                    "Fee poll failed; keeping last sample"
                );
            }
        }
        self.current_fee()
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(target: "fee", every_ms = self.poll_interval.as_millis() as u64, "Fee tracker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.refresh().await;
                }
            }
        }
        tracing::info!(target: "fee", "Fee tracker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::simulated::SimulatedLedger;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn keeps_last_sample_on_failure() {
        let ledger = Arc::new(SimulatedLedger::new(None));
        ledger.set_fee(42);
        let tracker = FeeTracker::new(ledger.clone(), Duration::from_secs(10));
        assert_eq!(tracker.current_fee().value, 0);

        assert_eq!(tracker.refresh().await.value, 42);
        let first = tracker.current_fee();
        assert!(first.observed_at > 0);

        ledger.set_fee_error(Some(LedgerError::Transport("down".into())));
        ledger.set_fee(99);
        assert_eq!(tracker.refresh().await, first);

        ledger.set_fee_error(None);
        assert_eq!(tracker.refresh().await.value, 99);
    }

    #[tokio::test(start_paused = true)]
    async fn run_publishes_changes_until_shutdown() {
        let ledger = Arc::new(SimulatedLedger::new(None));
        ledger.set_fee(7);
        let tracker = FeeTracker::new(ledger.clone(), Duration::from_secs(10));
        let mut rx = tracker.subscribe();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(tracker.clone().run(shutdown.clone()));

        rx.changed().await.expect("first sample");
        assert_eq!(rx.borrow_and_update().value, 7);

        ledger.set_fee(8);
        rx.changed().await.expect("second sample");
        assert_eq!(rx.borrow().value, 8);

        shutdown.cancel();
        task.await.expect("join");
    }
}
