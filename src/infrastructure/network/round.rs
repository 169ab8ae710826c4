// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::constants::{READ_RETRY_ATTEMPTS, READ_RETRY_DELAY_MS};
use crate::common::error::LedgerError;
use crate::common::retry::retry_async_if;
use crate::domain::types::RoundState;
use crate::network::ledger::SharedLedger;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

/// Polls the GameManager for the current round and publishes changes.
#[derive(Clone)]
pub struct RoundWatcher {
    ledger: SharedLedger,
    poll_interval: Duration,
    current: watch::Sender<Option<RoundState>>,
}

impl RoundWatcher {
    pub fn new(ledger: SharedLedger, poll_interval: Duration) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            ledger,
            poll_interval,
            current,
        }
    }

    pub fn current_round(&self) -> Option<RoundState> {
        *self.current.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<RoundState>> {
        self.current.subscribe()
    }

    pub async fn refresh(&self) -> Option<RoundState> {
        let ledger = self.ledger.clone();
        let fetched = retry_async_if(
            move |_| {
                let ledger = ledger.clone();
                async move { ledger.read_round().await }
            },
            READ_RETRY_ATTEMPTS,
            Duration::from_millis(READ_RETRY_DELAY_MS),
            LedgerError::is_transient,
        )
        .await;

        match fetched {
            Ok(round) => {
                let changed = self.current.send_if_modified(|current| {
                    if *current == Some(round) {
                        false
                    } else {
                        *current = Some(round);
                        true
                    }
                });
                if changed {
                    tracing::info!(
                        target: "round",
                        round_id = round.round_id,
                        pattern = %round.pattern,
                        range_min = round.range_min,
                        range_max = round.range_max,
                        "Round changed"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(target: "round", error = %e, "Round poll failed; keeping last round");
            }
        }
        self.current_round()
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.refresh().await;
                }
            }
        }
        tracing::info!(target: "round", "Round watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Pattern;
    use crate::network::simulated::SimulatedLedger;
    use std::sync::Arc;

    #[tokio::test]
    async fn publishes_only_on_change() {
        let ledger = Arc::new(SimulatedLedger::new(None));
        let watcher = RoundWatcher::new(ledger.clone(), Duration::from_secs(5));
        let mut rx = watcher.subscribe();

        let first = watcher.refresh().await.expect("round");
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        watcher.refresh().await;
        assert!(!rx.has_changed().unwrap(), "same round must not notify");

        ledger.set_round(RoundState {
            round_id: first.round_id + 1,
            pattern: Pattern::Prime,
            range_min: 1,
            range_max: 500,
        });
        let next = watcher.refresh().await.expect("round");
        assert_eq!(next.pattern, Pattern::Prime);
        assert!(rx.has_changed().unwrap());
    }
}
