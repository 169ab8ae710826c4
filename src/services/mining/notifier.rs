// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::constants::NOTICE_LOG_CAPACITY;
use crate::common::time_utils::current_unix_ms;
use crate::domain::types::FatalCondition;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// User-visible notices emitted by the scheduler and optimizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Notice {
    Started { candidate_id: u64, cadence_ms: u64 },
    Stopped,
    StartFailed { reason: String },
    CommandRejected { reason: String },
    MiningSucceeded { candidate_id: u64, successes: u64, reward: f64 },
    CandidateSwapped { candidate_id: u64, name: String },
    Halted { condition: FatalCondition },
}

impl Notice {
    pub fn level(&self) -> NoticeLevel {
        match self {
            Notice::Started { .. } | Notice::MiningSucceeded { .. } => NoticeLevel::Success,
            Notice::Stopped | Notice::CandidateSwapped { .. } => NoticeLevel::Info,
            Notice::StartFailed { .. } | Notice::CommandRejected { .. } | Notice::Halted { .. } => {
                NoticeLevel::Error
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Notice::Halted { .. })
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Started {
                candidate_id,
                cadence_ms,
            } => write!(
                f,
                "Auto-mining started with miner #{candidate_id} ({:.1} TPS)",
                1000.0 / (*cadence_ms).max(1) as f64
            ),
            Notice::Stopped => f.write_str("Auto-mining stopped"),
            Notice::StartFailed { reason } => write!(f, "Auto-mining failed to start: {reason}"),
            Notice::CommandRejected { reason } => write!(f, "Command rejected: {reason}"),
            Notice::MiningSucceeded {
                successes, reward, ..
            } => write!(f, "Mining succeeded! +{reward} MM | {successes} successes total"),
            Notice::CandidateSwapped { candidate_id, name } => {
                write!(f, "Auto-optimized miner: {name} (#{candidate_id})")
            }
            Notice::Halted { condition } => write!(f, "Auto-mining halted: {condition}"),
        }
    }
}

/// Injected notice side channel.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

pub type SharedNotifier = Arc<dyn Notifier>;

fn log_notice(notice: &Notice) {
    match notice.level() {
        NoticeLevel::Error => tracing::warn!(target: "notice", "{}", notice),
        _ => tracing::info!(target: "notice", "{}", notice),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeRecord {
    pub at: u64,
    pub level: NoticeLevel,
    pub message: String,
    pub notice: Notice,
}

/// Keeps the most recent notices for the presentation layer and fans them out to
/// live subscribers.
pub struct BufferedNotifier {
    capacity: usize,
    recent: Mutex<VecDeque<NoticeRecord>>,
    live: broadcast::Sender<NoticeRecord>,
}

impl Default for BufferedNotifier {
    fn default() -> Self {
        Self::new(NOTICE_LOG_CAPACITY)
    }
}

impl BufferedNotifier {
    pub fn new(capacity: usize) -> Self {
        let (live, _) = broadcast::channel(capacity.max(1));
        Self {
            capacity: capacity.max(1),
            recent: Mutex::new(VecDeque::new()),
            live,
        }
    }

    pub fn recent(&self) -> Vec<NoticeRecord> {
        self.recent
            .lock()
            .map(|guard| guard.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.recent().into_iter().map(|r| r.notice).collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NoticeRecord> {
        self.live.subscribe()
    }
}

impl Notifier for BufferedNotifier {
    fn notify(&self, notice: Notice) {
        log_notice(&notice);
        let record = NoticeRecord {
            at: current_unix_ms(),
            level: notice.level(),
            message: notice.to_string(),
            notice,
        };
        if let Ok(mut guard) = self.recent.lock() {
            if guard.len() >= self.capacity {
                guard.pop_front();
            }
            guard.push_back(record.clone());
        }
        // No subscribers is fine.
        let _ = self.live.send(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_is_bounded_and_ordered() {
        let notifier = BufferedNotifier::new(2);
        notifier.notify(Notice::Stopped);
        notifier.notify(Notice::CommandRejected { reason: "x".into() });
        notifier.notify(Notice::Halted {
            condition: FatalCondition::OperatorDeclined,
        });
        let notices = notifier.notices();
        assert_eq!(notices.len(), 2);
        assert!(notices[1].is_terminal());
        assert_eq!(notifier.recent()[1].level, NoticeLevel::Error);
    }

    #[test]
    fn start_notice_reports_target_tps() {
        let notice = Notice::Started {
            candidate_id: 4,
            cadence_ms: 200,
        };
        assert!(notice.to_string().contains("5.0 TPS"));
        assert_eq!(notice.level(), NoticeLevel::Success);
    }

    #[tokio::test]
    async fn subscribers_receive_live_notices() {
        let notifier = BufferedNotifier::default();
        let mut rx = notifier.subscribe();
        notifier.notify(Notice::Stopped);
        let record = rx.recv().await.expect("notice");
        assert_eq!(record.notice, Notice::Stopped);
        assert_eq!(record.message, "Auto-mining stopped");
    }
}
