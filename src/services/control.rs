// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::parsing::{parse_boolish, parse_query, parse_u64_flexible};
use crate::domain::types::SessionStatus;
use crate::services::mining::notifier::BufferedNotifier;
use crate::services::mining::scheduler::{MiningScheduler, SessionSnapshot};
use serde_json::json;
use std::fmt::Write as _;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Presentation-layer command. Accepted commands answer 202; the outcome shows
/// up as a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start {
        candidate: Option<u64>,
        cadence_ms: Option<u64>,
    },
    Stop,
    Select(u64),
    Cadence(u64),
    AutoOptimize(bool),
}

impl Command {
    /// `Ok(None)` when `route` is not a command route.
    pub fn parse(route: &str, query: &str) -> Result<Option<Command>, String> {
        let params = parse_query(query);
        let number = |key: &str| -> Result<Option<u64>, String> {
            match params.get(key) {
                None => Ok(None),
                Some(raw) => parse_u64_flexible(raw)
                    .map(Some)
                    .ok_or_else(|| format!("invalid {key}: {raw}")),
            }
        };
        let required = |key: &str| -> Result<u64, String> { number(key)?.ok_or_else(|| format!("missing {key}")) };

        let command = match route.trim_end_matches('/') {
            "/start" => Command::Start {
                candidate: number("candidate")?,
                cadence_ms: number("cadence")?,
            },
            "/stop" => Command::Stop,
            "/select" => Command::Select(required("candidate")?),
            "/cadence" => Command::Cadence(required("ms")?),
            "/auto_optimize" => {
                let raw = params.get("enabled").ok_or("missing enabled")?;
                Command::AutoOptimize(parse_boolish(raw).ok_or_else(|| format!("invalid enabled: {raw}"))?)
            }
            _ => return Ok(None),
        };
        Ok(Some(command))
    }

    pub async fn apply(self, scheduler: &MiningScheduler) {
        match self {
            Command::Start { candidate, cadence_ms } => scheduler.start(candidate, cadence_ms).await,
            Command::Stop => scheduler.stop(),
            Command::Select(id) => scheduler.select_candidate(id),
            Command::Cadence(ms) => scheduler.set_cadence(ms),
            Command::AutoOptimize(enabled) => scheduler.set_auto_optimize(enabled),
        }
    }
}

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
}

pub async fn spawn_control_server(
    bind: IpAddr,
    port: u16,
    scheduler: MiningScheduler,
    notices: Arc<BufferedNotifier>,
    shutdown: CancellationToken,
) -> Option<SocketAddr> {
    let addr = SocketAddr::new(bind, port);
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!(target: "control", "Control server failed to bind {}: {}", addr, e);
            return None;
        }
    };

    let local = listener.local_addr().ok();
    if let Some(addr) = local {
        tracing::info!(target: "control", "Control server listening on {}", addr);
    }

    tokio::spawn(async move {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((mut socket, _)) => {
                    let mut buf = [0u8; 1024];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let req = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = req
                        .lines()
                        .next()
                        .and_then(|l| l.split_whitespace().nth(1))
                        .unwrap_or("/");
                    let response = handle(path, &scheduler, &notices);
                    let _ = socket.write_all(response.as_bytes()).await;
                }
                Err(e) => {
                    tracing::warn!(target: "control", "Control accept error: {}", e);
                    continue;
                }
            }
        }
        tracing::info!(target: "control", "Control server stopped");
    });

    local
}

fn handle(path: &str, scheduler: &MiningScheduler, notices: &BufferedNotifier) -> String {
    let (route, query) = path.split_once('?').unwrap_or((path, ""));
    match Command::parse(route, query) {
        Ok(Some(command)) => {
            tracing::debug!(target: "control", ?command, "Command accepted");
            let scheduler = scheduler.clone();
            tokio::spawn(async move { command.apply(&scheduler).await });
            let body = json!({"status": "accepted"}).to_string();
            return http_response("202 Accepted", "application/json", &body);
        }
        Err(e) => {
            let body = json!({"status": "error", "error": e}).to_string();
            return http_response("400 Bad Request", "application/json", &body);
        }
        Ok(None) => {}
    }

    match route.trim_end_matches('/') {
        "/snapshot" => {
            let body = serde_json::to_string(&scheduler.snapshot()).unwrap_or_else(|_| "{}".to_string());
            http_response("200 OK", "application/json", &body)
        }
        "/notices" => {
            let body = serde_json::to_string(&notices.recent()).unwrap_or_else(|_| "[]".to_string());
            http_response("200 OK", "application/json", &body)
        }
        "" | "/metrics" => http_response("200 OK", "text/plain", &render_metrics(&scheduler.snapshot())),
        _ => {
            let body = json!({"status": "error", "error": "not found"}).to_string();
            http_response("404 Not Found", "application/json", &body)
        }
    }
}

fn render_metrics(snapshot: &SessionSnapshot) -> String {
    let stats = &snapshot.stats;
    let running = u8::from(snapshot.status == SessionStatus::Running);
    let mut body = format!(
        concat!(
            "# TYPE auto_miner_attempts counter\nauto_miner_attempts {}\n",
            "# TYPE auto_miner_successes counter\nauto_miner_successes {}\n",
            "# TYPE auto_miner_failures counter\nauto_miner_failures {}\n",
            "# TYPE auto_miner_errors counter\nauto_miner_errors {}\n",
            "# TYPE auto_miner_success_rate gauge\nauto_miner_success_rate {}\n",
            "# TYPE auto_miner_throughput gauge\nauto_miner_throughput {}\n",
            "# TYPE auto_miner_cost_wei counter\nauto_miner_cost_wei {}\n",
            "# TYPE auto_miner_net_value_native gauge\nauto_miner_net_value_native {}\n",
            "# TYPE auto_miner_avg_gas_used gauge\nauto_miner_avg_gas_used {}\n",
            "# TYPE auto_miner_running gauge\nauto_miner_running {}\n",
            "# TYPE auto_miner_cadence_ms gauge\nauto_miner_cadence_ms {}\n"
        ),
        stats.attempts,
        stats.successes,
        stats.failures,
        stats.errors,
        stats.success_rate,
        stats.throughput,
        stats.total_cost_wei,
        stats.net_value_native,
        stats.avg_gas_used,
        running,
        snapshot.cadence_ms,
    );

    for evaluated in &snapshot.candidates {
        let _ = writeln!(
            body,
            "auto_miner_expected_net_value{{miner=\"{}\",optimal=\"{}\"}} {}",
            evaluated.candidate.id, evaluated.is_optimal, evaluated.expected_net_value
        );
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::MiningEconomics;
    use crate::network::gas::FeeTracker;
    use crate::network::simulated::SimulatedLedger;
    use crate::services::mining::outcome::OutcomeProcessor;
    use crate::services::mining::scheduler::SchedulerSettings;
    use crate::services::mining::stats::StatisticsLedger;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn scheduler(notices: Arc<BufferedNotifier>) -> MiningScheduler {
        let ledger = Arc::new(SimulatedLedger::new(None).with_candidate(1, 0.1));
        let econ = MiningEconomics::default();
        let fees = FeeTracker::new(ledger.clone(), Duration::from_secs(10));
        let stats = Arc::new(StatisticsLedger::new(0, 0.0));
        let outcome = OutcomeProcessor::new(ledger.clone(), fees, stats, notices.clone(), econ);
        MiningScheduler::new(
            ledger,
            outcome,
            notices,
            SchedulerSettings {
                cadence_ms: 200,
                auto_optimize: true,
            },
        )
    }

    #[test]
    fn parses_command_routes() {
        assert_eq!(
            Command::parse("/start", "candidate=3&cadence=250"),
            Ok(Some(Command::Start {
                candidate: Some(3),
                cadence_ms: Some(250)
            }))
        );
        assert_eq!(Command::parse("/stop/", ""), Ok(Some(Command::Stop)));
        assert_eq!(Command::parse("/auto_optimize", "enabled=off"), Ok(Some(Command::AutoOptimize(false))));
        assert!(Command::parse("/select", "").is_err());
        assert!(Command::parse("/cadence", "ms=fast").is_err());
        assert_eq!(Command::parse("/snapshot", ""), Ok(None));
    }

    #[tokio::test]
    async fn serves_snapshot_and_accepts_commands() {
        let notices = Arc::new(BufferedNotifier::default());
        let scheduler = scheduler(notices.clone());
        let shutdown = CancellationToken::new();
        let addr = spawn_control_server(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
            scheduler.clone(),
            notices.clone(),
            shutdown.clone(),
        )
        .await
        .expect("bind control");

        let metrics = reqwest::get(format!("http://{addr}/metrics"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(metrics.contains("auto_miner_attempts 0"));

        let resp = reqwest::get(format!("http://{addr}/cadence?ms=400")).await.unwrap();
        assert_eq!(resp.status().as_u16(), 202);

        let mut view = scheduler.subscribe();
        while view.borrow_and_update().cadence_ms != 400 {
            view.changed().await.expect("scheduler alive");
        }

        let snapshot: serde_json::Value = reqwest::get(format!("http://{addr}/snapshot"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(snapshot["cadenceMs"], 400);
        assert_eq!(snapshot["status"], "Idle");

        let resp = reqwest::get(format!("http://{addr}/select")).await.unwrap();
        assert_eq!(resp.status().as_u16(), 400);

        shutdown.cancel();
    }
}
