// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use auto_miner::app::config::GlobalSettings;
use auto_miner::app::logging::setup_logging;
use auto_miner::domain::error::AppError;
use auto_miner::infrastructure::network::ledger::{EvmLedger, SharedLedger};
use auto_miner::infrastructure::network::provider::ConnectionFactory;
use auto_miner::infrastructure::network::simulated::SimulatedLedger;
use auto_miner::services::engine::{Engine, EngineConfig};
use auto_miner::services::mining::scheduler::SchedulerSettings;
use clap::Parser;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "expected-value auto-miner")]
struct Cli {
    /// Path to config file (default: config.toml when present)
    #[arg(long)]
    config: Option<String>,

    /// Mine against an in-memory ledger instead of the chain
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Control API port (overrides config/env); 0 disables the endpoint
    #[arg(long)]
    control_port: Option<u16>,

    /// Delay between attempts in milliseconds (100..=1000)
    #[arg(long)]
    cadence_ms: Option<u64>,

    /// Miner NFT id to select at startup
    #[arg(long)]
    candidate: Option<u64>,

    /// Start a mining session as soon as the first evaluation is done
    #[arg(long, default_value_t = false)]
    autostart: bool,

    /// Keep the selected miner instead of following the optimum
    #[arg(long, default_value_t = false)]
    no_auto_optimize: bool,
}

fn apply_cli_overrides(settings: &mut GlobalSettings, cli: &Cli) -> Result<(), AppError> {
    if let Some(port) = cli.control_port {
        settings.control_port = port;
    }
    if let Some(ms) = cli.cadence_ms {
        settings.cadence_ms = ms;
    }
    if cli.no_auto_optimize {
        settings.auto_optimize = false;
    }
    settings.validate()
}

fn operator_signer(settings: &GlobalSettings) -> Result<PrivateKeySigner, AppError> {
    let signer = PrivateKeySigner::from_str(settings.wallet_key.trim())
        .map_err(|e| AppError::Config(format!("Invalid wallet key: {}", e)))?;
    if let Some(expected) = settings.wallet_address
        && expected != signer.address()
    {
        return Err(AppError::Validation {
            field: "wallet_address".into(),
            message: format!(
                "configured {expected:#x} does not match key address {:#x}",
                signer.address()
            ),
        });
    }
    Ok(signer)
}

async fn live_ledger(settings: &GlobalSettings) -> Result<SharedLedger, AppError> {
    let contracts = settings.require_live()?;
    let signer = operator_signer(settings)?;
    let operator = signer.address();
    let provider = ConnectionFactory::wallet_http(&settings.rpc_url, signer)?;
    let chain_id = ConnectionFactory::preflight(&provider).await?;
    tracing::info!(
        target: "config",
        chain_id,
        operator = %operator,
        engine = %contracts.mining_engine,
        "Connected to ledger"
    );
    Ok(Arc::new(EvmLedger::new(
        provider,
        operator,
        contracts,
        settings.gas_limit,
        Duration::from_millis(settings.receipt_poll_ms_value()),
        Duration::from_millis(settings.receipt_timeout_ms_value()),
    )))
}

fn dry_run_ledger(settings: &GlobalSettings) -> SharedLedger {
    let actor = settings
        .wallet_address
        .or_else(|| operator_signer(settings).ok().map(|s| s.address()))
        .unwrap_or(Address::with_last_byte(1));
    tracing::warn!(target: "config", operator = %actor, "Dry run: mining against the simulated ledger");
    Arc::new(SimulatedLedger::demo(actor))
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let mut settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
    apply_cli_overrides(&mut settings, &cli)?;
    setup_logging(if settings.debug { "debug" } else { "info" }, settings.log_json);

    let ledger = if cli.dry_run {
        dry_run_ledger(&settings)
    } else {
        live_ledger(&settings).await?
    };

    let engine = Engine::new(
        ledger,
        EngineConfig {
            economics: settings.economics(),
            scheduler: SchedulerSettings {
                cadence_ms: settings.cadence_ms,
                auto_optimize: settings.auto_optimize,
            },
            fee_poll: settings.fee_poll_interval(),
            round_poll: settings.round_poll_interval(),
            control_bind: settings.control_bind_value()?,
            control_port: (settings.control_port != 0).then_some(settings.control_port),
            initial_candidate: cli.candidate,
            autostart: cli.autostart,
        },
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        tracing::info!("Shutdown requested");
        signal.cancel();
    });

    engine.run(shutdown).await
}
