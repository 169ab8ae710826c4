// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

// =============================================================================
// UNITS
// =============================================================================

pub const WEI_PER_GWEI: u128 = 1_000_000_000;
pub const WEI_PER_NATIVE: f64 = 1e18;

/// Success rates are reported by the MiningEngine in basis points.
pub const RATE_SCALE: u64 = 10_000;

// =============================================================================
// ECONOMICS
// =============================================================================

/// Reward tokens minted per successful attempt.
pub const DEFAULT_REWARD_PER_SUCCESS: f64 = 27.0;
/// Native value of one reward token used when ranking candidates.
pub const DEFAULT_REWARD_VALUE_NATIVE: f64 = 1.0;
/// Gas units assumed per attempt when ranking candidates.
pub const DEFAULT_GAS_ESTIMATE: u64 = 200_000;
/// Gas limit attached to each submitted attempt.
pub const DEFAULT_GAS_LIMIT: u64 = 250_000;
pub const DEFAULT_PRIORITY_FEE_GWEI: u64 = 1;

// =============================================================================
// SCHEDULING
// =============================================================================

pub const DEFAULT_CADENCE_MS: u64 = 200;
pub const MIN_CADENCE_MS: u64 = 100;
pub const MAX_CADENCE_MS: u64 = 1_000;
pub const FIRST_TICK_DELAY_MS: u64 = 100;

pub const DEFAULT_FEE_POLL_SECS: u64 = 10;
pub const DEFAULT_ROUND_POLL_SECS: u64 = 5;
pub const DEFAULT_RECEIPT_POLL_MS: u64 = 500;
pub const DEFAULT_RECEIPT_TIMEOUT_MS: u64 = 60_000;

pub const READ_RETRY_ATTEMPTS: usize = 3;
pub const READ_RETRY_DELAY_MS: u64 = 100;

// =============================================================================
// BOOKKEEPING
// =============================================================================

pub const EVENT_LOG_CAPACITY: usize = 50;
pub const NOTICE_LOG_CAPACITY: usize = 100;

pub const DEFAULT_CONTROL_PORT: u16 = 9000;
