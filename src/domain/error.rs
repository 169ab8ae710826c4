// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::types::FatalCondition;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("Validation failed for field {field}: {message}")]
    Validation { field: String, message: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Failures reported by the ledger collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Operator declined the transaction: {0}")]
    Declined(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Ledger rejected query: {0}")]
    Rejected(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Finalization timed out after {waited_ms}ms for {tx}")]
    FinalizationTimeout { tx: String, waited_ms: u64 },

    #[error("Malformed ledger response: {0}")]
    Decode(String),
}

impl LedgerError {
    /// Classify a raw RPC/wallet error message.
    pub fn from_rpc_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("insufficient funds") || lowered.contains("insufficient balance") {
            LedgerError::InsufficientFunds(message)
        } else if lowered.contains("user rejected")
            || lowered.contains("user denied")
            || lowered.contains("rejected by user")
        {
            LedgerError::Declined(message)
        } else if lowered.contains("execution reverted") {
            LedgerError::Rejected(message)
        } else {
            LedgerError::Submission(message)
        }
    }

    /// Conditions that must end the running session.
    pub fn fatal_condition(&self) -> Option<FatalCondition> {
        match self {
            LedgerError::InsufficientFunds(_) => Some(FatalCondition::InsufficientBalance),
            LedgerError::Declined(_) => Some(FatalCondition::OperatorDeclined),
            _ => None,
        }
    }

    /// Read failures worth retrying within the same poll cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Transport(_))
    }
}
