//! Error types for the keno settlement engine
//!
//! The wager taxonomy is the contract with callers: every accepted submission
//! terminates in exactly one success outcome or one of these variants.

use crate::ledger::AccountId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Terminal error for a single wager submission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WagerError {
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("stake {stake} is below the {currency} minimum of {minimum}")]
    BelowMinimumStake {
        currency: String,
        stake: Decimal,
        minimum: Decimal,
    },

    #[error("settlement capacity exceeded, retry later")]
    CapacityExceeded,

    #[error("settlement timed out")]
    Timeout,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("internal settlement fault: {0}")]
    Internal(String),
}

impl WagerError {
    /// Machine-readable code used on the wire and in metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            WagerError::InvalidSelection(_) => "INVALID_SELECTION",
            WagerError::BelowMinimumStake { .. } => "BELOW_MINIMUM_STAKE",
            WagerError::CapacityExceeded => "CAPACITY_EXCEEDED",
            WagerError::Timeout => "TIMEOUT",
            WagerError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            WagerError::Persistence(_) => "PERSISTENCE_FAILURE",
            WagerError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller may safely resubmit the same wager.
    ///
    /// Capacity rejections clear on their own and persistence failures are
    /// never partially applied. Everything else is terminal for the wager.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WagerError::CapacityExceeded | WagerError::Persistence(_)
        )
    }
}

/// Errors surfaced by the ledger store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("balance {balance} cannot cover stake {stake}")]
    InsufficientFunds { balance: Decimal, stake: Decimal },

    #[error("unknown account {0}")]
    UnknownAccount(AccountId),

    #[error("amount {0} is not positive")]
    InvalidAmount(Decimal),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<LedgerError> for WagerError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds { .. } => WagerError::InsufficientFunds,
            LedgerError::Storage(msg) => WagerError::Persistence(msg),
            other => WagerError::Internal(other.to_string()),
        }
    }
}

/// Errors from the credential boundary. Issuing credentials is someone
/// else's job; the core only maps a presented token to an account.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("unrecognized token")]
    InvalidToken,
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("failed to load configuration: {0}")]
    Load(String),
}
