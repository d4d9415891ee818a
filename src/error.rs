//! Error types for transaction submission

use ethers::types::H256;
use std::fmt;
use thiserror::Error;

/// Why a node refused a raw transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    NonceTooLow,
    Underpriced,
    InsufficientFunds,
    Other,
}

impl RejectionReason {
    /// Classify a JSON-RPC error message returned by `eth_sendRawTransaction`
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();
        if message.contains("nonce too low") || message.contains("already known") {
            RejectionReason::NonceTooLow
        } else if message.contains("underpriced") || message.contains("fee cap less than") {
            RejectionReason::Underpriced
        } else if message.contains("insufficient funds") {
            RejectionReason::InsufficientFunds
        } else {
            RejectionReason::Other
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RejectionReason::NonceTooLow => "nonce too low",
            RejectionReason::Underpriced => "underpriced",
            RejectionReason::InsufficientFunds => "insufficient funds",
            RejectionReason::Other => "rejected",
        };
        f.write_str(name)
    }
}

/// Main error type for the submission pipeline
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Gas estimation requires the sender account")]
    MissingSender,

    #[error("Transaction rejected on chain {chain_id} ({reason}): {message}")]
    SubmissionRejected {
        chain_id: u64,
        reason: RejectionReason,
        message: String,
    },

    #[error("No receipt for {tx_hash:?} within {blocks} blocks")]
    ConfirmationTimeout { tx_hash: H256, blocks: u64 },

    #[error("All {attempts} attempts failed: {source}")]
    ExhaustedRetries {
        attempts: u32,
        source: Box<SubmitError>,
    },

    #[error("Chain connection error for chain {chain_id}: {message}")]
    ChainConnection { chain_id: u64, message: String },

    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    #[error("Nonce error for chain {chain_id}: {message}")]
    Nonce { chain_id: u64, message: String },

    #[error("Wallet error: {0}")]
    Wallet(String),
}

impl SubmitError {
    /// Check if error is transient
    pub fn is_retryable(&self) -> bool {
        match self {
            SubmitError::ChainConnection { .. }
            | SubmitError::ConfirmationTimeout { .. }
            | SubmitError::GasEstimation(_)
            | SubmitError::Nonce { .. } => true,
            SubmitError::SubmissionRejected { reason, .. } => matches!(
                reason,
                RejectionReason::NonceTooLow | RejectionReason::Underpriced
            ),
            _ => false,
        }
    }

    /// The underlying failure, looking through `ExhaustedRetries`
    pub fn last_failure(&self) -> &SubmitError {
        match self {
            SubmitError::ExhaustedRetries { source, .. } => source.last_failure(),
            other => other,
        }
    }
}

/// Result type for submission operations
pub type SubmitResult<T> = Result<T, SubmitError>;
