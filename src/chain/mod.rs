//! Chain module - the remote collaborators of the submission pipeline
//!
//! This module provides:
//! - The `ChainClient` seam over the JSON-RPC calls the pipeline issues
//! - An ethers-backed provider with multi-RPC failover
//! - The `Account` seam over transaction signing

pub mod account;
pub mod provider;

pub use account::{Account, WalletAccount};
pub use provider::ChainProvider;

use crate::error::SubmitResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};

#[cfg(test)]
use mockall::automock;

/// A transaction accepted by the node but not yet confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSubmission {
    pub tx_hash: H256,
    /// Chain head when the transaction was sent; the confirmation wait counts from here
    pub submitted_at_block: u64,
}

/// JSON-RPC calls issued while preparing, sending and confirming a transaction.
///
/// Implementations must be safe to share between independent submissions.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain this client is connected to
    fn chain_id(&self) -> u64;

    /// Gas the transaction would use if sent by `sender`
    async fn estimate_gas(&self, tx: &TypedTransaction, sender: Address) -> SubmitResult<U256>;

    /// Current base fee (`eth_gasPrice`)
    async fn get_base_fee(&self) -> SubmitResult<U256>;

    /// Suggested priority tip (`eth_maxPriorityFeePerGas`)
    async fn get_suggested_priority_fee(&self) -> SubmitResult<U256>;

    /// Number of transactions mined from `address`, i.e. its next nonce
    async fn get_transaction_count(&self, address: Address) -> SubmitResult<U256>;

    /// Broadcast a signed transaction
    async fn send_raw_transaction(&self, raw: Bytes) -> SubmitResult<PendingSubmission>;

    /// Wait until `pending` is mined or `max_blocks` blocks have passed
    async fn wait_for_receipt(
        &self,
        pending: PendingSubmission,
        max_blocks: u64,
    ) -> SubmitResult<TransactionReceipt>;
}
