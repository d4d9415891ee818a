//! Transaction submission and confirmation wait

use crate::chain::{Account, ChainClient};
use crate::error::{SubmitError, SubmitResult};
use crate::metrics;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::TransactionReceipt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Signs, sends and waits for one fully parameterized transaction.
///
/// Does not retry: every failure is returned to the caller as is.
pub struct TransactionSubmitter {
    client: Arc<dyn ChainClient>,
    max_blocks_wait_time: u64,
}

impl TransactionSubmitter {
    pub fn new(client: Arc<dyn ChainClient>, max_blocks_wait_time: u64) -> Self {
        Self {
            client,
            max_blocks_wait_time,
        }
    }

    /// Submit `tx` signed by `account` and wait for its receipt
    pub async fn submit_and_wait(
        &self,
        tx: &TypedTransaction,
        account: &dyn Account,
    ) -> SubmitResult<TransactionReceipt> {
        let chain_id = self.client.chain_id();
        debug!(
            "[request] chain {} tx = {}",
            chain_id,
            serde_json::to_string(tx).unwrap_or_else(|_| format!("{:?}", tx))
        );

        let raw = account.sign_transaction(tx).await?;
        let pending = match self.client.send_raw_transaction(raw).await {
            Ok(pending) => pending,
            Err(e) => {
                if matches!(e, SubmitError::SubmissionRejected { .. }) {
                    metrics::record_tx_rejected(chain_id);
                }
                return Err(e);
            }
        };
        metrics::record_tx_sent(chain_id);

        info!(
            "Transaction sent: {:?} (nonce {:?}, block {})",
            pending.tx_hash,
            tx.nonce(),
            pending.submitted_at_block
        );

        match self
            .client
            .wait_for_receipt(pending, self.max_blocks_wait_time)
            .await
        {
            Ok(receipt) => {
                metrics::record_tx_confirmed(chain_id);
                debug!(
                    "[response] receipt = {}",
                    serde_json::to_string(&receipt).unwrap_or_else(|_| format!("{:?}", receipt))
                );
                info!(
                    "Transaction {:?} mined in block {:?}",
                    receipt.transaction_hash, receipt.block_number
                );
                Ok(receipt)
            }
            Err(e) => {
                if matches!(e, SubmitError::ConfirmationTimeout { .. }) {
                    metrics::record_confirmation_timeout(chain_id);
                }
                warn!("No confirmation for {:?}: {}", pending.tx_hash, e);
                Err(e)
            }
        }
    }
}
