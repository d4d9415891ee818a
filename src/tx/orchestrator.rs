//! Submit-with-retry: the entry point callers use
//!
//! Each attempt re-runs the whole pipeline (nonce, gas, submit, confirm)
//! because nonce and fees from a failed attempt may no longer be valid.

use super::gas::GasFeeEstimator;
use super::nonce::NonceProvider;
use super::retry::{RetryError, RetryExecutor};
use super::sender::TransactionSubmitter;
use super::types::{ExtraGasOptions, PreparedTransaction, RetryOptions};
use crate::chain::{Account, ChainClient};
use crate::config::SubmissionConfig;
use crate::error::{SubmitError, SubmitResult};
use crate::events::{EventBus, SubmissionEvent};
use crate::metrics;

use ethers::types::TransactionReceipt;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

/// Last stage an attempt completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttemptStage {
    Preparing,
    NonceAssigned,
    GasEstimated,
    Submitted,
    Confirmed,
}

impl fmt::Display for AttemptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Failure of a single attempt, tagged with where it happened
#[derive(Debug)]
struct AttemptFailure {
    stage: AttemptStage,
    error: SubmitError,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at stage {})", self.error, self.stage)
    }
}

/// Resilient transaction submission
pub struct RetryingTransactionOrchestrator {
    client: Arc<dyn ChainClient>,
    nonce_provider: NonceProvider,
    gas_estimator: GasFeeEstimator,
    submitter: TransactionSubmitter,
    config: SubmissionConfig,
    events: EventBus,
}

impl RetryingTransactionOrchestrator {
    pub fn new(client: Arc<dyn ChainClient>, config: SubmissionConfig) -> Self {
        Self {
            nonce_provider: NonceProvider::new(client.clone()),
            gas_estimator: GasFeeEstimator::new(client.clone()),
            submitter: TransactionSubmitter::new(client.clone(), config.max_blocks_wait_time),
            client,
            config,
            events: EventBus::default(),
        }
    }

    /// Subscribe to submission events
    pub fn subscribe(&self) -> broadcast::Receiver<SubmissionEvent> {
        self.events.subscribe()
    }

    /// Submit `tx` from `account`, retrying the full pipeline on failure.
    ///
    /// `None` options fall back to the configured ones. Attempt `i` bids
    /// `extra_on_retry_percentage * i` on top of the gas and tip margins.
    pub async fn submit_with_retry(
        &self,
        tx: &PreparedTransaction,
        account: &dyn Account,
        retry_options: Option<RetryOptions>,
        extra_gas_options: Option<ExtraGasOptions>,
    ) -> SubmitResult<TransactionReceipt> {
        let retry_options = retry_options.unwrap_or(self.config.retry);
        let gas_options = extra_gas_options.unwrap_or(self.config.gas);
        let chain_id = self.client.chain_id();

        if retry_options.retries == 0 {
            return Err(SubmitError::InvalidConfiguration(
                "retries must be at least 1".to_string(),
            ));
        }
        if tx.chain_id != chain_id {
            return Err(SubmitError::InvalidConfiguration(format!(
                "transaction targets chain {} but the client is connected to chain {}",
                tx.chain_id, chain_id
            )));
        }

        let submission_id = Uuid::new_v4();
        let started = Instant::now();
        info!(
            "Submission {} from {:?} on chain {} ({} attempt(s), {}ms delay)",
            submission_id,
            account.address(),
            chain_id,
            retry_options.retries,
            retry_options.delay_ms
        );
        if tx.has_gas_hints() {
            debug!(
                "Submission {}: caller gas fields are replaced by fresh estimates",
                submission_id
            );
        }

        let gas_options = &gas_options;
        let result = RetryExecutor::new(retry_options)
            .run(|attempt| async move {
                let outcome = self
                    .run_attempt(tx, account, gas_options, attempt, submission_id)
                    .await;
                if let Err(failure) = &outcome {
                    self.events.emit(SubmissionEvent::AttemptFailed {
                        submission_id,
                        attempt,
                        stage: failure.stage,
                        error: failure.error.to_string(),
                    });
                }
                outcome
            })
            .instrument(info_span!("submission", id = %submission_id))
            .await;

        match result {
            Ok((receipt, attempts)) => {
                metrics::record_latency(chain_id, started.elapsed().as_secs_f64());
                info!(
                    "Submission {} confirmed: {:?} after {} attempt(s)",
                    submission_id, receipt.transaction_hash, attempts
                );
                self.events.emit(SubmissionEvent::Confirmed {
                    submission_id,
                    chain_id,
                    tx_hash: receipt.transaction_hash,
                    block_number: receipt.block_number.map(|b| b.as_u64()),
                    attempts,
                    confirmed_at: chrono::Utc::now(),
                });
                Ok(receipt)
            }
            Err(RetryError::InvalidConfiguration(message)) => {
                Err(SubmitError::InvalidConfiguration(message))
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                metrics::record_exhausted(chain_id);
                error!(
                    "Submission {} failed after {} attempt(s): {}",
                    submission_id, attempts, last
                );
                self.events.emit(SubmissionEvent::Failed {
                    submission_id,
                    chain_id,
                    attempts,
                    error: last.error.to_string(),
                });
                Err(SubmitError::ExhaustedRetries {
                    attempts,
                    source: Box::new(last.error),
                })
            }
        }
    }

    /// One pass through the pipeline; returns the receipt and the attempt count
    async fn run_attempt(
        &self,
        tx: &PreparedTransaction,
        account: &dyn Account,
        gas_options: &ExtraGasOptions,
        attempt: u32,
        submission_id: Uuid,
    ) -> Result<(TransactionReceipt, u32), AttemptFailure> {
        let chain_id = tx.chain_id;
        let sender = account.address();
        let mut stage = AttemptStage::Preparing;
        metrics::record_attempt(chain_id);

        let fail = |stage: AttemptStage, error: SubmitError| AttemptFailure { stage, error };

        let nonce = self
            .nonce_provider
            .next_nonce(sender, chain_id)
            .await
            .map_err(|e| fail(stage, e))?;
        stage = AttemptStage::NonceAssigned;

        let fees = self
            .gas_estimator
            .estimate(tx, Some(sender), &gas_options.for_attempt(attempt))
            .await
            .map_err(|e| fail(stage, e))?;
        stage = AttemptStage::GasEstimated;

        let ready_tx = tx
            .with_fees(sender, nonce, &fees)
            .map_err(|e| fail(stage, e))?;
        if let Ok(max_cost) = fees.max_cost() {
            debug!(
                "Submission {} attempt {}: nonce {}, gas {} + {}, max cost {} wei",
                submission_id, attempt, nonce, fees.gas_limit, fees.extra_gas, max_cost
            );
        }

        let receipt = self
            .submitter
            .submit_and_wait(&ready_tx, account)
            .await
            .map_err(|e| match e {
                // never reached the mempool
                SubmitError::SubmissionRejected { .. } | SubmitError::Wallet(_) => fail(stage, e),
                _ => fail(AttemptStage::Submitted, e),
            })?;

        debug!(
            "Submission {} attempt {} reached {}",
            submission_id,
            attempt,
            AttemptStage::Confirmed
        );
        Ok((receipt, attempt + 1))
    }
}
