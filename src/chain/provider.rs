//! Chain provider with multi-RPC support and automatic failover

use super::{ChainClient, PendingSubmission};
use crate::config::ChainConfig;
use crate::error::{RejectionReason, SubmitError, SubmitResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Multi-provider wrapper with automatic failover
pub struct ChainProvider {
    /// Chain configuration
    config: ChainConfig,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Provider<Http>>,
    /// Current active provider index
    current_provider: AtomicUsize,
}

impl ChainProvider {
    /// Create a new chain provider
    pub fn new(config: ChainConfig) -> SubmitResult<Self> {
        let mut http_providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider =
                        provider.interval(Duration::from_millis(config.poll_interval_ms));
                    http_providers.push(provider);
                    debug!("Added HTTP provider for chain {}: {}", config.chain_id, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(SubmitError::ChainConnection {
                chain_id: config.chain_id,
                message: "No valid RPC providers".to_string(),
            });
        }

        info!(
            "Chain {} (ID: {}) using {} RPC endpoint(s)",
            config.name,
            config.chain_id,
            http_providers.len()
        );

        Ok(Self {
            config,
            http_providers,
            current_provider: AtomicUsize::new(0),
        })
    }

    /// Get the active HTTP provider
    pub fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to next available provider
    pub fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.config.chain_id, next);
    }

    /// Run a read-only call against each provider in turn until one answers
    async fn with_failover<'a, T, F, Fut>(&'a self, what: &str, call: F) -> SubmitResult<T>
    where
        F: Fn(&'a Provider<Http>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut last_error = String::new();
        for _ in 0..self.http_providers.len() {
            match call(self.http()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("Failed to {} on chain {}: {}", what, self.config.chain_id, e);
                    last_error = e.to_string();
                    self.failover();
                }
            }
        }

        Err(SubmitError::ChainConnection {
            chain_id: self.config.chain_id,
            message: format!("All providers failed to {}: {}", what, last_error),
        })
    }

    /// Get current block number with failover
    pub async fn get_block_number(&self) -> SubmitResult<u64> {
        self.with_failover("get block number", |p| p.get_block_number())
            .await
            .map(|b| b.as_u64())
    }

    /// Get transaction receipt
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> SubmitResult<Option<TransactionReceipt>> {
        self.with_failover("get transaction receipt", |p| {
            p.get_transaction_receipt(tx_hash)
        })
        .await
    }

    /// Health check
    pub async fn health_check(&self) -> bool {
        self.get_block_number().await.is_ok()
    }

    /// Block explorer link for a transaction, if an explorer is configured
    pub fn explorer_tx_url(&self, tx_hash: H256) -> Option<String> {
        self.config
            .explorer_url
            .as_ref()
            .map(|base| format!("{}/tx/{:?}", base.trim_end_matches('/'), tx_hash))
    }
}

#[async_trait]
impl ChainClient for ChainProvider {
    fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    async fn estimate_gas(&self, tx: &TypedTransaction, sender: Address) -> SubmitResult<U256> {
        let mut tx = tx.clone();
        tx.set_from(sender);

        // A node that answers with an error (e.g. a revert) is not failed over
        let mut last_error = String::new();
        for _ in 0..self.http_providers.len() {
            match self.http().estimate_gas(&tx, None).await {
                Ok(gas) => return Ok(gas),
                Err(e) if is_node_response(&e) => {
                    return Err(SubmitError::GasEstimation(e.to_string()));
                }
                Err(e) => {
                    warn!("Failed to estimate gas on chain {}: {}", self.config.chain_id, e);
                    last_error = e.to_string();
                    self.failover();
                }
            }
        }

        Err(SubmitError::ChainConnection {
            chain_id: self.config.chain_id,
            message: format!("All providers failed to estimate gas: {}", last_error),
        })
    }

    async fn get_base_fee(&self) -> SubmitResult<U256> {
        self.with_failover("get gas price", |p| p.get_gas_price())
            .await
    }

    async fn get_suggested_priority_fee(&self) -> SubmitResult<U256> {
        self.with_failover("get priority fee", |p| {
            p.request::<_, U256>("eth_maxPriorityFeePerGas", ())
        })
        .await
    }

    async fn get_transaction_count(&self, address: Address) -> SubmitResult<U256> {
        self.with_failover("get transaction count", |p| {
            p.get_transaction_count(address, Some(BlockNumber::Latest.into()))
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> SubmitResult<PendingSubmission> {
        let submitted_at_block = self.get_block_number().await?;

        // No failover here: a transaction the node may have accepted is never resent blindly
        let pending = self
            .http()
            .send_raw_transaction(raw)
            .await
            .map_err(|e| send_error(self.config.chain_id, e))?;

        Ok(PendingSubmission {
            tx_hash: pending.tx_hash(),
            submitted_at_block,
        })
    }

    async fn wait_for_receipt(
        &self,
        pending: PendingSubmission,
        max_blocks: u64,
    ) -> SubmitResult<TransactionReceipt> {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if let Some(receipt) = self.get_transaction_receipt(pending.tx_hash).await? {
                return Ok(receipt);
            }

            let current_block = self.get_block_number().await?;
            let waited = current_block.saturating_sub(pending.submitted_at_block);
            if waited >= max_blocks {
                return Err(SubmitError::ConfirmationTimeout {
                    tx_hash: pending.tx_hash,
                    blocks: max_blocks,
                });
            }

            debug!(
                "Transaction {:?} not mined yet on chain {} ({} / {} blocks)",
                pending.tx_hash, self.config.chain_id, waited, max_blocks
            );
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// Whether the node itself answered with a JSON-RPC error
fn is_node_response(error: &ProviderError) -> bool {
    RpcError::as_error_response(error).is_some()
}

/// Error responses are rejections; anything else is a transport failure
/// after which the node may or may not hold the transaction
fn send_error(chain_id: u64, error: ProviderError) -> SubmitError {
    let message = error.to_string();
    if is_node_response(&error) {
        SubmitError::SubmissionRejected {
            chain_id,
            reason: RejectionReason::classify(&message),
            message,
        }
    } else {
        SubmitError::ChainConnection { chain_id, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::providers::{HttpClientError, JsonRpcError};

    fn chain_config(rpc_urls: Vec<String>) -> ChainConfig {
        ChainConfig {
            chain_id: 11155111,
            name: "sepolia".to_string(),
            rpc_urls,
            poll_interval_ms: 500,
            explorer_url: Some("https://sepolia.etherscan.io/".to_string()),
        }
    }

    #[test]
    fn test_rejects_config_without_valid_rpc() {
        let result = ChainProvider::new(chain_config(vec!["not a url".to_string()]));
        assert!(matches!(
            result,
            Err(SubmitError::ChainConnection { chain_id: 11155111, .. })
        ));
    }

    #[test]
    fn test_failover_cycles_providers() {
        let provider = ChainProvider::new(chain_config(vec![
            "http://localhost:8545".to_string(),
            "http://localhost:8546".to_string(),
        ]))
        .unwrap();

        assert_eq!(provider.current_provider.load(Ordering::Relaxed), 0);
        provider.failover();
        assert_eq!(provider.current_provider.load(Ordering::Relaxed), 1);
        provider.failover();
        assert_eq!(provider.current_provider.load(Ordering::Relaxed), 0);
    }

    fn node_error(message: &str) -> ProviderError {
        ProviderError::JsonRpcClientError(Box::new(HttpClientError::JsonRpcError(JsonRpcError {
            code: -32000,
            message: message.to_string(),
            data: None,
        })))
    }

    #[test]
    fn test_send_error_from_node_is_rejection() {
        let error = send_error(11155111, node_error("nonce too low"));
        assert!(matches!(
            error,
            SubmitError::SubmissionRejected {
                chain_id: 11155111,
                reason: RejectionReason::NonceTooLow,
                ..
            }
        ));

        let error = send_error(11155111, node_error("replacement transaction underpriced"));
        assert!(matches!(
            error,
            SubmitError::SubmissionRejected {
                reason: RejectionReason::Underpriced,
                ..
            }
        ));
    }

    #[test]
    fn test_send_transport_error_is_connection_failure() {
        let error = send_error(
            11155111,
            ProviderError::CustomError("operation timed out".to_string()),
        );
        assert!(matches!(
            error,
            SubmitError::ChainConnection { chain_id: 11155111, .. }
        ));
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn test_estimate_gas_fails_over_unreachable_endpoints() {
        let provider = ChainProvider::new(chain_config(vec![
            "http://127.0.0.1:1".to_string(),
            "http://127.0.0.1:2".to_string(),
        ]))
        .unwrap();
        let tx: TypedTransaction = Eip1559TransactionRequest::new()
            .to(Address::repeat_byte(0x11))
            .into();

        let result = provider.estimate_gas(&tx, Address::repeat_byte(0x22)).await;

        assert!(matches!(
            result,
            Err(SubmitError::ChainConnection { chain_id: 11155111, .. })
        ));
        // both endpoints were tried, ending back on the first
        assert_eq!(provider.current_provider.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_explorer_tx_url() {
        let provider =
            ChainProvider::new(chain_config(vec!["http://localhost:8545".to_string()])).unwrap();
        let url = provider.explorer_tx_url(H256::zero()).unwrap();
        assert_eq!(
            url,
            format!("https://sepolia.etherscan.io/tx/0x{}", "0".repeat(64))
        );
        assert_eq!(provider.chain_id(), 11155111);
    }
}
