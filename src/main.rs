//! Airdrop Relayer - submits an airdrop transaction with retries
//!
//! Loads the configured chain, wallet and transaction, then sends it through
//! the retrying orchestrator and reports the receipt.

use airdrop_relayer::chain::{Account, ChainProvider, WalletAccount};
use airdrop_relayer::config::{Settings, TransactionConfig};
use airdrop_relayer::events::SubmissionEvent;
use airdrop_relayer::metrics;
use airdrop_relayer::tx::{PreparedTransaction, RetryingTransactionOrchestrator};

use anyhow::{Context, Result};
use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Airdrop Relayer v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for chain {} (ID: {})",
        settings.chain.name, settings.chain.chain_id
    );

    let provider = Arc::new(ChainProvider::new(settings.chain.clone())?);
    if !provider.health_check().await {
        warn!("Chain {} is not answering yet", settings.chain.chain_id);
    }

    let account = WalletAccount::from_env(&settings.wallet.private_key_env)?
        .with_chain_id(settings.chain.chain_id);
    info!("Submitting from wallet: {:?}", account.address());

    let prepared = prepared_transaction(settings.chain.chain_id, &settings.transaction)?;

    let orchestrator = RetryingTransactionOrchestrator::new(provider.clone(), settings.submission);

    // Log lifecycle events as they happen
    let events_handle = tokio::spawn({
        let mut events = orchestrator.subscribe();
        let provider = provider.clone();
        async move {
            while let Ok(event) = events.recv().await {
                if let SubmissionEvent::Confirmed { tx_hash, .. } = &event {
                    if let Some(url) = provider.explorer_tx_url(*tx_hash) {
                        info!("Explorer: {}", url);
                    }
                }
                if let Ok(json) = serde_json::to_string(&event) {
                    info!(event = event.name(), "{}", json);
                }
            }
        }
    });

    let result = orchestrator
        .submit_with_retry(&prepared, &account, None, None)
        .await;

    // Closing the channel ends the event task once it has drained
    drop(orchestrator);
    let _ = events_handle.await;

    if settings.metrics.enabled {
        if let Some(path) = &settings.metrics.textfile_path {
            if let Err(e) = metrics::write_textfile(path) {
                warn!("Failed to write metrics to {:?}: {}", path, e);
            }
        }
    }

    match result {
        Ok(receipt) => {
            info!(
                "Transaction {:?} confirmed in block {:?}",
                receipt.transaction_hash, receipt.block_number
            );
            Ok(())
        }
        Err(e) => {
            error!("Submission failed: {}", e);
            Err(e.into())
        }
    }
}

fn prepared_transaction(chain_id: u64, config: &TransactionConfig) -> Result<PreparedTransaction> {
    let to: Address = config
        .to
        .parse()
        .with_context(|| format!("Invalid transaction.to address: {}", config.to))?;

    let data = hex::decode(config.data.trim_start_matches("0x"))
        .with_context(|| "transaction.data is not valid hex")?;

    let value = match &config.value {
        Some(value) => U256::from_dec_str(value)
            .with_context(|| format!("Invalid transaction.value: {}", value))?,
        None => U256::zero(),
    };

    Ok(PreparedTransaction::new(chain_id, to, data).with_value(value))
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,airdrop_relayer=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}
