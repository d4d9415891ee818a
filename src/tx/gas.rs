//! Gas estimation with safety margins

use super::types::{ExtraGasOptions, GasFeeInfo, PreparedTransaction};
use crate::chain::ChainClient;
use crate::error::{SubmitError, SubmitResult};

use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::debug;

/// Gas estimator for transactions
pub struct GasFeeEstimator {
    client: Arc<dyn ChainClient>,
}

impl GasFeeEstimator {
    /// Create a new gas estimator
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    /// Estimate gas limit and fees for `tx` as sent by `sender`.
    ///
    /// The gas buffer is `extra_gas_percentage + extra_on_retry_percentage`
    /// percent of the estimate; the tip buffer works the same way with
    /// `extra_max_priority_fee_per_gas_percentage` and is folded into
    /// `max_fee_per_gas`, so the fee cap always covers base fee plus tip.
    pub async fn estimate(
        &self,
        tx: &PreparedTransaction,
        sender: Option<Address>,
        options: &ExtraGasOptions,
    ) -> SubmitResult<GasFeeInfo> {
        let sender = sender.ok_or(SubmitError::MissingSender)?;

        let request = tx.to_estimate_request(sender);
        let gas_limit = self.client.estimate_gas(&request, sender).await?;
        let extra_gas = percent_of(
            gas_limit,
            options.extra_gas_percentage,
            options.extra_on_retry_percentage,
        )?;

        let gas_price = self.client.get_base_fee().await?;
        let max_priority_fee_per_gas = self.client.get_suggested_priority_fee().await?;
        let extra_priority_fee = percent_of(
            max_priority_fee_per_gas,
            options.extra_max_priority_fee_per_gas_percentage,
            options.extra_on_retry_percentage,
        )?;

        let max_fee_per_gas = gas_price
            .checked_add(max_priority_fee_per_gas)
            .and_then(|fee| fee.checked_add(extra_priority_fee))
            .ok_or_else(|| SubmitError::GasEstimation("max fee overflow".to_string()))?;

        let fees = GasFeeInfo {
            gas_limit,
            gas_price,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            extra_gas,
        };

        debug!(
            "Gas fee info for chain {}: {}",
            tx.chain_id,
            serde_json::to_string(&fees).unwrap_or_else(|_| format!("{:?}", fees))
        );
        Ok(fees)
    }
}

/// `value * (base + bonus) / 100`, floor division, without overflow
fn percent_of(value: U256, base: u64, bonus: u64) -> SubmitResult<U256> {
    let percent = base
        .checked_add(bonus)
        .ok_or_else(|| SubmitError::GasEstimation("percentage overflow".to_string()))?;

    value
        .checked_mul(U256::from(percent))
        .map(|scaled| scaled / 100)
        .ok_or_else(|| SubmitError::GasEstimation("gas buffer overflow".to_string()))
}
