//! Transaction descriptors and submission options

use crate::error::{SubmitError, SubmitResult};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default gas limit buffer, in percent
pub const DEFAULT_EXTRA_GAS_PERCENTAGE: u64 = 10;
/// Default priority tip buffer, in percent
pub const DEFAULT_EXTRA_PRIORITY_TIP_PERCENTAGE: u64 = 20;
/// Added to both buffers once per retry
pub const DEFAULT_EXTRA_ON_RETRY_PERCENTAGE: u64 = 1;
/// Blocks to wait for a receipt before giving up on an attempt
pub const DEFAULT_MAX_BLOCKS_WAIT_TIME: u64 = 30;
pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 0;

/// Unsigned transaction as handed over by the caller.
///
/// Gas fields are optional hints; every attempt replaces them with fresh
/// values, together with the nonce.
#[derive(Debug, Clone, Default)]
pub struct PreparedTransaction {
    pub chain_id: u64,
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

impl PreparedTransaction {
    /// Create a contract call on the given chain
    pub fn new(chain_id: u64, to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            chain_id,
            to: Some(to),
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Whether the caller supplied any gas or fee field
    pub fn has_gas_hints(&self) -> bool {
        self.gas.is_some()
            || self.max_fee_per_gas.is_some()
            || self.max_priority_fee_per_gas.is_some()
    }

    /// Request used for `eth_estimateGas`.
    ///
    /// Caller gas hints are left out: a stale cap or fee would make the node
    /// refuse every estimate the same way.
    pub fn to_estimate_request(&self, sender: Address) -> TypedTransaction {
        TypedTransaction::Eip1559(self.base_request().from(sender))
    }

    /// Layer a nonce and freshly estimated fees onto this transaction.
    ///
    /// Chain, target, call data and value are kept as the caller set them.
    pub fn with_fees(
        &self,
        sender: Address,
        nonce: u64,
        fees: &GasFeeInfo,
    ) -> SubmitResult<TypedTransaction> {
        let request = self
            .base_request()
            .from(sender)
            .nonce(nonce)
            .gas(fees.total_gas_limit()?)
            .max_fee_per_gas(fees.max_fee_per_gas)
            .max_priority_fee_per_gas(fees.max_priority_fee_per_gas);
        Ok(TypedTransaction::Eip1559(request))
    }

    fn base_request(&self) -> Eip1559TransactionRequest {
        let mut request = Eip1559TransactionRequest::new()
            .chain_id(self.chain_id)
            .data(self.data.clone())
            .value(self.value);
        if let Some(to) = self.to {
            request = request.to(to);
        }
        request
    }
}

/// Gas parameters for one submission attempt, in wei
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasFeeInfo {
    pub gas_limit: U256,
    pub gas_price: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub extra_gas: U256,
}

impl GasFeeInfo {
    /// Gas limit actually submitted: the estimate plus its buffer
    pub fn total_gas_limit(&self) -> SubmitResult<U256> {
        self.gas_limit
            .checked_add(self.extra_gas)
            .ok_or_else(|| SubmitError::GasEstimation("gas limit overflow".to_string()))
    }

    /// Worst-case fee in wei
    pub fn max_cost(&self) -> SubmitResult<U256> {
        self.total_gas_limit()?
            .checked_mul(self.max_fee_per_gas)
            .ok_or_else(|| SubmitError::GasEstimation("max cost overflow".to_string()))
    }
}

/// Safety margins applied on top of the node's estimates, in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExtraGasOptions {
    pub extra_gas_percentage: u64,
    pub extra_max_priority_fee_per_gas_percentage: u64,
    /// Per-retry increment, multiplied by the attempt index
    pub extra_on_retry_percentage: u64,
}

impl ExtraGasOptions {
    /// Options for attempt `attempt`, with the retry bonus scaled by the index
    pub fn for_attempt(&self, attempt: u32) -> Self {
        Self {
            extra_on_retry_percentage: self
                .extra_on_retry_percentage
                .saturating_mul(u64::from(attempt)),
            ..*self
        }
    }
}

impl Default for ExtraGasOptions {
    fn default() -> Self {
        Self {
            extra_gas_percentage: DEFAULT_EXTRA_GAS_PERCENTAGE,
            extra_max_priority_fee_per_gas_percentage: DEFAULT_EXTRA_PRIORITY_TIP_PERCENTAGE,
            extra_on_retry_percentage: DEFAULT_EXTRA_ON_RETRY_PERCENTAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    pub retries: u32,
    #[serde(rename = "retry_delay_ms")]
    pub delay_ms: u64,
}

impl RetryOptions {
    pub fn new(retries: u32, delay_ms: u64) -> Self {
        Self { retries, delay_ms }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}
