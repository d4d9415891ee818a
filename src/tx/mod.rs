//! Transaction submission module with nonce lookup, gas estimation and retries

mod gas;
mod nonce;
mod orchestrator;
mod retry;
mod sender;
mod types;

pub use gas::GasFeeEstimator;
pub use nonce::NonceProvider;
pub use orchestrator::{AttemptStage, RetryingTransactionOrchestrator};
pub use retry::{RetryError, RetryExecutor};
pub use sender::TransactionSubmitter;
pub use types::{
    ExtraGasOptions, GasFeeInfo, PreparedTransaction, RetryOptions,
    DEFAULT_EXTRA_GAS_PERCENTAGE, DEFAULT_EXTRA_ON_RETRY_PERCENTAGE,
    DEFAULT_EXTRA_PRIORITY_TIP_PERCENTAGE, DEFAULT_MAX_BLOCKS_WAIT_TIME, DEFAULT_RETRIES,
    DEFAULT_RETRY_DELAY_MS,
};
