//! Airdrop Relayer - resilient transaction submission for airdrop claims
//!
//! Prepares, prices, sends and confirms transactions against an EVM chain,
//! re-running the whole pipeline with a larger fee bid when an attempt fails.

pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod tx;

pub use chain::{Account, ChainClient, ChainProvider, WalletAccount};
pub use config::{Settings, SubmissionConfig};
pub use error::{SubmitError, SubmitResult};
pub use events::SubmissionEvent;
pub use tx::{ExtraGasOptions, PreparedTransaction, RetryOptions, RetryingTransactionOrchestrator};
