//! Sending accounts

use crate::error::{SubmitError, SubmitResult};

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes};

/// An address able to sign what is submitted on its behalf
#[async_trait]
pub trait Account: Send + Sync {
    fn address(&self) -> Address;

    /// RLP encoding of the signed transaction, ready for `eth_sendRawTransaction`
    async fn sign_transaction(&self, tx: &TypedTransaction) -> SubmitResult<Bytes>;
}

/// Account backed by a local private key
#[derive(Debug, Clone)]
pub struct WalletAccount {
    wallet: LocalWallet,
}

impl WalletAccount {
    pub fn new(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    /// Parse a hex private key, with or without `0x`
    pub fn from_private_key(key: &str) -> SubmitResult<Self> {
        let wallet = key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| SubmitError::Wallet(format!("Invalid private key: {}", e)))?;
        Ok(Self::new(wallet))
    }

    /// Load the private key from the named environment variable
    pub fn from_env(var: &str) -> SubmitResult<Self> {
        let key = std::env::var(var).map_err(|_| {
            SubmitError::Wallet(format!("No wallet configured. Set {}", var))
        })?;
        Self::from_private_key(&key)
    }

    pub fn with_chain_id(self, chain_id: u64) -> Self {
        Self::new(self.wallet.with_chain_id(chain_id))
    }
}

#[async_trait]
impl Account for WalletAccount {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn sign_transaction(&self, tx: &TypedTransaction) -> SubmitResult<Bytes> {
        let signature = self
            .wallet
            .sign_transaction(tx)
            .await
            .map_err(|e| SubmitError::Wallet(e.to_string()))?;
        Ok(tx.rlp_signed(&signature))
    }
}
