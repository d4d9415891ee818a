//! Nonce lookup for transaction submission
//!
//! Nonces are read from the chain on every call and never cached: a previous
//! attempt may have been mined between two lookups.

use crate::chain::ChainClient;
use crate::error::{SubmitError, SubmitResult};

use ethers::types::Address;
use std::sync::Arc;
use tracing::debug;

/// Reads the next nonce of a sender from the chain
pub struct NonceProvider {
    client: Arc<dyn ChainClient>,
}

impl NonceProvider {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    /// Next unused nonce of `address` on `chain_id`
    pub async fn next_nonce(&self, address: Address, chain_id: u64) -> SubmitResult<u64> {
        let connected = self.client.chain_id();
        if connected != chain_id {
            return Err(SubmitError::Nonce {
                chain_id,
                message: format!("client is connected to chain {}", connected),
            });
        }

        let count = self.client.get_transaction_count(address).await?;
        if count.bits() > 64 {
            return Err(SubmitError::Nonce {
                chain_id,
                message: format!("transaction count {} exceeds u64", count),
            });
        }
        let nonce = count.as_u64();

        debug!("Next nonce for {:?} on chain {}: {}", address, chain_id, nonce);
        Ok(nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;
    use ethers::types::U256;

    #[tokio::test]
    async fn test_reads_nonce_on_every_call() {
        let sender = Address::repeat_byte(0x33);
        let mut client = MockChainClient::new();
        client.expect_chain_id().return_const(5u64);
        let mut seq = mockall::Sequence::new();
        client
            .expect_get_transaction_count()
            .withf(move |address| *address == sender)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(U256::from(7)));
        client
            .expect_get_transaction_count()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(U256::from(8)));
        let provider = NonceProvider::new(Arc::new(client));

        assert_eq!(provider.next_nonce(sender, 5).await.unwrap(), 7);
        assert_eq!(provider.next_nonce(sender, 5).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_chain_mismatch() {
        let mut client = MockChainClient::new();
        client.expect_chain_id().return_const(1u64);
        client.expect_get_transaction_count().never();
        let provider = NonceProvider::new(Arc::new(client));

        let result = provider.next_nonce(Address::zero(), 5).await;
        assert!(matches!(result, Err(SubmitError::Nonce { chain_id: 5, .. })));
    }

    #[tokio::test]
    async fn test_oversized_count() {
        let mut client = MockChainClient::new();
        client.expect_chain_id().return_const(5u64);
        client
            .expect_get_transaction_count()
            .returning(|_| Ok(U256::from(u64::MAX) + 1));
        let provider = NonceProvider::new(Arc::new(client));

        tokio_test::assert_err!(provider.next_nonce(Address::zero(), 5).await);
    }
}
