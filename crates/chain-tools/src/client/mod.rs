//! Chain Client
//!
//! Read-only access to on-chain data. Tools talk to the chain only through
//! [`ChainClient`], so an RPC-backed client can replace the mock without
//! touching tool code.

mod mock;

pub use mock::MockChainClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    Block, GasPrice, NativeBalance, TokenBalance, TokenInfo, TokenTransfer, Transaction,
};

/// Chain client trait (Strategy pattern)
///
/// Implement this per data source: JSON-RPC node, indexer API, etc.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Native-currency balance
    async fn native_balance(&self, chain: &str, address: &str) -> Result<NativeBalance>;

    /// Current base and priority fee
    async fn gas_price(&self, chain: &str) -> Result<GasPrice>;

    /// Transaction by hash
    async fn transaction(&self, chain: &str, hash: &str) -> Result<Transaction>;

    /// Most recent transactions sent by an address, newest first
    async fn transactions(
        &self,
        chain: &str,
        address: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>>;

    /// ERC-20 metadata
    async fn token_info(&self, chain: &str, token: &str) -> Result<TokenInfo>;

    /// ERC-20 balance of a holder
    async fn token_balance(&self, chain: &str, holder: &str, token: &str) -> Result<TokenBalance>;

    /// Recent ERC-20 transfers involving an address, newest first
    async fn token_transfers(
        &self,
        chain: &str,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TokenTransfer>>;

    /// Block by number; `None` is the latest block
    async fn block(&self, chain: &str, number: Option<u64>) -> Result<Block>;

    /// Check if the data source is reachable
    async fn health_check(&self) -> bool;

    /// Client name
    fn name(&self) -> &str;
}
