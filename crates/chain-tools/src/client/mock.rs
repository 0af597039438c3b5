//! Mock Chain Client
//!
//! For testing and demo purposes. Returns deterministic data derived from the
//! queried address or hash, so repeated lookups agree with each other.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::ChainClient;
use crate::error::{ChainError, Result};
use crate::model::{
    Block, GasPrice, NativeBalance, SUPPORTED_CHAINS, TokenBalance, TokenInfo, TokenTransfer,
    Transaction, TxStatus, native_symbol,
};

const HEAD_BLOCK: u64 = 21_500_000;
const HEAD_TIMESTAMP: i64 = 1_735_000_000;
const BLOCK_TIME_SECS: i64 = 12;

/// (address, name, symbol, decimals, total supply)
const TOKENS: [(&str, &str, &str, u8, Decimal); 4] = [
    ("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "USD Coin", "USDC", 6, dec!(43500000000)),
    ("0xdAC17F958D2ee523a2206206994597C13D831ec7", "Tether USD", "USDT", 6, dec!(79000000000)),
    ("0x6B175474E89094C44Da98b954EedeAC495271d0F", "Dai Stablecoin", "DAI", 18, dec!(3400000000)),
    ("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", "Wrapped Ether", "WETH", 18, dec!(2900000)),
];

/// Counterparties used for generated transactions
const COUNTERPARTIES: [&str; 3] = [
    "0x28C6c06298d514Db089934071355E5743bf21d60",
    "0x3fC91A3afd70395Cd496C647d5a6CC9D4B2b7FAD",
    "0xBE0eB53F46cd790Cd13851d5EFf43D12404d33E8",
];

/// Mock chain client with deterministic data
pub struct MockChainClient {
    /// Simulated RPC latency
    latency: Duration,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainClient {
    pub const fn new() -> Self {
        Self {
            latency: Duration::ZERO,
        }
    }

    /// Create with a fixed per-call delay (for exercising timeouts)
    pub const fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    async fn simulate_rpc(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn lookup_token(token: &str) -> Result<(&'static str, &'static str, &'static str, u8, Decimal)> {
    check_address(token)?;
    TOKENS
        .iter()
        .find(|(address, ..)| address.eq_ignore_ascii_case(token))
        .copied()
        .ok_or_else(|| ChainError::NotFound {
            kind: "token",
            id: token.to_string(),
        })
}

fn check_chain(chain: &str) -> Result<()> {
    if SUPPORTED_CHAINS.contains(&chain) {
        Ok(())
    } else {
        Err(ChainError::UnsupportedChain(chain.to_string()))
    }
}

fn is_hex_of_len(value: &str, len: usize) -> bool {
    value
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == len && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

fn check_address(address: &str) -> Result<()> {
    if is_hex_of_len(address, 40) {
        Ok(())
    } else {
        Err(ChainError::InvalidAddress(address.to_string()))
    }
}

fn check_hash(hash: &str) -> Result<()> {
    if is_hex_of_len(hash, 64) {
        Ok(())
    } else {
        Err(ChainError::InvalidHash(hash.to_string()))
    }
}

/// Stable small number derived from a hex string
fn seed(value: &str) -> u64 {
    value
        .to_ascii_lowercase()
        .bytes()
        .skip(2)
        .fold(7u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)))
}

fn hash_for(n: u64) -> String {
    format!("0x{n:064x}")
}

fn block_time(number: u64) -> DateTime<Utc> {
    let behind =
        i64::try_from(HEAD_BLOCK.saturating_sub(number)).unwrap_or(i64::MAX / BLOCK_TIME_SECS);
    DateTime::from_timestamp(HEAD_TIMESTAMP - behind * BLOCK_TIME_SECS, 0).unwrap_or_default()
}

fn counterparty(n: u64) -> &'static str {
    COUNTERPARTIES[usize::try_from(n % 3).unwrap_or(0)]
}

fn amount(n: u64, modulus: u64, scale: u32) -> Decimal {
    Decimal::new(i64::try_from(n % modulus).unwrap_or(0), scale)
}

fn generated_tx(chain: &str, hash: String, from: &str, n: u64) -> Transaction {
    let block_number = HEAD_BLOCK - n % 5_000;
    Transaction {
        hash,
        chain: chain.to_string(),
        from: from.to_string(),
        to: Some(counterparty(n).to_string()),
        value: amount(n, 10_000, 3),
        gas_used: 21_000,
        gas_price_gwei: dec!(14),
        status: if n % 17 == 0 { TxStatus::Failed } else { TxStatus::Success },
        block_number,
        timestamp: block_time(block_number),
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn native_balance(&self, chain: &str, address: &str) -> Result<NativeBalance> {
        check_chain(chain)?;
        check_address(address)?;
        self.simulate_rpc().await;

        Ok(NativeBalance {
            address: address.to_string(),
            chain: chain.to_string(),
            balance: amount(seed(address), 50_000, 3),
            symbol: native_symbol(chain).to_string(),
            block_number: HEAD_BLOCK,
        })
    }

    async fn gas_price(&self, chain: &str) -> Result<GasPrice> {
        check_chain(chain)?;
        self.simulate_rpc().await;

        let (base, priority) = match chain {
            "polygon" => (dec!(30), dec!(30)),
            "arbitrum" => (dec!(0.01), dec!(0)),
            "base" => (dec!(0.05), dec!(0.001)),
            _ => (dec!(12.5), dec!(1.5)),
        };
        Ok(GasPrice {
            chain: chain.to_string(),
            base_fee_gwei: base,
            priority_fee_gwei: priority,
            block_number: HEAD_BLOCK,
        })
    }

    async fn transaction(&self, chain: &str, hash: &str) -> Result<Transaction> {
        check_chain(chain)?;
        check_hash(hash)?;
        self.simulate_rpc().await;

        let n = seed(hash);
        // all-zero hash stands in for an unknown transaction
        if hash[2..].bytes().all(|b| b == b'0') {
            return Err(ChainError::NotFound {
                kind: "transaction",
                id: hash.to_string(),
            });
        }
        Ok(generated_tx(chain, hash.to_string(), counterparty(n / 3), n))
    }

    async fn transactions(
        &self,
        chain: &str,
        address: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>> {
        check_chain(chain)?;
        check_address(address)?;
        self.simulate_rpc().await;

        let base = seed(address);
        let available = usize::try_from(base % 6).unwrap_or(0);
        Ok((0..available.min(limit) as u64)
            .map(|i| {
                let hash = hash_for(base.wrapping_add(i));
                generated_tx(chain, hash, address, base.wrapping_add(i * 7))
            })
            .collect())
    }

    async fn token_info(&self, chain: &str, token: &str) -> Result<TokenInfo> {
        check_chain(chain)?;
        let (address, name, symbol, decimals, total_supply) = lookup_token(token)?;
        self.simulate_rpc().await;

        Ok(TokenInfo {
            address: address.to_string(),
            chain: chain.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
            total_supply,
        })
    }

    async fn token_balance(&self, chain: &str, holder: &str, token: &str) -> Result<TokenBalance> {
        check_chain(chain)?;
        check_address(holder)?;
        let (address, _, symbol, ..) = lookup_token(token)?;
        self.simulate_rpc().await;

        Ok(TokenBalance {
            holder: holder.to_string(),
            token: address.to_string(),
            symbol: symbol.to_string(),
            amount: amount(seed(holder) ^ seed(address), 10_000_000, 2),
        })
    }

    async fn token_transfers(
        &self,
        chain: &str,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TokenTransfer>> {
        check_chain(chain)?;
        check_address(address)?;
        self.simulate_rpc().await;

        let base = seed(address);
        let (token, _, symbol, ..) = TOKENS[usize::try_from(base % 4).unwrap_or(0)];
        let available = usize::try_from(base % 5).unwrap_or(0);

        Ok((0..available.min(limit) as u64)
            .map(|i| {
                let n = base.wrapping_add(i * 13);
                let outgoing = n % 2 == 0;
                TokenTransfer {
                    hash: hash_for(n),
                    token: token.to_string(),
                    symbol: symbol.to_string(),
                    from: if outgoing { address.to_string() } else { counterparty(n).to_string() },
                    to: if outgoing { counterparty(n).to_string() } else { address.to_string() },
                    amount: amount(n, 1_000_000, 2),
                    block_number: HEAD_BLOCK - i * 40,
                }
            })
            .collect())
    }

    async fn block(&self, chain: &str, number: Option<u64>) -> Result<Block> {
        check_chain(chain)?;
        self.simulate_rpc().await;

        let number = number.unwrap_or(HEAD_BLOCK);
        if number > HEAD_BLOCK {
            return Err(ChainError::NotFound {
                kind: "block",
                id: number.to_string(),
            });
        }

        let gas_limit = 30_000_000;
        Ok(Block {
            number,
            chain: chain.to_string(),
            hash: hash_for(number.wrapping_mul(2_654_435_761)),
            timestamp: block_time(number),
            transaction_count: u32::try_from(number % 300).unwrap_or(0) + 20,
            gas_used: gas_limit / 2 + number % (gas_limit / 2),
            gas_limit,
            base_fee_gwei: dec!(12.5),
        })
    }

    async fn health_check(&self) -> bool {
        true // Mock always healthy
    }

    fn name(&self) -> &str {
        "MockChain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

    #[tokio::test]
    async fn test_balance_is_deterministic() {
        let client = MockChainClient::new();
        let a = client.native_balance("ethereum", ADDR).await.unwrap();
        let b = client.native_balance("ethereum", &ADDR.to_lowercase()).await.unwrap();
        assert_eq!(a.balance, b.balance);
        assert_eq!(a.symbol, "ETH");
    }

    #[tokio::test]
    async fn test_input_validation() {
        let client = MockChainClient::new();
        assert!(matches!(
            client.native_balance("ethereum", "0x123").await,
            Err(ChainError::InvalidAddress(_))
        ));
        assert!(matches!(
            client.gas_price("solana").await,
            Err(ChainError::UnsupportedChain(_))
        ));
        assert!(matches!(
            client.transaction("ethereum", "0xabc").await,
            Err(ChainError::InvalidHash(_))
        ));
    }

    #[tokio::test]
    async fn test_not_found_cases() {
        let client = MockChainClient::new();
        let zero_hash = format!("0x{}", "0".repeat(64));
        assert!(client.transaction("ethereum", &zero_hash).await.unwrap_err().is_not_found());
        assert!(client.block("ethereum", Some(HEAD_BLOCK + 1)).await.unwrap_err().is_not_found());
        assert!(client.token_info("ethereum", ADDR).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_known_token() {
        let client = MockChainClient::new();
        let usdc = client
            .token_info("ethereum", "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48")
            .await
            .unwrap();
        assert_eq!(usdc.symbol, "USDC");
        assert_eq!(usdc.decimals, 6);
    }

    #[tokio::test]
    async fn test_history_respects_limit() {
        let client = MockChainClient::new();
        let txs = client.transactions("ethereum", ADDR, 1).await.unwrap();
        assert!(txs.len() <= 1);
        assert!(txs.iter().all(|tx| tx.from == ADDR));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_simulated() {
        let client = MockChainClient::with_latency(Duration::from_secs(2));
        let started = tokio::time::Instant::now();
        client.gas_price("base").await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
