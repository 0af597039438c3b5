//! Domain Models
//!
//! On-chain data returned by a [`crate::client::ChainClient`].
//! Uses `rust_decimal` for all amounts - never use f64 for money!

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Networks the tools accept
pub const SUPPORTED_CHAINS: [&str; 4] = ["ethereum", "polygon", "arbitrum", "base"];

pub const DEFAULT_CHAIN: &str = "ethereum";

/// Native currency symbol per chain
pub fn native_symbol(chain: &str) -> &'static str {
    match chain {
        "polygon" => "POL",
        _ => "ETH",
    }
}

/// Native-currency balance of an address
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NativeBalance {
    pub address: String,
    pub chain: String,

    /// Whole units (ETH, POL), not wei
    pub balance: Decimal,

    pub symbol: String,

    /// Block the balance was read at
    pub block_number: u64,
}

/// Current fee market
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GasPrice {
    pub chain: String,
    pub base_fee_gwei: Decimal,
    pub priority_fee_gwei: Decimal,
    pub block_number: u64,
}

impl GasPrice {
    pub fn suggested_max_fee_gwei(&self) -> Decimal {
        self.base_fee_gwei * Decimal::TWO + self.priority_fee_gwei
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Failed,
    Pending,
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

/// A native-value transaction
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub chain: String,
    pub from: String,

    /// `None` for contract creation
    pub to: Option<String>,

    /// Native value transferred, whole units
    pub value: Decimal,

    pub gas_used: u64,
    pub gas_price_gwei: Decimal,
    pub status: TxStatus,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Fee paid in native units
    pub fn fee(&self) -> Decimal {
        Decimal::from(self.gas_used) * self.gas_price_gwei / Decimal::from(1_000_000_000u64)
    }
}

/// ERC-20 metadata
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    pub chain: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: Decimal,
}

/// ERC-20 balance of a holder
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenBalance {
    pub holder: String,
    pub token: String,
    pub symbol: String,
    pub amount: Decimal,
}

/// One ERC-20 transfer event
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub hash: String,
    pub token: String,
    pub symbol: String,
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub block_number: u64,
}

/// Block header summary
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub chain: String,
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub transaction_count: u32,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub base_fee_gwei: Decimal,
}

impl Block {
    /// Gas used as a percentage of the limit
    pub fn utilization_percent(&self) -> Decimal {
        if self.gas_limit == 0 {
            return Decimal::ZERO;
        }
        let share = Decimal::from(self.gas_used) / Decimal::from(self.gas_limit);
        (share * Decimal::ONE_HUNDRED).round_dp(1)
    }
}

/// Shorten a long hex value for display: `0x742d…f44e`
pub fn short_hex(value: &str) -> String {
    if value.len() <= 12 || !value.is_ascii() {
        return value.to_string();
    }
    format!("{}…{}", &value[..6], &value[value.len() - 4..])
}
