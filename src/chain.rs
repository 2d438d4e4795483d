use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::abi::RawLog;
use ethers::contract::EthEvent;
use ethers::core::types::{Address, H256, U256};
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use std::str::FromStr;
use thiserror::Error;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::token::TokenAmount;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc error: {0}")]
    Rpc(String),
    /// Expected teardown noise from an abandoned in-flight request. Callers
    /// log this at debug level instead of warn.
    #[error("request cancelled")]
    Cancelled,
    #[error("invalid platform key: {0}")]
    Key(String),
}

impl ChainError {
    /// Classify a provider failure so cancellation noise stays typed instead
    /// of being filtered by string-matching at every call site.
    pub fn from_provider<E: std::fmt::Display>(e: E) -> Self {
        let msg = e.to_string();
        if msg.contains("cancelled") || msg.contains("canceled") {
            ChainError::Cancelled
        } else {
            ChainError::Rpc(msg)
        }
    }
}

/// Escrow event emitted when a question author accepts an answer on-chain.
#[derive(Debug, Clone, EthEvent)]
#[ethevent(
    name = "AnswerAccepted",
    abi = "AnswerAccepted(uint256,uint256,address,uint256)"
)]
pub struct AnswerAcceptedEvent {
    #[ethevent(indexed)]
    pub question_id: U256,
    pub answer_id: U256,
    pub answer_author: Address,
    pub reward: U256,
}

/// Decoded `AnswerAccepted` facts, narrowed to platform types.
#[derive(Debug, Clone)]
pub struct AcceptedEvent {
    pub question_id: Option<i64>,
    pub answer_id: Option<i64>,
    pub answer_author: String,
    pub reward: TokenAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Success => "success",
            TxStatus::Failed => "failed",
        }
    }
}

/// On-chain facts about one settlement transaction.
#[derive(Debug, Clone)]
pub struct TxSettlement {
    pub block_number: u64,
    pub block_hash: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub from: String,
    pub to: Option<String>,
    pub gas_used: Option<String>,
    pub effective_gas_price: Option<String>,
    pub status: TxStatus,
    pub event: Option<AcceptedEvent>,
}

/// Read side of the chain bridge. `Ok(None)` means the transaction is not
/// (yet) known to the node; receipt generation degrades to defaults either
/// way.
#[async_trait]
pub trait SettlementSource: Send + Sync {
    async fn settlement(&self, tx_hash: &str) -> Result<Option<TxSettlement>, ChainError>;
}

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub network: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub token_address: String,
    pub escrow_address: String,
    pub explorer_base: String,
}

impl ChainConfig {
    pub fn from_env() -> Self {
        fn var_or(name: &str, default: &str) -> String {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        }
        ChainConfig {
            network: var_or("WAKQ_NETWORK", "sepolia"),
            chain_id: std::env::var("WAKQ_CHAIN_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(11155111),
            rpc_url: var_or("WAKQ_RPC_URL", "http://localhost:8545"),
            token_address: var_or("WAKQ_TOKEN_ADDRESS", ZERO_ADDRESS),
            escrow_address: var_or("WAKQ_ESCROW_ADDRESS", ZERO_ADDRESS),
            explorer_base: var_or("WAKQ_EXPLORER_BASE", "https://sepolia.etherscan.io"),
        }
    }

    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_base.trim_end_matches('/'), tx_hash)
    }
}

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Upper bound on any single settlement RPC round-trip.
const RPC_TIMEOUT: Duration = Duration::from_secs(15);

/// JSON-RPC-backed settlement source over a shared HTTP provider.
pub struct RpcSettlementSource {
    provider: Provider<Http>,
    escrow: Address,
}

impl RpcSettlementSource {
    pub fn new(rpc_url: &str, escrow_address: &str) -> Result<Self, ChainError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| ChainError::Rpc(format!("rpc provider error: {e}")))?;
        let escrow = Address::from_str(escrow_address)
            .map_err(|e| ChainError::Rpc(format!("invalid escrow address: {e}")))?;
        Ok(Self { provider, escrow })
    }
}

#[async_trait]
impl SettlementSource for RpcSettlementSource {
    async fn settlement(&self, tx_hash: &str) -> Result<Option<TxSettlement>, ChainError> {
        let hash =
            H256::from_str(tx_hash).map_err(|e| ChainError::Rpc(format!("invalid tx hash: {e}")))?;

        let receipt = timeout(RPC_TIMEOUT, self.provider.get_transaction_receipt(hash))
            .await
            .map_err(|_| ChainError::Rpc("settlement lookup timed out".into()))?
            .map_err(ChainError::from_provider)?;
        let Some(receipt) = receipt else {
            return Ok(None);
        };

        // Block lookup only adds the timestamp; best-effort.
        let timestamp = match receipt.block_number {
            Some(n) => timeout(RPC_TIMEOUT, self.provider.get_block(n))
                .await
                .ok()
                .and_then(|r| r.ok())
                .flatten()
                .and_then(|b| DateTime::from_timestamp(b.timestamp.low_u64() as i64, 0)),
            None => None,
        };

        let event = receipt
            .logs
            .iter()
            .filter(|log| log.address == self.escrow)
            .find_map(|log| {
                let raw: RawLog = log.clone().into();
                AnswerAcceptedEvent::decode_log(&raw).ok()
            })
            .map(|ev| AcceptedEvent {
                question_id: u256_to_id(ev.question_id),
                answer_id: u256_to_id(ev.answer_id),
                answer_author: format!("{:#x}", ev.answer_author),
                reward: u256_to_amount(ev.reward),
            });

        let status = match receipt.status.map(|s| s.as_u64()) {
            Some(0) => TxStatus::Failed,
            _ => TxStatus::Success,
        };

        Ok(Some(TxSettlement {
            block_number: receipt.block_number.map(|n| n.as_u64()).unwrap_or(0),
            block_hash: receipt
                .block_hash
                .map(|h| format!("{h:#x}"))
                .unwrap_or_default(),
            timestamp,
            from: format!("{:#x}", receipt.from),
            to: receipt.to.map(|a| format!("{a:#x}")),
            gas_used: receipt.gas_used.map(|g| g.to_string()),
            effective_gas_price: receipt.effective_gas_price.map(|g| g.to_string()),
            status,
            event,
        }))
    }
}

fn u256_to_id(v: U256) -> Option<i64> {
    if v.bits() <= 62 {
        Some(v.as_u64() as i64)
    } else {
        None
    }
}

fn u256_to_amount(v: U256) -> TokenAmount {
    if v.bits() <= 128 {
        TokenAmount::from_base(v.as_u128())
    } else {
        debug!("on-chain reward exceeds u128, clamping");
        TokenAmount::from_base(u128::MAX)
    }
}

/// Platform key used to counter-sign composed receipts (EIP-191 personal
/// sign over the canonical core JSON).
pub struct ReceiptSigner {
    wallet: LocalWallet,
}

impl ReceiptSigner {
    pub fn from_key(hex_key: &str) -> Result<Self, ChainError> {
        let wallet = hex_key
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| ChainError::Key(e.to_string()))?;
        Ok(Self { wallet })
    }

    pub fn address(&self) -> String {
        format!("{:#x}", self.wallet.address())
    }

    pub async fn sign(&self, payload: &[u8]) -> Result<String, ChainError> {
        let signature = self
            .wallet
            .sign_message(payload)
            .await
            .map_err(|e| ChainError::Rpc(format!("signing failed: {e}")))?;
        Ok(format!("0x{}", hex::encode(signature.to_vec())))
    }
}
