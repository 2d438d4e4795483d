use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::chain::{ChainConfig, ChainError, ReceiptSigner, SettlementSource, TxStatus};
use crate::models::{Answer, Receipt};
use crate::repo::{Repo, RepoResult};
use crate::token::{TokenAmount, WAK_DECIMALS, WAK_SYMBOL};

/// Schema version of the signed core; bump on any field change.
pub const RECEIPT_VERSION: u32 = 1;

/// The signed portion of a receipt: everything a verifier needs to re-derive
/// the attestation, nothing presentational. Field order is the canonical
/// serialization order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReceiptCore {
    pub version: u32,
    pub network: String,
    pub chain_id: u64,
    pub token_address: String,
    pub escrow_address: String,
    pub tx_hash: String,
    pub block_number: u64,
    pub block_hash: String,
    pub tx_status: String,
    pub question_id: Option<i64>,
    pub question_author: Option<String>,
    pub question_title: Option<String>,
    pub question_content_hash: Option<String>,
    pub answer_id: Option<i64>,
    pub answer_author: Option<String>,
    pub answer_content_hash: Option<String>,
    /// Whole-token decimal string.
    pub reward: String,
    pub token_symbol: String,
    pub token_decimals: u32,
    pub issued_at: DateTime<Utc>,
}

/// Caller-supplied hints; the decoded event wins when both are present.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReceiptRequest {
    pub tx_hash: String,
    pub question_id: Option<i64>,
    pub answer_id: Option<i64>,
}

/// Idempotent fetch-or-create keyed on the transaction hash.
///
/// Every external call degrades instead of failing: an unreachable RPC node
/// yields a receipt with zeroed on-chain fields, a missing signing key (or a
/// failed signature) yields an unsigned receipt. Only store failures
/// propagate.
pub async fn generate_or_fetch(
    repo: &dyn Repo,
    source: &dyn SettlementSource,
    signer: Option<&ReceiptSigner>,
    cfg: &ChainConfig,
    req: ReceiptRequest,
) -> RepoResult<Receipt> {
    if let Some(existing) = repo.find_receipt(&req.tx_hash).await? {
        return Ok(existing);
    }

    let settlement = match source.settlement(&req.tx_hash).await {
        Ok(s) => s,
        Err(ChainError::Cancelled) => {
            debug!(tx_hash = %req.tx_hash, "settlement lookup cancelled");
            None
        }
        Err(e) => {
            warn!(tx_hash = %req.tx_hash, "settlement lookup failed, degrading: {e}");
            None
        }
    };

    let event = settlement.as_ref().and_then(|s| s.event.clone());

    let question_id = event.as_ref().and_then(|e| e.question_id).or(req.question_id);
    let answer_id = event.as_ref().and_then(|e| e.answer_id).or(req.answer_id);

    let question = match question_id {
        Some(id) => repo.get_question(id).await.ok(),
        None => None,
    };
    let answer: Option<Answer> = match answer_id {
        Some(id) => repo.get_answer(id).await.ok(),
        None => None,
    };

    // On-chain value wins, then the stored reward, then zero.
    let reward = event
        .as_ref()
        .map(|e| e.reward)
        .or_else(|| question.as_ref().map(|q| q.reward))
        .unwrap_or(TokenAmount::ZERO);

    let answer_author = answer
        .as_ref()
        .map(|a| a.author.clone())
        .or_else(|| event.as_ref().map(|e| e.answer_author.clone()));

    let core = ReceiptCore {
        version: RECEIPT_VERSION,
        network: cfg.network.clone(),
        chain_id: cfg.chain_id,
        token_address: cfg.token_address.clone(),
        escrow_address: cfg.escrow_address.clone(),
        tx_hash: req.tx_hash.clone(),
        block_number: settlement.as_ref().map(|s| s.block_number).unwrap_or(0),
        block_hash: settlement
            .as_ref()
            .map(|s| s.block_hash.clone())
            .unwrap_or_default(),
        tx_status: settlement
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(TxStatus::Success)
            .as_str()
            .to_string(),
        question_id,
        question_author: question.as_ref().map(|q| q.author.clone()),
        question_title: question.as_ref().map(|q| q.title.clone()),
        question_content_hash: question.as_ref().map(|q| q.content_hash.clone()),
        answer_id,
        answer_author: answer_author.clone(),
        answer_content_hash: answer.as_ref().map(|a| a.content_hash.clone()),
        reward: reward.whole_string(),
        token_symbol: WAK_SYMBOL.to_string(),
        token_decimals: WAK_DECIMALS,
        issued_at: Utc::now(),
    };

    let (signature, signer_address) = match signer {
        Some(signer) => match sign_core(signer, &core).await {
            Ok(sig) => (Some(sig), Some(signer.address())),
            Err(e) => {
                warn!(tx_hash = %req.tx_hash, "receipt signing failed, storing unsigned: {e}");
                (None, None)
            }
        },
        None => (None, None),
    };

    let mut participants: Vec<String> = Vec::new();
    if let Some(q) = &question {
        participants.push(q.author.clone());
    }
    if let Some(author) = &answer_author {
        if !participants.contains(author) {
            participants.push(author.clone());
        }
    }

    let receipt = Receipt {
        id: uuid::Uuid::new_v4().to_string(),
        tx_hash: req.tx_hash.clone(),
        question_id,
        answer_id,
        gas_used: settlement.as_ref().and_then(|s| s.gas_used.clone()),
        effective_gas_price: settlement.as_ref().and_then(|s| s.effective_gas_price.clone()),
        tags: question.as_ref().map(|q| q.tags.clone()).unwrap_or_default(),
        explorer_url: cfg.explorer_tx_url(&req.tx_hash),
        signature,
        signer: signer_address,
        participants,
        created_at: Utc::now(),
        core,
    };

    repo.insert_receipt_if_absent(receipt).await
}

async fn sign_core(signer: &ReceiptSigner, core: &ReceiptCore) -> Result<String, ChainError> {
    let payload = serde_json::to_vec(core)
        .map_err(|e| ChainError::Rpc(format!("core serialization failed: {e}")))?;
    signer.sign(&payload).await
}

/// A well-formed 0x-prefixed 32-byte transaction hash.
pub fn is_tx_hash(s: &str) -> bool {
    s.len() == 66
        && s.starts_with("0x")
        && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_hash_shape_is_checked() {
        assert!(is_tx_hash(&format!("0x{}", "ab".repeat(32))));
        assert!(!is_tx_hash("0x1234"));
        assert!(!is_tx_hash(&format!("0x{}", "zz".repeat(32))));
        assert!(!is_tx_hash(&"ab".repeat(33)));
    }
}
