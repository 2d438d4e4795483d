use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::token::{TaggedAmount, TokenAmount};

pub type Id = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Open,
    Solved,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Open => "open",
            QuestionStatus::Solved => "solved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(QuestionStatus::Open),
            "solved" => Some(QuestionStatus::Solved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Question {
    /// Contract-assigned id reported by the client after escrow creation.
    pub id: Id,
    /// Lowercased wallet address of the asker.
    pub author: String,
    pub title: String,
    pub content: String,
    pub content_hash: String,
    /// Escrowed reward in base units.
    pub reward: TokenAmount,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub status: QuestionStatus,
    pub accepted_answer_id: Option<Id>,
}

/// Question plus the live answer count, recomputed from the answers table on
/// every read rather than stored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionView {
    pub id: Id,
    pub author: String,
    pub title: String,
    pub content: String,
    pub content_hash: String,
    pub reward: TokenAmount,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub status: QuestionStatus,
    pub accepted_answer_id: Option<Id>,
    pub answer_count: i64,
}

impl QuestionView {
    pub fn from_question(q: Question, answer_count: i64) -> Self {
        QuestionView {
            id: q.id,
            author: q.author,
            title: q.title,
            content: q.content,
            content_hash: q.content_hash,
            reward: q.reward,
            tags: q.tags,
            created_at: q.created_at,
            status: q.status,
            accepted_answer_id: q.accepted_answer_id,
            answer_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewQuestion {
    pub id: Id,
    pub title: String,
    pub content: String,
    pub content_hash: String,
    pub reward: TaggedAmount,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Answer {
    pub id: Id,
    pub question_id: Id,
    /// Lowercased wallet address of the answerer.
    pub author: String,
    pub content: String,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    /// Monotonic: set exactly once, never unset.
    pub is_accepted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewAnswer {
    pub question_id: Id,
    pub content: String,
    pub content_hash: String,
}

/// One account record per person: unique email for credential login, unique
/// optional wallet address for on-chain identity. Counters and the internal
/// WAK balance all live here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub user_name: String,
    pub password_hash: String,
    pub wallet_address: Option<String>,
    pub token_balance: TokenAmount,
    pub reputation: i64,
    pub question_count: i64,
    pub answer_count: i64,
    pub accepted_answer_count: i64,
    pub created_at: DateTime<Utc>,
}

/// API-facing projection of a `User`; the password hash never leaves the
/// store boundary.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub email: String,
    pub user_name: String,
    pub wallet_address: Option<String>,
    pub token_balance: TokenAmount,
    pub reputation: i64,
    pub question_count: i64,
    pub answer_count: i64,
    pub accepted_answer_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        UserProfile {
            email: u.email,
            user_name: u.user_name,
            wallet_address: u.wallet_address,
            token_balance: u.token_balance,
            reputation: u.reputation,
            question_count: u.question_count,
            answer_count: u.answer_count,
            accepted_answer_count: u.accepted_answer_count,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub user_name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfile {
    pub user_name: Option<String>,
    /// Stored lowercased; a wallet already claimed by another account is a conflict.
    pub wallet_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Bookmark {
    pub question_id: Id,
    pub user_address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewAnswer,
    AnswerAccepted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewAnswer => "new_answer",
            NotificationKind::AnswerAccepted => "answer_accepted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new_answer" => Some(NotificationKind::NewAnswer),
            "answer_accepted" => Some(NotificationKind::AnswerAccepted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: Id,
    pub user_email: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub question_id: Option<Id>,
    pub tags: Vec<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_email: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub question_id: Option<Id>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    Exchange,
    Withdraw,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Exchange => "exchange",
            LedgerKind::Withdraw => "withdraw",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exchange" => Some(LedgerKind::Exchange),
            "withdraw" => Some(LedgerKind::Withdraw),
            _ => None,
        }
    }
}

/// Append-only ledger row; each insertion applies its balance effect to the
/// owning user in the same store operation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntry {
    pub id: Id,
    pub user_email: String,
    pub kind: LedgerKind,
    pub eth_amount: TokenAmount,
    pub wak_amount: TokenAmount,
    pub tx_hash: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewLedgerEntry {
    pub kind: LedgerKind,
    pub eth_amount: TaggedAmount,
    pub wak_amount: TaggedAmount,
    pub tx_hash: Option<String>,
}

/// Immutable attestation tying an on-chain settlement to its off-chain
/// question/answer pair. Keyed by transaction hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Receipt {
    pub id: String,
    pub tx_hash: String,
    pub question_id: Option<Id>,
    pub answer_id: Option<Id>,
    pub core: crate::receipt::ReceiptCore,
    pub gas_used: Option<String>,
    pub effective_gas_price: Option<String>,
    pub tags: Vec<String>,
    pub explorer_url: String,
    pub signature: Option<String>,
    pub signer: Option<String>,
    /// Wallet addresses allowed to list this receipt (asker + answerer).
    pub participants: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of the atomic acceptance sequence.
#[derive(Debug, Clone)]
pub struct AcceptOutcome {
    pub question: Question,
    pub answer: Answer,
    /// False when the answer author has no account to credit; acceptance
    /// still commits and the caller surfaces the gap.
    pub reward_credited: bool,
}

/// Per-author aggregate over the answers table, before scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorStats {
    pub author: String,
    pub answers: i64,
    pub accepted: i64,
}
