use chrono::{DateTime, Utc};

use crate::models::*;
use crate::token::TokenAmount;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("already resolved")]
    AlreadyResolved,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("internal: {0}")]
    Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Conflict when the email is already registered.
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<User>;
    async fn find_user_by_wallet(&self, address: &str) -> RepoResult<User>;
    /// Conflict when the wallet address belongs to another account.
    async fn update_profile(&self, email: &str, upd: UpdateProfile) -> RepoResult<User>;
    async fn credit_balance(&self, email: &str, amount: TokenAmount) -> RepoResult<User>;
    /// InsufficientFunds when the balance does not cover the amount; never clamps.
    async fn debit_balance(&self, email: &str, amount: TokenAmount) -> RepoResult<User>;
    /// Removes the account and its ledger entries; authored questions and
    /// answers stay in place.
    async fn delete_account(&self, email: &str) -> RepoResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub status: Option<QuestionStatus>,
}

#[async_trait]
pub trait QuestionRepo: Send + Sync {
    /// Newest first; every view carries the live answer count.
    async fn list_questions(&self, filter: QuestionFilter) -> RepoResult<Vec<QuestionView>>;
    async fn get_question(&self, id: Id) -> RepoResult<QuestionView>;
    /// Debits the author's balance by the reward, inserts the question and
    /// bumps the author's question count as one operation.
    async fn create_question(
        &self,
        author_email: &str,
        author_address: &str,
        new: NewQuestion,
        reward: TokenAmount,
    ) -> RepoResult<Question>;
    /// The whole acceptance sequence, all-or-nothing: answer accepted,
    /// question solved, answer author credited (when they have an account).
    async fn accept_answer(&self, question_id: Id, answer_id: Id) -> RepoResult<AcceptOutcome>;
}

#[async_trait]
pub trait AnswerRepo: Send + Sync {
    /// Ascending by creation time.
    async fn list_answers(&self, question_id: Id) -> RepoResult<Vec<Answer>>;
    async fn create_answer(&self, author_address: &str, new: NewAnswer) -> RepoResult<Answer>;
    async fn get_answer(&self, id: Id) -> RepoResult<Answer>;
}

#[async_trait]
pub trait BookmarkRepo: Send + Sync {
    async fn list_bookmarks(&self, user_address: &str) -> RepoResult<Vec<QuestionView>>;
    /// Returns false when the pair already existed (idempotent no-op).
    async fn add_bookmark(&self, user_address: &str, question_id: Id) -> RepoResult<bool>;
    async fn remove_bookmark(&self, user_address: &str, question_id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn push_notification(&self, new: NewNotification) -> RepoResult<Notification>;
    /// Newest first; read entries older than seven days are purged before
    /// the listing is produced.
    async fn list_notifications(&self, user_email: &str) -> RepoResult<Vec<Notification>>;
    async fn mark_notification_read(&self, user_email: &str, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait ReceiptRepo: Send + Sync {
    async fn find_receipt(&self, tx_hash: &str) -> RepoResult<Option<Receipt>>;
    /// At-most-once insert keyed by tx hash; a concurrent duplicate returns
    /// the stored document instead of erroring.
    async fn insert_receipt_if_absent(&self, receipt: Receipt) -> RepoResult<Receipt>;
    async fn list_receipts_for(&self, wallet: &str) -> RepoResult<Vec<Receipt>>;
}

#[async_trait]
pub trait LedgerRepo: Send + Sync {
    /// Appends the entry and applies its balance effect (exchange credits,
    /// withdraw debits) in one operation.
    async fn append_ledger_entry(
        &self,
        user_email: &str,
        kind: LedgerKind,
        eth_amount: TokenAmount,
        wak_amount: TokenAmount,
        tx_hash: Option<String>,
    ) -> RepoResult<LedgerEntry>;
    async fn list_ledger_entries(&self, user_email: &str) -> RepoResult<Vec<LedgerEntry>>;
}

#[async_trait]
pub trait RankingRepo: Send + Sync {
    /// Per-author answer aggregates, optionally bounded below by `since`.
    async fn author_stats(&self, since: Option<DateTime<Utc>>) -> RepoResult<Vec<AuthorStats>>;
}

pub trait Repo:
    UserRepo
    + QuestionRepo
    + AnswerRepo
    + BookmarkRepo
    + NotificationRepo
    + ReceiptRepo
    + LedgerRepo
    + RankingRepo
{
}

impl<T> Repo for T where
    T: UserRepo
        + QuestionRepo
        + AnswerRepo
        + BookmarkRepo
        + NotificationRepo
        + ReceiptRepo
        + LedgerRepo
        + RankingRepo
{
}

/// Retention for read notifications before lazy purge.
pub const NOTIFICATION_TTL_DAYS: i64 = 7;

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, RwLock};

    const SNAPSHOT_PATH: &str = "data/state.json";

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        users: HashMap<Id, User>,
        questions: HashMap<Id, Question>,
        answers: HashMap<Id, Answer>,
        bookmarks: Vec<Bookmark>,
        notifications: HashMap<Id, Notification>,
        receipts: HashMap<String, Receipt>,
        ledger: HashMap<Id, LedgerEntry>,
        next_id: Id,
    }

    impl State {
        fn answer_count(&self, question_id: Id) -> i64 {
            self.answers
                .values()
                .filter(|a| a.question_id == question_id)
                .count() as i64
        }

        fn user_by_email_mut(&mut self, email: &str) -> Option<&mut User> {
            self.users.values_mut().find(|u| u.email == email)
        }
    }

    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Arc<PathBuf>,
    }

    impl InMemRepo {
        fn data_dir() -> PathBuf {
            std::env::var("WAKQ_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data"))
        }

        fn snapshot_path() -> PathBuf {
            if std::env::var("WAKQ_DATA_DIR").is_ok() {
                let mut p = Self::data_dir();
                p.push("state.json");
                p
            } else {
                PathBuf::from(SNAPSHOT_PATH)
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        tracing::info!("loaded snapshot '{}'", path.display());
                        s
                    }
                    Err(e) => {
                        tracing::warn!(
                            "failed to parse snapshot '{}': {e}. Starting empty.",
                            path.display()
                        );
                        State::default()
                    }
                },
                Err(_) => State::default(),
            }
        }

        fn persist(&self) {
            let path = self.snapshot_path.clone();
            let serialized = {
                let s = match self.state.read() {
                    Ok(s) => s,
                    Err(_) => return,
                };
                serde_json::to_vec_pretty(&*s)
            };
            if let Ok(bytes) = serialized {
                if let Some(dir) = path.parent() {
                    let _ = std::fs::create_dir_all(dir);
                }
                if let Err(e) = std::fs::write(&*path, bytes) {
                    tracing::warn!("failed to write snapshot '{}': {e}", path.display());
                }
            }
        }

        pub fn new() -> Self {
            let snapshot_path = Self::snapshot_path();
            let state = Self::load_state_from(&snapshot_path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Arc::new(snapshot_path),
            }
        }

        fn next_id(state: &mut State) -> Id {
            state.next_id += 1;
            state.next_id
        }

        fn read(&self) -> RepoResult<std::sync::RwLockReadGuard<'_, State>> {
            self.state
                .read()
                .map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<std::sync::RwLockWriteGuard<'_, State>> {
            self.state
                .write()
                .map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }
    }

    impl Default for InMemRepo {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl UserRepo for InMemRepo {
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            let user = {
                let mut s = self.write()?;
                if s.users.values().any(|u| u.email == new.email) {
                    return Err(RepoError::Conflict);
                }
                let id = Self::next_id(&mut s);
                let user = User {
                    id,
                    email: new.email,
                    user_name: new.user_name,
                    password_hash: new.password_hash,
                    wallet_address: None,
                    token_balance: TokenAmount::ZERO,
                    reputation: 0,
                    question_count: 0,
                    answer_count: 0,
                    accepted_answer_count: 0,
                    created_at: Utc::now(),
                };
                s.users.insert(id, user.clone());
                user
            };
            self.persist();
            Ok(user)
        }

        async fn find_user_by_email(&self, email: &str) -> RepoResult<User> {
            let s = self.read()?;
            s.users
                .values()
                .find(|u| u.email == email)
                .cloned()
                .ok_or(RepoError::NotFound)
        }

        async fn find_user_by_wallet(&self, address: &str) -> RepoResult<User> {
            let needle = address.to_lowercase();
            let s = self.read()?;
            s.users
                .values()
                .find(|u| u.wallet_address.as_deref() == Some(needle.as_str()))
                .cloned()
                .ok_or(RepoError::NotFound)
        }

        async fn update_profile(&self, email: &str, upd: UpdateProfile) -> RepoResult<User> {
            let user = {
                let mut s = self.write()?;
                if let Some(ref wallet) = upd.wallet_address {
                    let wallet = wallet.to_lowercase();
                    if s.users
                        .values()
                        .any(|u| u.wallet_address.as_deref() == Some(wallet.as_str()) && u.email != email)
                    {
                        return Err(RepoError::Conflict);
                    }
                }
                let user = s.user_by_email_mut(email).ok_or(RepoError::NotFound)?;
                if let Some(name) = upd.user_name {
                    user.user_name = name;
                }
                if let Some(wallet) = upd.wallet_address {
                    user.wallet_address = Some(wallet.to_lowercase());
                }
                user.clone()
            };
            self.persist();
            Ok(user)
        }

        async fn credit_balance(&self, email: &str, amount: TokenAmount) -> RepoResult<User> {
            let user = {
                let mut s = self.write()?;
                let user = s.user_by_email_mut(email).ok_or(RepoError::NotFound)?;
                user.token_balance = user
                    .token_balance
                    .checked_add(amount)
                    .ok_or_else(|| RepoError::Internal("balance overflow".into()))?;
                user.clone()
            };
            self.persist();
            Ok(user)
        }

        async fn debit_balance(&self, email: &str, amount: TokenAmount) -> RepoResult<User> {
            let user = {
                let mut s = self.write()?;
                let user = s.user_by_email_mut(email).ok_or(RepoError::NotFound)?;
                user.token_balance = user
                    .token_balance
                    .checked_sub(amount)
                    .ok_or(RepoError::InsufficientFunds)?;
                user.clone()
            };
            self.persist();
            Ok(user)
        }

        async fn delete_account(&self, email: &str) -> RepoResult<()> {
            {
                let mut s = self.write()?;
                let id = s
                    .users
                    .values()
                    .find(|u| u.email == email)
                    .map(|u| u.id)
                    .ok_or(RepoError::NotFound)?;
                s.users.remove(&id);
                s.ledger.retain(|_, e| e.user_email != email);
                s.notifications.retain(|_, n| n.user_email != email);
            }
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl QuestionRepo for InMemRepo {
        async fn list_questions(&self, filter: QuestionFilter) -> RepoResult<Vec<QuestionView>> {
            let s = self.read()?;
            let mut v: Vec<QuestionView> = s
                .questions
                .values()
                .filter(|q| filter.tag.as_ref().map_or(true, |t| q.tags.contains(t)))
                .filter(|q| {
                    filter
                        .author
                        .as_ref()
                        .map_or(true, |a| q.author == a.to_lowercase())
                })
                .filter(|q| filter.status.map_or(true, |st| q.status == st))
                .map(|q| QuestionView::from_question(q.clone(), s.answer_count(q.id)))
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(v)
        }

        async fn get_question(&self, id: Id) -> RepoResult<QuestionView> {
            let s = self.read()?;
            let q = s.questions.get(&id).cloned().ok_or(RepoError::NotFound)?;
            let count = s.answer_count(id);
            Ok(QuestionView::from_question(q, count))
        }

        async fn create_question(
            &self,
            author_email: &str,
            author_address: &str,
            new: NewQuestion,
            reward: TokenAmount,
        ) -> RepoResult<Question> {
            let question = {
                let mut s = self.write()?;
                if s.questions.contains_key(&new.id) {
                    return Err(RepoError::Conflict);
                }
                let user = s.user_by_email_mut(author_email).ok_or(RepoError::NotFound)?;
                user.token_balance = user
                    .token_balance
                    .checked_sub(reward)
                    .ok_or(RepoError::InsufficientFunds)?;
                user.question_count += 1;
                let question = Question {
                    id: new.id,
                    author: author_address.to_lowercase(),
                    title: new.title,
                    content: new.content,
                    content_hash: new.content_hash,
                    reward,
                    tags: new.tags,
                    created_at: Utc::now(),
                    status: QuestionStatus::Open,
                    accepted_answer_id: None,
                };
                s.questions.insert(question.id, question.clone());
                question
            };
            self.persist();
            Ok(question)
        }

        async fn accept_answer(&self, question_id: Id, answer_id: Id) -> RepoResult<AcceptOutcome> {
            let outcome = {
                let mut s = self.write()?;

                let answer = s.answers.get(&answer_id).cloned().ok_or(RepoError::NotFound)?;
                if answer.question_id != question_id {
                    return Err(RepoError::NotFound);
                }
                let question = s
                    .questions
                    .get(&question_id)
                    .cloned()
                    .ok_or(RepoError::NotFound)?;
                if question.status == QuestionStatus::Solved
                    || question.accepted_answer_id.is_some()
                {
                    return Err(RepoError::AlreadyResolved);
                }

                // All checks passed; apply the whole sequence under the one
                // write guard.
                if let Some(a) = s.answers.get_mut(&answer_id) {
                    a.is_accepted = true;
                }
                if let Some(q) = s.questions.get_mut(&question_id) {
                    q.status = QuestionStatus::Solved;
                    q.accepted_answer_id = Some(answer_id);
                }

                let reward = question.reward;
                let author = answer.author.clone();
                let reward_credited = match s
                    .users
                    .values_mut()
                    .find(|u| u.wallet_address.as_deref() == Some(author.as_str()))
                {
                    Some(user) => {
                        user.token_balance = user
                            .token_balance
                            .checked_add(reward)
                            .ok_or_else(|| RepoError::Internal("balance overflow".into()))?;
                        user.accepted_answer_count += 1;
                        true
                    }
                    None => false,
                };

                let question = s.questions.get(&question_id).cloned().ok_or(RepoError::NotFound)?;
                let answer = s.answers.get(&answer_id).cloned().ok_or(RepoError::NotFound)?;
                AcceptOutcome { question, answer, reward_credited }
            };
            self.persist();
            Ok(outcome)
        }
    }

    #[async_trait]
    impl AnswerRepo for InMemRepo {
        async fn list_answers(&self, question_id: Id) -> RepoResult<Vec<Answer>> {
            let s = self.read()?;
            if !s.questions.contains_key(&question_id) {
                return Err(RepoError::NotFound);
            }
            let mut v: Vec<_> = s
                .answers
                .values()
                .filter(|a| a.question_id == question_id)
                .cloned()
                .collect();
            v.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(v)
        }

        async fn create_answer(&self, author_address: &str, new: NewAnswer) -> RepoResult<Answer> {
            let answer = {
                let mut s = self.write()?;
                if !s.questions.contains_key(&new.question_id) {
                    return Err(RepoError::NotFound);
                }
                let id = Self::next_id(&mut s);
                let author = author_address.to_lowercase();
                let answer = Answer {
                    id,
                    question_id: new.question_id,
                    author: author.clone(),
                    content: new.content,
                    content_hash: new.content_hash,
                    created_at: Utc::now(),
                    is_accepted: false,
                };
                s.answers.insert(id, answer.clone());
                if let Some(user) = s
                    .users
                    .values_mut()
                    .find(|u| u.wallet_address.as_deref() == Some(author.as_str()))
                {
                    user.answer_count += 1;
                }
                answer
            };
            self.persist();
            Ok(answer)
        }

        async fn get_answer(&self, id: Id) -> RepoResult<Answer> {
            let s = self.read()?;
            s.answers.get(&id).cloned().ok_or(RepoError::NotFound)
        }
    }

    #[async_trait]
    impl BookmarkRepo for InMemRepo {
        async fn list_bookmarks(&self, user_address: &str) -> RepoResult<Vec<QuestionView>> {
            let needle = user_address.to_lowercase();
            let s = self.read()?;
            let mut marks: Vec<_> = s
                .bookmarks
                .iter()
                .filter(|b| b.user_address == needle)
                .cloned()
                .collect();
            marks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(marks
                .into_iter()
                .filter_map(|b| {
                    s.questions
                        .get(&b.question_id)
                        .map(|q| QuestionView::from_question(q.clone(), s.answer_count(q.id)))
                })
                .collect())
        }

        async fn add_bookmark(&self, user_address: &str, question_id: Id) -> RepoResult<bool> {
            let inserted = {
                let mut s = self.write()?;
                if !s.questions.contains_key(&question_id) {
                    return Err(RepoError::NotFound);
                }
                let needle = user_address.to_lowercase();
                if s.bookmarks
                    .iter()
                    .any(|b| b.user_address == needle && b.question_id == question_id)
                {
                    false
                } else {
                    s.bookmarks.push(Bookmark {
                        question_id,
                        user_address: needle,
                        created_at: Utc::now(),
                    });
                    true
                }
            };
            if inserted {
                self.persist();
            }
            Ok(inserted)
        }

        async fn remove_bookmark(&self, user_address: &str, question_id: Id) -> RepoResult<()> {
            {
                let mut s = self.write()?;
                let needle = user_address.to_lowercase();
                let before = s.bookmarks.len();
                s.bookmarks
                    .retain(|b| !(b.user_address == needle && b.question_id == question_id));
                if s.bookmarks.len() == before {
                    return Err(RepoError::NotFound);
                }
            }
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl NotificationRepo for InMemRepo {
        async fn push_notification(&self, new: NewNotification) -> RepoResult<Notification> {
            let notification = {
                let mut s = self.write()?;
                let id = Self::next_id(&mut s);
                let notification = Notification {
                    id,
                    user_email: new.user_email,
                    kind: new.kind,
                    title: new.title,
                    message: new.message,
                    question_id: new.question_id,
                    tags: new.tags,
                    is_read: false,
                    created_at: Utc::now(),
                };
                s.notifications.insert(id, notification.clone());
                notification
            };
            self.persist();
            Ok(notification)
        }

        async fn list_notifications(&self, user_email: &str) -> RepoResult<Vec<Notification>> {
            let cutoff = Utc::now() - chrono::Duration::days(NOTIFICATION_TTL_DAYS);
            let (purged, list) = {
                let mut s = self.write()?;
                let before = s.notifications.len();
                s.notifications
                    .retain(|_, n| !(n.is_read && n.created_at < cutoff));
                let purged = before - s.notifications.len();
                let mut v: Vec<_> = s
                    .notifications
                    .values()
                    .filter(|n| n.user_email == user_email)
                    .cloned()
                    .collect();
                v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                (purged, v)
            };
            if purged > 0 {
                self.persist();
            }
            Ok(list)
        }

        async fn mark_notification_read(&self, user_email: &str, id: Id) -> RepoResult<()> {
            {
                let mut s = self.write()?;
                let n = s.notifications.get_mut(&id).ok_or(RepoError::NotFound)?;
                if n.user_email != user_email {
                    return Err(RepoError::NotFound);
                }
                n.is_read = true;
            }
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl ReceiptRepo for InMemRepo {
        async fn find_receipt(&self, tx_hash: &str) -> RepoResult<Option<Receipt>> {
            let s = self.read()?;
            Ok(s.receipts.get(tx_hash).cloned())
        }

        async fn insert_receipt_if_absent(&self, receipt: Receipt) -> RepoResult<Receipt> {
            let stored = {
                let mut s = self.write()?;
                match s.receipts.get(&receipt.tx_hash) {
                    Some(existing) => existing.clone(),
                    None => {
                        s.receipts.insert(receipt.tx_hash.clone(), receipt.clone());
                        receipt
                    }
                }
            };
            self.persist();
            Ok(stored)
        }

        async fn list_receipts_for(&self, wallet: &str) -> RepoResult<Vec<Receipt>> {
            let needle = wallet.to_lowercase();
            let s = self.read()?;
            let mut v: Vec<_> = s
                .receipts
                .values()
                .filter(|r| r.participants.iter().any(|p| p == &needle))
                .cloned()
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(v)
        }
    }

    #[async_trait]
    impl LedgerRepo for InMemRepo {
        async fn append_ledger_entry(
            &self,
            user_email: &str,
            kind: LedgerKind,
            eth_amount: TokenAmount,
            wak_amount: TokenAmount,
            tx_hash: Option<String>,
        ) -> RepoResult<LedgerEntry> {
            let entry = {
                let mut s = self.write()?;
                let user = s.user_by_email_mut(user_email).ok_or(RepoError::NotFound)?;
                user.token_balance = match kind {
                    LedgerKind::Exchange => user
                        .token_balance
                        .checked_add(wak_amount)
                        .ok_or_else(|| RepoError::Internal("balance overflow".into()))?,
                    LedgerKind::Withdraw => user
                        .token_balance
                        .checked_sub(wak_amount)
                        .ok_or(RepoError::InsufficientFunds)?,
                };
                let id = Self::next_id(&mut s);
                let entry = LedgerEntry {
                    id,
                    user_email: user_email.to_string(),
                    kind,
                    eth_amount,
                    wak_amount,
                    tx_hash,
                    status: "completed".to_string(),
                    created_at: Utc::now(),
                };
                s.ledger.insert(id, entry.clone());
                entry
            };
            self.persist();
            Ok(entry)
        }

        async fn list_ledger_entries(&self, user_email: &str) -> RepoResult<Vec<LedgerEntry>> {
            let s = self.read()?;
            let mut v: Vec<_> = s
                .ledger
                .values()
                .filter(|e| e.user_email == user_email)
                .cloned()
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(v)
        }
    }

    #[async_trait]
    impl RankingRepo for InMemRepo {
        async fn author_stats(&self, since: Option<DateTime<Utc>>) -> RepoResult<Vec<AuthorStats>> {
            use std::collections::BTreeMap;
            let s = self.read()?;
            let mut agg: BTreeMap<String, (i64, i64)> = BTreeMap::new();
            for a in s.answers.values() {
                if let Some(start) = since {
                    if a.created_at < start {
                        continue;
                    }
                }
                let slot = agg.entry(a.author.clone()).or_default();
                slot.0 += 1;
                if a.is_accepted {
                    slot.1 += 1;
                }
            }
            Ok(agg
                .into_iter()
                .map(|(author, (answers, accepted))| AuthorStats { author, answers, accepted })
                .collect())
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::postgres::PgRow;
    use sqlx::{Pool, Postgres, Row, Transaction};

    #[derive(Clone)]
    pub struct PgRepo {
        pool: Pool<Postgres>,
    }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self {
            Self { pool }
        }
    }

    fn internal<E: std::fmt::Display>(e: E) -> RepoError {
        RepoError::Internal(e.to_string())
    }

    fn amount_col(row: &PgRow, col: &str) -> RepoResult<TokenAmount> {
        let raw: String = row.try_get(col).map_err(internal)?;
        raw.parse().map_err(internal)
    }

    fn user_from_row(row: &PgRow) -> RepoResult<User> {
        Ok(User {
            id: row.try_get("id").map_err(internal)?,
            email: row.try_get("email").map_err(internal)?,
            user_name: row.try_get("user_name").map_err(internal)?,
            password_hash: row.try_get("password_hash").map_err(internal)?,
            wallet_address: row.try_get("wallet_address").map_err(internal)?,
            token_balance: amount_col(row, "token_balance")?,
            reputation: row.try_get("reputation").map_err(internal)?,
            question_count: row.try_get("question_count").map_err(internal)?,
            answer_count: row.try_get("answer_count").map_err(internal)?,
            accepted_answer_count: row.try_get("accepted_answer_count").map_err(internal)?,
            created_at: row.try_get("created_at").map_err(internal)?,
        })
    }

    fn question_from_row(row: &PgRow) -> RepoResult<Question> {
        let status: String = row.try_get("status").map_err(internal)?;
        Ok(Question {
            id: row.try_get("id").map_err(internal)?,
            author: row.try_get("author").map_err(internal)?,
            title: row.try_get("title").map_err(internal)?,
            content: row.try_get("content").map_err(internal)?,
            content_hash: row.try_get("content_hash").map_err(internal)?,
            reward: amount_col(row, "reward")?,
            tags: row.try_get("tags").map_err(internal)?,
            created_at: row.try_get("created_at").map_err(internal)?,
            status: QuestionStatus::parse(&status)
                .ok_or_else(|| RepoError::Internal(format!("bad status '{status}'")))?,
            accepted_answer_id: row.try_get("accepted_answer_id").map_err(internal)?,
        })
    }

    fn question_view_from_row(row: &PgRow) -> RepoResult<QuestionView> {
        let q = question_from_row(row)?;
        let count: i64 = row.try_get("answer_count").map_err(internal)?;
        Ok(QuestionView::from_question(q, count))
    }

    fn answer_from_row(row: &PgRow) -> RepoResult<Answer> {
        Ok(Answer {
            id: row.try_get("id").map_err(internal)?,
            question_id: row.try_get("question_id").map_err(internal)?,
            author: row.try_get("author").map_err(internal)?,
            content: row.try_get("content").map_err(internal)?,
            content_hash: row.try_get("content_hash").map_err(internal)?,
            created_at: row.try_get("created_at").map_err(internal)?,
            is_accepted: row.try_get("is_accepted").map_err(internal)?,
        })
    }

    fn receipt_from_row(row: &PgRow) -> RepoResult<Receipt> {
        let core: serde_json::Value = row.try_get("core").map_err(internal)?;
        Ok(Receipt {
            id: row.try_get("id").map_err(internal)?,
            tx_hash: row.try_get("tx_hash").map_err(internal)?,
            question_id: row.try_get("question_id").map_err(internal)?,
            answer_id: row.try_get("answer_id").map_err(internal)?,
            core: serde_json::from_value(core).map_err(internal)?,
            gas_used: row.try_get("gas_used").map_err(internal)?,
            effective_gas_price: row.try_get("effective_gas_price").map_err(internal)?,
            tags: row.try_get("tags").map_err(internal)?,
            explorer_url: row.try_get("explorer_url").map_err(internal)?,
            signature: row.try_get("signature").map_err(internal)?,
            signer: row.try_get("signer").map_err(internal)?,
            participants: row.try_get("participants").map_err(internal)?,
            created_at: row.try_get("created_at").map_err(internal)?,
        })
    }

    fn ledger_from_row(row: &PgRow) -> RepoResult<LedgerEntry> {
        let kind: String = row.try_get("kind").map_err(internal)?;
        Ok(LedgerEntry {
            id: row.try_get("id").map_err(internal)?,
            user_email: row.try_get("user_email").map_err(internal)?,
            kind: LedgerKind::parse(&kind)
                .ok_or_else(|| RepoError::Internal(format!("bad ledger kind '{kind}'")))?,
            eth_amount: amount_col(row, "eth_amount")?,
            wak_amount: amount_col(row, "wak_amount")?,
            tx_hash: row.try_get("tx_hash").map_err(internal)?,
            status: row.try_get("status").map_err(internal)?,
            created_at: row.try_get("created_at").map_err(internal)?,
        })
    }

    const QUESTION_VIEW_SELECT: &str = r#"
        SELECT q.id, q.author, q.title, q.content, q.content_hash, q.reward,
               q.tags, q.created_at, q.status, q.accepted_answer_id,
               (SELECT COUNT(*) FROM answers a WHERE a.question_id = q.id) AS answer_count
        FROM questions q
    "#;

    /// Lock the user row and return the parsed balance.
    async fn balance_for_update(
        tx: &mut Transaction<'_, Postgres>,
        email: &str,
    ) -> RepoResult<TokenAmount> {
        let row = sqlx::query("SELECT token_balance FROM users WHERE email = $1 FOR UPDATE")
            .bind(email)
            .fetch_optional(&mut **tx)
            .await
            .map_err(internal)?
            .ok_or(RepoError::NotFound)?;
        amount_col(&row, "token_balance")
    }

    async fn set_balance(
        tx: &mut Transaction<'_, Postgres>,
        email: &str,
        balance: TokenAmount,
    ) -> RepoResult<()> {
        sqlx::query("UPDATE users SET token_balance = $2 WHERE email = $1")
            .bind(email)
            .bind(balance.to_string())
            .execute(&mut **tx)
            .await
            .map_err(internal)?;
        Ok(())
    }

    #[async_trait]
    impl UserRepo for PgRepo {
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            let row = sqlx::query(
                r#"INSERT INTO users (email, user_name, password_hash, token_balance)
                   VALUES ($1, $2, $3, '0')
                   ON CONFLICT (email) DO NOTHING
                   RETURNING id, email, user_name, password_hash, wallet_address,
                             token_balance, reputation, question_count, answer_count,
                             accepted_answer_count, created_at"#,
            )
            .bind(&new.email)
            .bind(&new.user_name)
            .bind(&new.password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or(RepoError::Conflict)?;
            user_from_row(&row)
        }

        async fn find_user_by_email(&self, email: &str) -> RepoResult<User> {
            let row = sqlx::query("SELECT * FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?
                .ok_or(RepoError::NotFound)?;
            user_from_row(&row)
        }

        async fn find_user_by_wallet(&self, address: &str) -> RepoResult<User> {
            let row = sqlx::query("SELECT * FROM users WHERE wallet_address = $1")
                .bind(address.to_lowercase())
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?
                .ok_or(RepoError::NotFound)?;
            user_from_row(&row)
        }

        async fn update_profile(&self, email: &str, upd: UpdateProfile) -> RepoResult<User> {
            let wallet = upd.wallet_address.map(|w| w.to_lowercase());
            if let Some(ref wallet) = wallet {
                let taken = sqlx::query(
                    "SELECT 1 AS one FROM users WHERE wallet_address = $1 AND email <> $2",
                )
                .bind(wallet)
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?;
                if taken.is_some() {
                    return Err(RepoError::Conflict);
                }
            }
            let row = sqlx::query(
                r#"UPDATE users
                   SET user_name = COALESCE($2, user_name),
                       wallet_address = COALESCE($3, wallet_address)
                   WHERE email = $1
                   RETURNING *"#,
            )
            .bind(email)
            .bind(upd.user_name)
            .bind(wallet)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or(RepoError::NotFound)?;
            user_from_row(&row)
        }

        async fn credit_balance(&self, email: &str, amount: TokenAmount) -> RepoResult<User> {
            let mut tx = self.pool.begin().await.map_err(internal)?;
            let balance = balance_for_update(&mut tx, email).await?;
            let next = balance
                .checked_add(amount)
                .ok_or_else(|| RepoError::Internal("balance overflow".into()))?;
            set_balance(&mut tx, email, next).await?;
            tx.commit().await.map_err(internal)?;
            self.find_user_by_email(email).await
        }

        async fn debit_balance(&self, email: &str, amount: TokenAmount) -> RepoResult<User> {
            let mut tx = self.pool.begin().await.map_err(internal)?;
            let balance = balance_for_update(&mut tx, email).await?;
            let next = balance.checked_sub(amount).ok_or(RepoError::InsufficientFunds)?;
            set_balance(&mut tx, email, next).await?;
            tx.commit().await.map_err(internal)?;
            self.find_user_by_email(email).await
        }

        async fn delete_account(&self, email: &str) -> RepoResult<()> {
            let mut tx = self.pool.begin().await.map_err(internal)?;
            let deleted = sqlx::query("DELETE FROM users WHERE email = $1")
                .bind(email)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
            if deleted.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            sqlx::query("DELETE FROM ledger_entries WHERE user_email = $1")
                .bind(email)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
            sqlx::query("DELETE FROM notifications WHERE user_email = $1")
                .bind(email)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
            tx.commit().await.map_err(internal)?;
            Ok(())
        }
    }

    #[async_trait]
    impl QuestionRepo for PgRepo {
        async fn list_questions(&self, filter: QuestionFilter) -> RepoResult<Vec<QuestionView>> {
            let sql = format!(
                r#"{QUESTION_VIEW_SELECT}
                   WHERE ($1::text IS NULL OR q.tags @> ARRAY[$1])
                     AND ($2::text IS NULL OR q.author = $2)
                     AND ($3::text IS NULL OR q.status = $3)
                   ORDER BY q.created_at DESC"#
            );
            let rows = sqlx::query(&sql)
                .bind(filter.tag)
                .bind(filter.author.map(|a| a.to_lowercase()))
                .bind(filter.status.map(|s| s.as_str().to_string()))
                .fetch_all(&self.pool)
                .await
                .map_err(internal)?;
            rows.iter().map(question_view_from_row).collect()
        }

        async fn get_question(&self, id: Id) -> RepoResult<QuestionView> {
            let sql = format!("{QUESTION_VIEW_SELECT} WHERE q.id = $1");
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?
                .ok_or(RepoError::NotFound)?;
            question_view_from_row(&row)
        }

        async fn create_question(
            &self,
            author_email: &str,
            author_address: &str,
            new: NewQuestion,
            reward: TokenAmount,
        ) -> RepoResult<Question> {
            let mut tx = self.pool.begin().await.map_err(internal)?;
            let exists = sqlx::query("SELECT 1 AS one FROM questions WHERE id = $1")
                .bind(new.id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(internal)?;
            if exists.is_some() {
                return Err(RepoError::Conflict);
            }
            let balance = balance_for_update(&mut tx, author_email).await?;
            let next = balance.checked_sub(reward).ok_or(RepoError::InsufficientFunds)?;
            set_balance(&mut tx, author_email, next).await?;
            sqlx::query("UPDATE users SET question_count = question_count + 1 WHERE email = $1")
                .bind(author_email)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
            let row = sqlx::query(
                r#"INSERT INTO questions (id, author, title, content, content_hash, reward, tags, status)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, 'open')
                   RETURNING *"#,
            )
            .bind(new.id)
            .bind(author_address.to_lowercase())
            .bind(&new.title)
            .bind(&new.content)
            .bind(&new.content_hash)
            .bind(reward.to_string())
            .bind(&new.tags)
            .fetch_one(&mut *tx)
            .await
            .map_err(internal)?;
            let question = question_from_row(&row)?;
            tx.commit().await.map_err(internal)?;
            Ok(question)
        }

        async fn accept_answer(&self, question_id: Id, answer_id: Id) -> RepoResult<AcceptOutcome> {
            let mut tx = self.pool.begin().await.map_err(internal)?;

            let answer_row =
                sqlx::query("SELECT * FROM answers WHERE id = $1 AND question_id = $2 FOR UPDATE")
                    .bind(answer_id)
                    .bind(question_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(internal)?
                    .ok_or(RepoError::NotFound)?;
            let answer = answer_from_row(&answer_row)?;

            let question_row = sqlx::query("SELECT * FROM questions WHERE id = $1 FOR UPDATE")
                .bind(question_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(internal)?
                .ok_or(RepoError::NotFound)?;
            let question = question_from_row(&question_row)?;
            if question.status == QuestionStatus::Solved || question.accepted_answer_id.is_some() {
                return Err(RepoError::AlreadyResolved);
            }

            sqlx::query("UPDATE answers SET is_accepted = TRUE WHERE id = $1")
                .bind(answer_id)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
            sqlx::query(
                "UPDATE questions SET status = 'solved', accepted_answer_id = $2 WHERE id = $1",
            )
            .bind(question_id)
            .bind(answer_id)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;

            let recipient = sqlx::query(
                "SELECT email, token_balance FROM users WHERE wallet_address = $1 FOR UPDATE",
            )
            .bind(&answer.author)
            .fetch_optional(&mut *tx)
            .await
            .map_err(internal)?;
            let reward_credited = match recipient {
                Some(row) => {
                    let email: String = row.try_get("email").map_err(internal)?;
                    let balance = amount_col(&row, "token_balance")?;
                    let next = balance
                        .checked_add(question.reward)
                        .ok_or_else(|| RepoError::Internal("balance overflow".into()))?;
                    sqlx::query(
                        r#"UPDATE users
                           SET token_balance = $2,
                               accepted_answer_count = accepted_answer_count + 1
                           WHERE email = $1"#,
                    )
                    .bind(&email)
                    .bind(next.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(internal)?;
                    true
                }
                None => false,
            };

            tx.commit().await.map_err(internal)?;

            let question = {
                let row = sqlx::query("SELECT * FROM questions WHERE id = $1")
                    .bind(question_id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(internal)?;
                question_from_row(&row)?
            };
            let answer = self.get_answer(answer_id).await?;
            Ok(AcceptOutcome { question, answer, reward_credited })
        }
    }

    #[async_trait]
    impl AnswerRepo for PgRepo {
        async fn list_answers(&self, question_id: Id) -> RepoResult<Vec<Answer>> {
            let exists = sqlx::query("SELECT 1 AS one FROM questions WHERE id = $1")
                .bind(question_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?;
            if exists.is_none() {
                return Err(RepoError::NotFound);
            }
            let rows = sqlx::query(
                "SELECT * FROM answers WHERE question_id = $1 ORDER BY created_at ASC",
            )
            .bind(question_id)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
            rows.iter().map(answer_from_row).collect()
        }

        async fn create_answer(&self, author_address: &str, new: NewAnswer) -> RepoResult<Answer> {
            let mut tx = self.pool.begin().await.map_err(internal)?;
            let exists = sqlx::query("SELECT 1 AS one FROM questions WHERE id = $1")
                .bind(new.question_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(internal)?;
            if exists.is_none() {
                return Err(RepoError::NotFound);
            }
            let author = author_address.to_lowercase();
            let row = sqlx::query(
                r#"INSERT INTO answers (question_id, author, content, content_hash)
                   VALUES ($1, $2, $3, $4)
                   RETURNING *"#,
            )
            .bind(new.question_id)
            .bind(&author)
            .bind(&new.content)
            .bind(&new.content_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(internal)?;
            sqlx::query("UPDATE users SET answer_count = answer_count + 1 WHERE wallet_address = $1")
                .bind(&author)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
            let answer = answer_from_row(&row)?;
            tx.commit().await.map_err(internal)?;
            Ok(answer)
        }

        async fn get_answer(&self, id: Id) -> RepoResult<Answer> {
            let row = sqlx::query("SELECT * FROM answers WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?
                .ok_or(RepoError::NotFound)?;
            answer_from_row(&row)
        }
    }

    #[async_trait]
    impl BookmarkRepo for PgRepo {
        async fn list_bookmarks(&self, user_address: &str) -> RepoResult<Vec<QuestionView>> {
            let sql = format!(
                r#"{QUESTION_VIEW_SELECT}
                   JOIN bookmarks b ON b.question_id = q.id
                   WHERE b.user_address = $1
                   ORDER BY b.created_at DESC"#
            );
            let rows = sqlx::query(&sql)
                .bind(user_address.to_lowercase())
                .fetch_all(&self.pool)
                .await
                .map_err(internal)?;
            rows.iter().map(question_view_from_row).collect()
        }

        async fn add_bookmark(&self, user_address: &str, question_id: Id) -> RepoResult<bool> {
            let exists = sqlx::query("SELECT 1 AS one FROM questions WHERE id = $1")
                .bind(question_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?;
            if exists.is_none() {
                return Err(RepoError::NotFound);
            }
            let inserted = sqlx::query(
                r#"INSERT INTO bookmarks (question_id, user_address)
                   VALUES ($1, $2)
                   ON CONFLICT (question_id, user_address) DO NOTHING"#,
            )
            .bind(question_id)
            .bind(user_address.to_lowercase())
            .execute(&self.pool)
            .await
            .map_err(internal)?;
            Ok(inserted.rows_affected() > 0)
        }

        async fn remove_bookmark(&self, user_address: &str, question_id: Id) -> RepoResult<()> {
            let deleted = sqlx::query(
                "DELETE FROM bookmarks WHERE question_id = $1 AND user_address = $2",
            )
            .bind(question_id)
            .bind(user_address.to_lowercase())
            .execute(&self.pool)
            .await
            .map_err(internal)?;
            if deleted.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl NotificationRepo for PgRepo {
        async fn push_notification(&self, new: NewNotification) -> RepoResult<Notification> {
            let row = sqlx::query(
                r#"INSERT INTO notifications (user_email, kind, title, message, question_id, tags)
                   VALUES ($1, $2, $3, $4, $5, $6)
                   RETURNING *"#,
            )
            .bind(&new.user_email)
            .bind(new.kind.as_str())
            .bind(&new.title)
            .bind(&new.message)
            .bind(new.question_id)
            .bind(&new.tags)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
            notification_from_row(&row)
        }

        async fn list_notifications(&self, user_email: &str) -> RepoResult<Vec<Notification>> {
            sqlx::query(
                "DELETE FROM notifications WHERE is_read AND created_at < now() - ($1 || ' days')::interval",
            )
            .bind(NOTIFICATION_TTL_DAYS.to_string())
            .execute(&self.pool)
            .await
            .map_err(internal)?;
            let rows = sqlx::query(
                "SELECT * FROM notifications WHERE user_email = $1 ORDER BY created_at DESC",
            )
            .bind(user_email)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
            rows.iter().map(notification_from_row).collect()
        }

        async fn mark_notification_read(&self, user_email: &str, id: Id) -> RepoResult<()> {
            let updated = sqlx::query(
                "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_email = $2",
            )
            .bind(id)
            .bind(user_email)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
            if updated.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }
    }

    fn notification_from_row(row: &PgRow) -> RepoResult<Notification> {
        let kind: String = row.try_get("kind").map_err(internal)?;
        Ok(Notification {
            id: row.try_get("id").map_err(internal)?,
            user_email: row.try_get("user_email").map_err(internal)?,
            kind: NotificationKind::parse(&kind)
                .ok_or_else(|| RepoError::Internal(format!("bad notification kind '{kind}'")))?,
            title: row.try_get("title").map_err(internal)?,
            message: row.try_get("message").map_err(internal)?,
            question_id: row.try_get("question_id").map_err(internal)?,
            tags: row.try_get("tags").map_err(internal)?,
            is_read: row.try_get("is_read").map_err(internal)?,
            created_at: row.try_get("created_at").map_err(internal)?,
        })
    }

    #[async_trait]
    impl ReceiptRepo for PgRepo {
        async fn find_receipt(&self, tx_hash: &str) -> RepoResult<Option<Receipt>> {
            let row = sqlx::query("SELECT * FROM receipts WHERE tx_hash = $1")
                .bind(tx_hash)
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?;
            row.as_ref().map(receipt_from_row).transpose()
        }

        async fn insert_receipt_if_absent(&self, receipt: Receipt) -> RepoResult<Receipt> {
            let core = serde_json::to_value(&receipt.core).map_err(internal)?;
            let inserted = sqlx::query(
                r#"INSERT INTO receipts
                       (id, tx_hash, question_id, answer_id, core, gas_used,
                        effective_gas_price, tags, explorer_url, signature, signer,
                        participants, created_at)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                   ON CONFLICT (tx_hash) DO NOTHING"#,
            )
            .bind(&receipt.id)
            .bind(&receipt.tx_hash)
            .bind(receipt.question_id)
            .bind(receipt.answer_id)
            .bind(core)
            .bind(&receipt.gas_used)
            .bind(&receipt.effective_gas_price)
            .bind(&receipt.tags)
            .bind(&receipt.explorer_url)
            .bind(&receipt.signature)
            .bind(&receipt.signer)
            .bind(&receipt.participants)
            .bind(receipt.created_at)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
            if inserted.rows_affected() > 0 {
                return Ok(receipt);
            }
            // Lost the race; the stored document wins.
            self.find_receipt(&receipt.tx_hash)
                .await?
                .ok_or_else(|| RepoError::Internal("receipt vanished after conflict".into()))
        }

        async fn list_receipts_for(&self, wallet: &str) -> RepoResult<Vec<Receipt>> {
            let rows = sqlx::query(
                "SELECT * FROM receipts WHERE $1 = ANY(participants) ORDER BY created_at DESC",
            )
            .bind(wallet.to_lowercase())
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
            rows.iter().map(receipt_from_row).collect()
        }
    }

    #[async_trait]
    impl LedgerRepo for PgRepo {
        async fn append_ledger_entry(
            &self,
            user_email: &str,
            kind: LedgerKind,
            eth_amount: TokenAmount,
            wak_amount: TokenAmount,
            tx_hash: Option<String>,
        ) -> RepoResult<LedgerEntry> {
            let mut tx = self.pool.begin().await.map_err(internal)?;
            let balance = balance_for_update(&mut tx, user_email).await?;
            let next = match kind {
                LedgerKind::Exchange => balance
                    .checked_add(wak_amount)
                    .ok_or_else(|| RepoError::Internal("balance overflow".into()))?,
                LedgerKind::Withdraw => {
                    balance.checked_sub(wak_amount).ok_or(RepoError::InsufficientFunds)?
                }
            };
            set_balance(&mut tx, user_email, next).await?;
            let row = sqlx::query(
                r#"INSERT INTO ledger_entries (user_email, kind, eth_amount, wak_amount, tx_hash)
                   VALUES ($1, $2, $3, $4, $5)
                   RETURNING *"#,
            )
            .bind(user_email)
            .bind(kind.as_str())
            .bind(eth_amount.to_string())
            .bind(wak_amount.to_string())
            .bind(&tx_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(internal)?;
            let entry = ledger_from_row(&row)?;
            tx.commit().await.map_err(internal)?;
            Ok(entry)
        }

        async fn list_ledger_entries(&self, user_email: &str) -> RepoResult<Vec<LedgerEntry>> {
            let rows = sqlx::query(
                "SELECT * FROM ledger_entries WHERE user_email = $1 ORDER BY created_at DESC",
            )
            .bind(user_email)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
            rows.iter().map(ledger_from_row).collect()
        }
    }

    #[async_trait]
    impl RankingRepo for PgRepo {
        async fn author_stats(&self, since: Option<DateTime<Utc>>) -> RepoResult<Vec<AuthorStats>> {
            let rows = sqlx::query(
                r#"SELECT author,
                          COUNT(*) AS answers,
                          COUNT(*) FILTER (WHERE is_accepted) AS accepted
                   FROM answers
                   WHERE $1::timestamptz IS NULL OR created_at >= $1
                   GROUP BY author"#,
            )
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
            rows.iter()
                .map(|row| {
                    Ok(AuthorStats {
                        author: row.try_get("author").map_err(internal)?,
                        answers: row.try_get("answers").map_err(internal)?,
                        accepted: row.try_get("accepted").map_err(internal)?,
                    })
                })
                .collect()
        }
    }
}
