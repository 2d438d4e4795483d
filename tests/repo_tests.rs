#![cfg(feature = "inmem-store")]

use serial_test::serial;
use wakq::models::{NewAnswer, NewQuestion, NewUser, UpdateProfile};
use wakq::repo::inmem::InMemRepo;
use wakq::repo::{
    AnswerRepo, BookmarkRepo, LedgerRepo, NotificationRepo, QuestionRepo, RepoError, UserRepo,
};
use wakq::token::{RewardUnit, TaggedAmount, TokenAmount, BASE_PER_WAK};

/// Helper that returns a fresh, empty repository for every test run.
fn repo() -> InMemRepo {
    // isolate state: do **not** persist to the default file path
    std::env::set_var("WAKQ_DATA_DIR", tempfile::tempdir().unwrap().path());
    InMemRepo::new()
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.into(),
        user_name: email.split('@').next().unwrap_or("user").into(),
        password_hash: "$argon2id$fake".into(),
    }
}

fn new_question(id: i64) -> NewQuestion {
    NewQuestion {
        id,
        title: format!("question {id}"),
        content: "body".into(),
        content_hash: "0xhash".into(),
        reward: TaggedAmount { amount: "1".into(), unit: RewardUnit::Whole },
        tags: vec!["rust".into()],
    }
}

const WALLET: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

async fn wallet_user(r: &InMemRepo, email: &str, wallet: &str) {
    r.create_user(new_user(email)).await.unwrap();
    r.update_profile(
        email,
        UpdateProfile { user_name: None, wallet_address: Some(wallet.into()) },
    )
    .await
    .unwrap();
}

#[tokio::test]
#[serial]
async fn duplicate_email_conflicts() {
    let r = repo();
    r.create_user(new_user("a@x.com")).await.unwrap();
    let err = r.create_user(new_user("a@x.com")).await.unwrap_err();
    assert!(matches!(err, RepoError::Conflict));
}

#[tokio::test]
#[serial]
async fn wallet_is_unique_and_lowercased() {
    let r = repo();
    r.create_user(new_user("a@x.com")).await.unwrap();
    r.create_user(new_user("b@x.com")).await.unwrap();

    let u = r
        .update_profile(
            "a@x.com",
            UpdateProfile {
                user_name: None,
                wallet_address: Some("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(u.wallet_address.as_deref(), Some(WALLET));

    let err = r
        .update_profile(
            "b@x.com",
            UpdateProfile { user_name: None, wallet_address: Some(WALLET.into()) },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict));

    // Lookup works case-insensitively through lowercasing.
    let found = r.find_user_by_wallet(&WALLET.to_uppercase().replace("0X", "0x")).await;
    assert!(found.is_ok());
}

#[tokio::test]
#[serial]
async fn question_creation_debits_exactly_the_reward() {
    let r = repo();
    wallet_user(&r, "a@x.com", WALLET).await;
    r.credit_balance("a@x.com", TokenAmount::from_base(10 * BASE_PER_WAK))
        .await
        .unwrap();

    let q = r
        .create_question(
            "a@x.com",
            WALLET,
            new_question(1),
            TokenAmount::from_base(2 * BASE_PER_WAK),
        )
        .await
        .unwrap();
    assert_eq!(q.reward.base(), 2 * BASE_PER_WAK);

    let u = r.find_user_by_email("a@x.com").await.unwrap();
    assert_eq!(u.token_balance.base(), 8 * BASE_PER_WAK);
    assert_eq!(u.question_count, 1);

    // Not enough left for a 100-WAK question; nothing is written.
    let err = r
        .create_question(
            "a@x.com",
            WALLET,
            new_question(2),
            TokenAmount::from_base(100 * BASE_PER_WAK),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::InsufficientFunds));
    let u = r.find_user_by_email("a@x.com").await.unwrap();
    assert_eq!(u.token_balance.base(), 8 * BASE_PER_WAK);
    assert_eq!(u.question_count, 1);
    assert!(r.get_question(2).await.is_err());
}

#[tokio::test]
#[serial]
async fn duplicate_question_id_conflicts() {
    let r = repo();
    wallet_user(&r, "a@x.com", WALLET).await;
    r.credit_balance("a@x.com", TokenAmount::from_base(10 * BASE_PER_WAK))
        .await
        .unwrap();
    r.create_question("a@x.com", WALLET, new_question(1), TokenAmount::ZERO)
        .await
        .unwrap();
    let err = r
        .create_question("a@x.com", WALLET, new_question(1), TokenAmount::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict));
}

#[tokio::test]
#[serial]
async fn answer_count_is_live() {
    let r = repo();
    wallet_user(&r, "a@x.com", WALLET).await;
    r.create_question("a@x.com", WALLET, new_question(1), TokenAmount::ZERO)
        .await
        .unwrap();

    assert_eq!(r.get_question(1).await.unwrap().answer_count, 0);
    for i in 0..3 {
        r.create_answer(
            "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
            NewAnswer {
                question_id: 1,
                content: format!("answer {i}"),
                content_hash: "0x2".into(),
            },
        )
        .await
        .unwrap();
    }
    assert_eq!(r.get_question(1).await.unwrap().answer_count, 3);
    assert_eq!(r.list_answers(1).await.unwrap().len(), 3);
}

#[tokio::test]
#[serial]
async fn answers_to_missing_questions_are_rejected() {
    let r = repo();
    let err = r
        .create_answer(
            WALLET,
            NewAnswer { question_id: 999, content: "hi".into(), content_hash: "0x".into() },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound));
    assert!(matches!(r.list_answers(999).await.unwrap_err(), RepoError::NotFound));
}

#[tokio::test]
#[serial]
async fn debit_never_clamps() {
    let r = repo();
    r.create_user(new_user("a@x.com")).await.unwrap();
    r.credit_balance("a@x.com", TokenAmount::from_base(BASE_PER_WAK))
        .await
        .unwrap();
    let err = r
        .debit_balance("a@x.com", TokenAmount::from_base(2 * BASE_PER_WAK))
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::InsufficientFunds));
    // Balance untouched by the failed debit.
    let u = r.find_user_by_email("a@x.com").await.unwrap();
    assert_eq!(u.token_balance.base(), BASE_PER_WAK);
}

#[tokio::test]
#[serial]
async fn delete_account_keeps_questions_and_answers() {
    let r = repo();
    wallet_user(&r, "a@x.com", WALLET).await;
    r.credit_balance("a@x.com", TokenAmount::from_base(5 * BASE_PER_WAK))
        .await
        .unwrap();
    r.create_question("a@x.com", WALLET, new_question(1), TokenAmount::ZERO)
        .await
        .unwrap();
    r.create_answer(
        WALLET,
        NewAnswer { question_id: 1, content: "self-answer".into(), content_hash: "0x".into() },
    )
    .await
    .unwrap();
    r.append_ledger_entry(
        "a@x.com",
        wakq::models::LedgerKind::Exchange,
        TokenAmount::ZERO,
        TokenAmount::from_base(BASE_PER_WAK),
        None,
    )
    .await
    .unwrap();

    r.delete_account("a@x.com").await.unwrap();

    assert!(matches!(
        r.find_user_by_email("a@x.com").await.unwrap_err(),
        RepoError::NotFound
    ));
    assert!(r.list_ledger_entries("a@x.com").await.unwrap().is_empty());
    // Content survives.
    assert!(r.get_question(1).await.is_ok());
    assert_eq!(r.list_answers(1).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn bookmark_pair_is_unique() {
    let r = repo();
    wallet_user(&r, "a@x.com", WALLET).await;
    r.create_question("a@x.com", WALLET, new_question(1), TokenAmount::ZERO)
        .await
        .unwrap();

    assert!(r.add_bookmark(WALLET, 1).await.unwrap());
    assert!(!r.add_bookmark(WALLET, 1).await.unwrap());
    assert_eq!(r.list_bookmarks(WALLET).await.unwrap().len(), 1);

    r.remove_bookmark(WALLET, 1).await.unwrap();
    assert!(matches!(
        r.remove_bookmark(WALLET, 1).await.unwrap_err(),
        RepoError::NotFound
    ));
}

#[tokio::test]
#[serial]
async fn read_notifications_expire_after_seven_days() {
    // Seed a snapshot with one stale read notification and one stale unread.
    let dir = tempfile::tempdir().unwrap();
    let snapshot = serde_json::json!({
        "users": {},
        "questions": {},
        "answers": {},
        "bookmarks": [],
        "notifications": {
            "1": {
                "id": 1, "user_email": "a@x.com", "kind": "new_answer",
                "title": "old read", "message": "m", "question_id": null,
                "tags": [], "is_read": true, "created_at": "2020-01-01T00:00:00Z"
            },
            "2": {
                "id": 2, "user_email": "a@x.com", "kind": "new_answer",
                "title": "old unread", "message": "m", "question_id": null,
                "tags": [], "is_read": false, "created_at": "2020-01-01T00:00:00Z"
            }
        },
        "receipts": {},
        "ledger": {},
        "next_id": 2
    });
    std::fs::write(
        dir.path().join("state.json"),
        serde_json::to_vec_pretty(&snapshot).unwrap(),
    )
    .unwrap();
    std::env::set_var("WAKQ_DATA_DIR", dir.path());
    let r = InMemRepo::new();

    let notes = r.list_notifications("a@x.com").await.unwrap();
    // Read + expired is purged; unread stays regardless of age.
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "old unread");
}

#[tokio::test]
#[serial]
async fn mark_read_is_scoped_to_the_owner() {
    let r = repo();
    let note = r
        .push_notification(wakq::models::NewNotification {
            user_email: "a@x.com".into(),
            kind: wakq::models::NotificationKind::NewAnswer,
            title: "t".into(),
            message: "m".into(),
            question_id: None,
            tags: vec![],
        })
        .await
        .unwrap();

    assert!(matches!(
        r.mark_notification_read("b@x.com", note.id).await.unwrap_err(),
        RepoError::NotFound
    ));
    r.mark_notification_read("a@x.com", note.id).await.unwrap();
    let notes = r.list_notifications("a@x.com").await.unwrap();
    assert!(notes[0].is_read);
}
