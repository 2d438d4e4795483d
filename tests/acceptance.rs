#![cfg(feature = "inmem-store")]

use serial_test::serial;
use wakq::models::{NewAnswer, NewQuestion, NewUser, QuestionStatus, UpdateProfile};
use wakq::repo::inmem::InMemRepo;
use wakq::repo::{AnswerRepo, QuestionRepo, RepoError, UserRepo};
use wakq::token::{RewardUnit, TaggedAmount, TokenAmount, BASE_PER_WAK};

const ASKER: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const ANSWERER: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

fn repo() -> InMemRepo {
    std::env::set_var("WAKQ_DATA_DIR", tempfile::tempdir().unwrap().path());
    InMemRepo::new()
}

async fn seed_question(r: &InMemRepo, id: i64, reward_wak: u128) {
    r.create_user(NewUser {
        email: "asker@x.com".into(),
        user_name: "asker".into(),
        password_hash: "$argon2id$fake".into(),
    })
    .await
    .ok();
    r.update_profile(
        "asker@x.com",
        UpdateProfile { user_name: None, wallet_address: Some(ASKER.into()) },
    )
    .await
    .unwrap();
    r.credit_balance("asker@x.com", TokenAmount::from_base(reward_wak * BASE_PER_WAK))
        .await
        .unwrap();
    r.create_question(
        "asker@x.com",
        ASKER,
        NewQuestion {
            id,
            title: format!("q{id}"),
            content: "body".into(),
            content_hash: "0x1".into(),
            reward: TaggedAmount {
                amount: (reward_wak * BASE_PER_WAK).to_string(),
                unit: RewardUnit::Base,
            },
            tags: vec![],
        },
        TokenAmount::from_base(reward_wak * BASE_PER_WAK),
    )
    .await
    .unwrap();
}

async fn answer(r: &InMemRepo, question_id: i64, author: &str) -> i64 {
    r.create_answer(
        author,
        NewAnswer { question_id, content: "an answer".into(), content_hash: "0x2".into() },
    )
    .await
    .unwrap()
    .id
}

#[tokio::test]
#[serial]
async fn acceptance_is_all_or_nothing_and_terminal() {
    let r = repo();
    seed_question(&r, 1, 2).await;

    r.create_user(NewUser {
        email: "answerer@x.com".into(),
        user_name: "answerer".into(),
        password_hash: "$argon2id$fake".into(),
    })
    .await
    .unwrap();
    r.update_profile(
        "answerer@x.com",
        UpdateProfile { user_name: None, wallet_address: Some(ANSWERER.into()) },
    )
    .await
    .unwrap();

    let first = answer(&r, 1, ANSWERER).await;
    let second = answer(&r, 1, ANSWERER).await;

    let outcome = r.accept_answer(1, first).await.unwrap();
    assert!(outcome.reward_credited);
    assert!(outcome.answer.is_accepted);
    assert_eq!(outcome.question.status, QuestionStatus::Solved);
    assert_eq!(outcome.question.accepted_answer_id, Some(first));

    // Reward landed with the answerer along with the counter bump.
    let u = r.find_user_by_email("answerer@x.com").await.unwrap();
    assert_eq!(u.token_balance.base(), 2 * BASE_PER_WAK);
    assert_eq!(u.accepted_answer_count, 1);

    // Terminal state: neither answer can be accepted again.
    assert!(matches!(
        r.accept_answer(1, second).await.unwrap_err(),
        RepoError::AlreadyResolved
    ));
    assert!(matches!(
        r.accept_answer(1, first).await.unwrap_err(),
        RepoError::AlreadyResolved
    ));

    // At most one accepted answer, and is_accepted was never unset.
    let answers = r.list_answers(1).await.unwrap();
    assert_eq!(answers.iter().filter(|a| a.is_accepted).count(), 1);
    assert!(answers.iter().find(|a| a.id == first).unwrap().is_accepted);

    // No double credit happened.
    let u = r.find_user_by_email("answerer@x.com").await.unwrap();
    assert_eq!(u.token_balance.base(), 2 * BASE_PER_WAK);
}

#[tokio::test]
#[serial]
async fn accepting_unknown_or_mismatched_answers_fails() {
    let r = repo();
    seed_question(&r, 1, 1).await;
    seed_question(&r, 2, 1).await;
    let on_two = answer(&r, 2, ANSWERER).await;

    // Unknown answer id.
    assert!(matches!(r.accept_answer(1, 999).await.unwrap_err(), RepoError::NotFound));
    // Answer belongs to a different question.
    assert!(matches!(r.accept_answer(1, on_two).await.unwrap_err(), RepoError::NotFound));
    // Unknown question id.
    assert!(matches!(r.accept_answer(999, on_two).await.unwrap_err(), RepoError::NotFound));

    // Nothing about question 1 changed.
    let q = r.get_question(1).await.unwrap();
    assert_eq!(q.status, QuestionStatus::Open);
    assert_eq!(q.accepted_answer_id, None);
}

#[tokio::test]
#[serial]
async fn acceptance_without_recipient_account_still_commits() {
    let r = repo();
    seed_question(&r, 1, 3).await;
    // The answer author never registered.
    let orphan = answer(&r, 1, "0xcccccccccccccccccccccccccccccccccccccccc").await;

    let outcome = r.accept_answer(1, orphan).await.unwrap();
    assert!(!outcome.reward_credited);
    assert_eq!(outcome.question.status, QuestionStatus::Solved);
    assert!(outcome.answer.is_accepted);
}

#[tokio::test]
#[serial]
async fn solved_questions_still_take_new_answers() {
    let r = repo();
    seed_question(&r, 1, 1).await;
    let a = answer(&r, 1, ANSWERER).await;
    r.accept_answer(1, a).await.unwrap();

    // Acceptance is closed, posting is not.
    let late = answer(&r, 1, ANSWERER).await;
    assert!(matches!(
        r.accept_answer(1, late).await.unwrap_err(),
        RepoError::AlreadyResolved
    ));
    assert_eq!(r.get_question(1).await.unwrap().answer_count, 2);
}
