use crate::models::{
    Answer, LedgerEntry, LedgerKind, NewAnswer, NewLedgerEntry, NewQuestion, Notification,
    NotificationKind, Question, QuestionStatus, QuestionView, Receipt, UpdateProfile, UserProfile,
};
use crate::ranking::{RankingRow, RankingWindow};
use crate::receipt::{ReceiptCore, ReceiptRequest};
use crate::token::{RewardUnit, TaggedAmount, TokenAmount};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::signup,
        crate::routes::signin,
        crate::routes::session,
        crate::routes::get_user,
        crate::routes::update_user,
        crate::routes::update_token_balance,
        crate::routes::list_questions,
        crate::routes::create_question,
        crate::routes::get_question,
        crate::routes::list_answers,
        crate::routes::create_answer,
        crate::routes::accept_answer,
        crate::routes::list_bookmarks,
        crate::routes::add_bookmark,
        crate::routes::list_notifications,
        crate::routes::get_receipt,
        crate::routes::create_receipt,
        crate::routes::list_receipts,
        crate::routes::ranking,
        crate::routes::create_transaction,
        crate::routes::list_transactions,
    ),
    components(schemas(
        Question, QuestionView, NewQuestion, QuestionStatus,
        Answer, NewAnswer,
        UserProfile, UpdateProfile,
        Notification, NotificationKind,
        LedgerEntry, NewLedgerEntry, LedgerKind,
        Receipt, ReceiptCore, ReceiptRequest,
        RankingRow, RankingWindow,
        TokenAmount, TaggedAmount, RewardUnit,
        crate::routes::SignupRequest, crate::routes::SigninRequest,
        crate::routes::SessionResponse, crate::routes::BalanceUpdateRequest,
        crate::routes::BalanceOp, crate::routes::BookmarkRequest,
        crate::routes::AcceptRequest, crate::routes::AcceptResponse,
    )),
    tags(
        (name = "auth", description = "Accounts and sessions"),
        (name = "questions", description = "Question operations"),
        (name = "answers", description = "Answer operations"),
        (name = "receipts", description = "Settlement receipts"),
    )
)]
pub struct ApiDoc;
