use std::sync::Arc;

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{
    create_session_jwt, hash_password, verify_password, Auth, SESSION_COOKIE, SESSION_DAYS,
};
use crate::chain::{ChainConfig, ReceiptSigner, SettlementSource};
use crate::error::ApiError;
use crate::models::*;
use crate::rate_limit::RateLimiterFacade;
use crate::ranking::{leaderboard, RankingRow, RankingWindow};
use crate::receipt::{generate_or_fetch, is_tx_hash, ReceiptRequest};
use crate::repo::{QuestionFilter, Repo};
use crate::token::TokenAmount;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::resource("/auth/signup").route(web::post().to(signup)),
            )
            .service(
                web::resource("/auth/signin").route(web::post().to(signin)),
            )
            .service(
                web::resource("/auth/signout").route(web::post().to(signout)),
            )
            .service(
                web::resource("/auth/session").route(web::get().to(session)),
            )
            .service(
                web::resource("/auth/user")
                    .route(web::get().to(get_user))
                    .route(web::put().to(update_user))
                    .route(web::delete().to(delete_user)),
            )
            .service(
                web::resource("/auth/token-balance").route(web::put().to(update_token_balance)),
            )
            .service(
                web::resource("/questions")
                    .route(web::get().to(list_questions))
                    .route(web::post().to(create_question)),
            )
            .service(web::resource("/questions/{id}").route(web::get().to(get_question)))
            .service(
                web::resource("/questions/{id}/answers").route(web::get().to(list_answers)),
            )
            .service(
                web::resource("/questions/{id}/accept").route(web::post().to(accept_answer)),
            )
            .service(web::resource("/answers").route(web::post().to(create_answer)))
            .service(
                web::resource("/bookmarks")
                    .route(web::get().to(list_bookmarks))
                    .route(web::post().to(add_bookmark)),
            )
            .service(
                web::resource("/bookmarks/{question_id}")
                    .route(web::delete().to(remove_bookmark)),
            )
            .service(
                web::resource("/notifications").route(web::get().to(list_notifications)),
            )
            .service(
                web::resource("/notifications/{id}/read")
                    .route(web::put().to(mark_notification_read)),
            )
            .service(web::resource("/receipt").route(web::get().to(get_receipt)))
            .service(
                web::resource("/receipts")
                    .route(web::get().to(list_receipts))
                    .route(web::post().to(create_receipt)),
            )
            .service(web::resource("/ranking/{period}").route(web::get().to(ranking)))
            .service(
                web::resource("/transactions")
                    .route(web::get().to(list_transactions))
                    .route(web::post().to(create_transaction)),
            ),
    );
    cfg.route("/healthz", web::get().to(healthz));
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub settlement: Arc<dyn SettlementSource>,
    pub signer: Option<Arc<ReceiptSigner>>,
    pub chain: ChainConfig,
    pub rate_limiter: Option<RateLimiterFacade>,
}

// ---------------- shared helpers ----------------------------------

async fn current_user(auth: &Auth, data: &AppState) -> Result<User, ApiError> {
    data.repo
        .find_user_by_email(&auth.0.sub)
        .await
        .map_err(|_| ApiError::Unauthorized)
}

fn require_wallet(user: &User) -> Result<String, ApiError> {
    user.wallet_address
        .clone()
        .ok_or_else(|| ApiError::BadRequest("wallet not connected".into()))
}

fn session_cookie(jwt: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, jwt)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::days(SESSION_DAYS))
        .finish()
}

fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish();
    cookie.make_removal();
    cookie
}

fn client_ip(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string()
}

fn is_wallet_address(s: &str) -> bool {
    s.len() == 42 && s.starts_with("0x") && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Sha-256 digest of the posted content, used when the client did not
/// pre-hash it in the browser.
fn content_digest(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("0x{:x}", hasher.finalize())
}

// ---------------- auth --------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub user_name: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created, session cookie set", body = UserProfile),
        (status = 400, description = "Missing or invalid fields"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    data: web::Data<AppState>,
    payload: web::Json<SignupRequest>,
) -> Result<HttpResponse, ApiError> {
    let p = payload.into_inner();
    if !p.email.contains('@') {
        return Err(ApiError::BadRequest("invalid email".into()));
    }
    if p.password.len() < 8 {
        return Err(ApiError::BadRequest("password must be at least 8 characters".into()));
    }
    if p.user_name.trim().is_empty() {
        return Err(ApiError::BadRequest("user_name is required".into()));
    }
    let password_hash = hash_password(&p.password).map_err(|e| {
        log::error!("password hashing failed: {e}");
        ApiError::Internal
    })?;
    let user = data
        .repo
        .create_user(NewUser {
            email: p.email.clone(),
            user_name: p.user_name.trim().to_string(),
            password_hash,
        })
        .await?;
    let jwt = create_session_jwt(&user.email).map_err(|_| ApiError::Internal)?;
    Ok(HttpResponse::Created()
        .cookie(session_cookie(jwt))
        .json(UserProfile::from(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in, session cookie set", body = UserProfile),
        (status = 401, description = "Unknown email or wrong password")
    )
)]
pub async fn signin(
    data: web::Data<AppState>,
    payload: web::Json<SigninRequest>,
) -> Result<HttpResponse, ApiError> {
    let p = payload.into_inner();
    let user = data
        .repo
        .find_user_by_email(&p.email)
        .await
        .map_err(|_| ApiError::Unauthorized)?;
    if !verify_password(&p.password, &user.password_hash) {
        return Err(ApiError::Unauthorized);
    }
    let jwt = create_session_jwt(&user.email).map_err(|_| ApiError::Internal)?;
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(jwt))
        .json(UserProfile::from(user)))
}

pub async fn signout() -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok()
        .cookie(clear_session_cookie())
        .json(serde_json::json!({"status": "ok"})))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/session",
    responses((status = 200, description = "Session state", body = SessionResponse))
)]
pub async fn session(
    auth: Option<Auth>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user = match auth {
        Some(auth) => data.repo.find_user_by_email(&auth.0.sub).await.ok(),
        None => None,
    };
    Ok(HttpResponse::Ok().json(SessionResponse {
        authenticated: user.is_some(),
        user: user.map(UserProfile::from),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/user",
    responses(
        (status = 200, description = "Current profile", body = UserProfile),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_user(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = current_user(&auth, &data).await?;
    Ok(HttpResponse::Ok().json(UserProfile::from(user)))
}

#[utoipa::path(
    put,
    path = "/api/v1/auth/user",
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = UserProfile),
        (status = 409, description = "Wallet already claimed by another account")
    )
)]
pub async fn update_user(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<UpdateProfile>,
) -> Result<HttpResponse, ApiError> {
    let upd = payload.into_inner();
    if let Some(ref wallet) = upd.wallet_address {
        if !is_wallet_address(wallet) {
            return Err(ApiError::BadRequest("invalid wallet address".into()));
        }
    }
    let user = data.repo.update_profile(&auth.0.sub, upd).await?;
    Ok(HttpResponse::Ok().json(UserProfile::from(user)))
}

pub async fn delete_user(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    data.repo.delete_account(&auth.0.sub).await?;
    Ok(HttpResponse::Ok()
        .cookie(clear_session_cookie())
        .json(serde_json::json!({"status": "deleted"})))
}

#[derive(Debug, Clone, Copy, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BalanceOp {
    Credit,
    Debit,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BalanceUpdateRequest {
    pub op: BalanceOp,
    pub amount: crate::token::TaggedAmount,
}

#[utoipa::path(
    put,
    path = "/api/v1/auth/token-balance",
    request_body = BalanceUpdateRequest,
    responses(
        (status = 200, description = "Balance updated", body = UserProfile),
        (status = 409, description = "Insufficient funds")
    )
)]
pub async fn update_token_balance(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<BalanceUpdateRequest>,
) -> Result<HttpResponse, ApiError> {
    let p = payload.into_inner();
    let amount = p
        .amount
        .normalize()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let user = match p.op {
        BalanceOp::Credit => data.repo.credit_balance(&auth.0.sub, amount).await?,
        BalanceOp::Debit => data.repo.debit_balance(&auth.0.sub, amount).await?,
    };
    Ok(HttpResponse::Ok().json(UserProfile::from(user)))
}

// ---------------- questions ---------------------------------------

#[derive(Debug, Deserialize)]
pub struct QuestionsQuery {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub status: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/questions",
    params(
        ("tag" = Option<String>, Query, description = "Filter by tag"),
        ("author" = Option<String>, Query, description = "Filter by author wallet address"),
        ("status" = Option<String>, Query, description = "open | solved")
    ),
    responses((status = 200, description = "List questions", body = [QuestionView]))
)]
pub async fn list_questions(
    data: web::Data<AppState>,
    query: web::Query<QuestionsQuery>,
) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    let status = match q.status.as_deref() {
        None => None,
        Some(raw) => Some(
            QuestionStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status '{raw}'")))?,
        ),
    };
    let filter = QuestionFilter { tag: q.tag, author: q.author, status };
    let questions = data.repo.list_questions(filter).await?;
    Ok(HttpResponse::Ok().json(questions))
}

#[utoipa::path(
    post,
    path = "/api/v1/questions",
    request_body = NewQuestion,
    responses(
        (status = 201, description = "Question created, reward escrowed from balance", body = Question),
        (status = 400, description = "Missing fields or wallet not connected"),
        (status = 409, description = "Duplicate id or insufficient funds")
    )
)]
pub async fn create_question(
    req: HttpRequest,
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewQuestion>,
) -> Result<HttpResponse, ApiError> {
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_question(&client_ip(&req)) {
            return Err(ApiError::RateLimited);
        }
    }
    let mut new = payload.into_inner();
    if new.id <= 0 {
        return Err(ApiError::BadRequest("id must be a positive contract id".into()));
    }
    if new.title.trim().is_empty() || new.content.trim().is_empty() {
        return Err(ApiError::BadRequest("title and content are required".into()));
    }
    if new.content_hash.trim().is_empty() {
        new.content_hash = content_digest(&new.content);
    }
    let reward = new
        .reward
        .normalize()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let user = current_user(&auth, &data).await?;
    let wallet = require_wallet(&user)?;
    let question = data
        .repo
        .create_question(&user.email, &wallet, new, reward)
        .await?;
    Ok(HttpResponse::Created().json(question))
}

#[utoipa::path(
    get,
    path = "/api/v1/questions/{id}",
    params(("id" = Id, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question with live answer count", body = QuestionView),
        (status = 404, description = "Question not found")
    )
)]
pub async fn get_question(
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let question = data.repo.get_question(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(question))
}

#[utoipa::path(
    get,
    path = "/api/v1/questions/{id}/answers",
    params(("id" = Id, Path, description = "Question id")),
    responses(
        (status = 200, description = "Answers, oldest first", body = [Answer]),
        (status = 404, description = "Question not found")
    )
)]
pub async fn list_answers(
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let answers = data.repo.list_answers(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(answers))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AcceptRequest {
    pub answer_id: Id,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AcceptResponse {
    pub question_id: Id,
    pub answer_id: Id,
    /// False when the answer author has no account to credit.
    pub reward_credited: bool,
}

#[utoipa::path(
    post,
    path = "/api/v1/questions/{id}/accept",
    request_body = AcceptRequest,
    params(("id" = Id, Path, description = "Question id")),
    responses(
        (status = 200, description = "Answer accepted, reward released", body = AcceptResponse),
        (status = 403, description = "Caller is not the question author"),
        (status = 404, description = "Question or answer not found"),
        (status = 409, description = "Question already resolved")
    )
)]
pub async fn accept_answer(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<AcceptRequest>,
) -> Result<HttpResponse, ApiError> {
    let question_id = path.into_inner();
    let answer_id = payload.answer_id;
    let user = current_user(&auth, &data).await?;
    let wallet = require_wallet(&user)?;

    let question = data.repo.get_question(question_id).await?;
    if question.author != wallet {
        return Err(ApiError::Forbidden);
    }

    let outcome = data.repo.accept_answer(question_id, answer_id).await?;
    if !outcome.reward_credited {
        log::warn!(
            "accepted answer {} on question {} but author {} has no account; reward not credited",
            answer_id,
            question_id,
            outcome.answer.author
        );
    }

    // Best-effort: tell the answerer their answer was accepted.
    if let Ok(recipient) = data.repo.find_user_by_wallet(&outcome.answer.author).await {
        let note = NewNotification {
            user_email: recipient.email,
            kind: NotificationKind::AnswerAccepted,
            title: outcome.question.title.clone(),
            message: format!(
                "Your answer was accepted. {} WAK released from escrow.",
                outcome.question.reward.whole_string()
            ),
            question_id: Some(question_id),
            tags: outcome.question.tags.clone(),
        };
        if let Err(e) = data.repo.push_notification(note).await {
            log::warn!("failed to push acceptance notification: {e}");
        }
    }

    Ok(HttpResponse::Ok().json(AcceptResponse {
        question_id,
        answer_id,
        reward_credited: outcome.reward_credited,
    }))
}

// ---------------- answers -----------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/answers",
    request_body = NewAnswer,
    responses(
        (status = 201, description = "Answer created", body = Answer),
        (status = 400, description = "Missing fields or wallet not connected"),
        (status = 404, description = "Question not found")
    )
)]
pub async fn create_answer(
    req: HttpRequest,
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewAnswer>,
) -> Result<HttpResponse, ApiError> {
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_answer(&client_ip(&req)) {
            return Err(ApiError::RateLimited);
        }
    }
    let mut new = payload.into_inner();
    if new.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content is required".into()));
    }
    if new.content_hash.trim().is_empty() {
        new.content_hash = content_digest(&new.content);
    }
    let user = current_user(&auth, &data).await?;
    let wallet = require_wallet(&user)?;
    let question = data.repo.get_question(new.question_id).await?;
    let answer = data.repo.create_answer(&wallet, new).await?;

    // Best-effort: tell the asker someone answered.
    if let Ok(asker) = data.repo.find_user_by_wallet(&question.author).await {
        let note = NewNotification {
            user_email: asker.email,
            kind: NotificationKind::NewAnswer,
            title: question.title.clone(),
            message: format!("{} posted a new answer to your question.", user.user_name),
            question_id: Some(question.id),
            tags: question.tags.clone(),
        };
        if let Err(e) = data.repo.push_notification(note).await {
            log::warn!("failed to push answer notification: {e}");
        }
    }

    Ok(HttpResponse::Created().json(answer))
}

// ---------------- bookmarks ---------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BookmarkRequest {
    pub question_id: Id,
}

#[utoipa::path(
    get,
    path = "/api/v1/bookmarks",
    responses((status = 200, description = "Bookmarked questions, newest first", body = [QuestionView]))
)]
pub async fn list_bookmarks(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = current_user(&auth, &data).await?;
    let wallet = require_wallet(&user)?;
    let questions = data.repo.list_bookmarks(&wallet).await?;
    Ok(HttpResponse::Ok().json(questions))
}

#[utoipa::path(
    post,
    path = "/api/v1/bookmarks",
    request_body = BookmarkRequest,
    responses(
        (status = 201, description = "Bookmark stored"),
        (status = 200, description = "Already bookmarked (idempotent)"),
        (status = 404, description = "Question not found")
    )
)]
pub async fn add_bookmark(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<BookmarkRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&auth, &data).await?;
    let wallet = require_wallet(&user)?;
    let inserted = data.repo.add_bookmark(&wallet, payload.question_id).await?;
    let body = serde_json::json!({"status": "ok", "duplicate": !inserted});
    if inserted {
        Ok(HttpResponse::Created().json(body))
    } else {
        Ok(HttpResponse::Ok().json(body))
    }
}

pub async fn remove_bookmark(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let user = current_user(&auth, &data).await?;
    let wallet = require_wallet(&user)?;
    data.repo.remove_bookmark(&wallet, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- notifications -----------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    responses((status = 200, description = "Own notifications, newest first", body = [Notification]))
)]
pub async fn list_notifications(
    auth: Auth,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let notifications = data.repo.list_notifications(&auth.0.sub).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

pub async fn mark_notification_read(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    data.repo
        .mark_notification_read(&auth.0.sub, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "ok"})))
}

// ---------------- receipts ----------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReceiptQuery {
    pub tx_hash: String,
    pub question_id: Option<Id>,
    pub answer_id: Option<Id>,
}

#[utoipa::path(
    get,
    path = "/api/v1/receipt",
    params(
        ("tx_hash" = String, Query, description = "Settlement transaction hash"),
        ("question_id" = Option<Id>, Query, description = "Fallback question id"),
        ("answer_id" = Option<Id>, Query, description = "Fallback answer id")
    ),
    responses(
        (status = 200, description = "Receipt (fetched or freshly reconciled)", body = Receipt),
        (status = 400, description = "Malformed tx hash")
    )
)]
pub async fn get_receipt(
    data: web::Data<AppState>,
    query: web::Query<ReceiptQuery>,
) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    if !is_tx_hash(&q.tx_hash) {
        return Err(ApiError::BadRequest("malformed tx_hash".into()));
    }
    let receipt = generate_or_fetch(
        data.repo.as_ref(),
        data.settlement.as_ref(),
        data.signer.as_deref(),
        &data.chain,
        ReceiptRequest {
            tx_hash: q.tx_hash,
            question_id: q.question_id,
            answer_id: q.answer_id,
        },
    )
    .await?;
    Ok(HttpResponse::Ok().json(receipt))
}

#[utoipa::path(
    post,
    path = "/api/v1/receipts",
    request_body = ReceiptRequest,
    responses(
        (status = 201, description = "Receipt reconciled and stored", body = Receipt),
        (status = 200, description = "Receipt already existed", body = Receipt),
        (status = 400, description = "Malformed tx hash")
    )
)]
pub async fn create_receipt(
    data: web::Data<AppState>,
    payload: web::Json<ReceiptRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    if !is_tx_hash(&req.tx_hash) {
        return Err(ApiError::BadRequest("malformed tx_hash".into()));
    }
    let existed = data.repo.find_receipt(&req.tx_hash).await?.is_some();
    let receipt = generate_or_fetch(
        data.repo.as_ref(),
        data.settlement.as_ref(),
        data.signer.as_deref(),
        &data.chain,
        req,
    )
    .await?;
    if existed {
        Ok(HttpResponse::Ok().json(receipt))
    } else {
        Ok(HttpResponse::Created().json(receipt))
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/receipts",
    responses(
        (status = 200, description = "Receipts the caller participated in", body = [Receipt]),
        (status = 400, description = "Wallet not connected")
    )
)]
pub async fn list_receipts(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = current_user(&auth, &data).await?;
    let wallet = require_wallet(&user)?;
    let receipts = data.repo.list_receipts_for(&wallet).await?;
    Ok(HttpResponse::Ok().json(receipts))
}

// ---------------- ranking -----------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/ranking/{period}",
    params(("period" = String, Path, description = "weekly | monthly | overall")),
    responses(
        (status = 200, description = "Leaderboard", body = [RankingRow]),
        (status = 400, description = "Unknown period")
    )
)]
pub async fn ranking(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let period = path.into_inner();
    let window = RankingWindow::parse(&period)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown period '{period}'")))?;
    let stats = data
        .repo
        .author_stats(window.start(chrono::Utc::now()))
        .await?;
    let mut rows = leaderboard(stats, window.top_n());
    for row in &mut rows {
        if let Ok(user) = data.repo.find_user_by_wallet(&row.author).await {
            row.user_name = Some(user.user_name);
        }
    }
    Ok(HttpResponse::Ok().json(rows))
}

// ---------------- ledger ------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    request_body = NewLedgerEntry,
    responses(
        (status = 201, description = "Ledger entry appended, balance applied", body = LedgerEntry),
        (status = 409, description = "Insufficient funds for withdrawal")
    )
)]
pub async fn create_transaction(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewLedgerEntry>,
) -> Result<HttpResponse, ApiError> {
    let new = payload.into_inner();
    if let Some(ref hash) = new.tx_hash {
        if !is_tx_hash(hash) {
            return Err(ApiError::BadRequest("malformed tx_hash".into()));
        }
    }
    let eth: TokenAmount = new
        .eth_amount
        .normalize()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let wak: TokenAmount = new
        .wak_amount
        .normalize()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let user = current_user(&auth, &data).await?;
    let entry = data
        .repo
        .append_ledger_entry(&user.email, new.kind, eth, wak, new.tx_hash)
        .await?;
    Ok(HttpResponse::Created().json(entry))
}

#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    responses((status = 200, description = "Own ledger entries, newest first", body = [LedgerEntry]))
)]
pub async fn list_transactions(
    auth: Auth,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let entries = data.repo.list_ledger_entries(&auth.0.sub).await?;
    Ok(HttpResponse::Ok().json(entries))
}

// ------------------------------------------------------------------

pub async fn healthz() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}
