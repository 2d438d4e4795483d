use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod chain;
mod error;
mod models;
mod openapi;
mod ranking;
mod rate_limit;
mod receipt;
mod repo;
mod routes;
mod security;
mod token;

use chain::{ChainConfig, ReceiptSigner, RpcSettlementSource, SettlementSource};
use openapi::ApiDoc;
use rate_limit::{InMemoryRateLimiter, RateLimitConfig, RateLimiterFacade};
use routes::{config, AppState};
use security::SecurityHeaders;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Environment variables must be set externally (shell, systemd, Docker, etc.)
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    validate_env_vars();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping wakq server");

    let chain_cfg = ChainConfig::from_env();
    info!(
        "Chain: network={} chain_id={} escrow={}",
        chain_cfg.network, chain_cfg.chain_id, chain_cfg.escrow_address
    );
    info!(
        "Platform receipt signing configured: {}",
        std::env::var("WAKQ_PLATFORM_KEY").is_ok()
    );

    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    let repo = repo::inmem::InMemRepo::new();
    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    info!("Using in-memory repository backend");

    #[cfg(feature = "postgres-store")]
    let repo = {
        use sqlx::postgres::PgPoolOptions;
        let db_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres-store");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(&db_url)
            .expect("Failed to create Pg pool");
        info!("Using Postgres repository backend");
        repo::pg::PgRepo::new(pool)
    };

    let settlement: Arc<dyn SettlementSource> =
        match RpcSettlementSource::new(&chain_cfg.rpc_url, &chain_cfg.escrow_address) {
            Ok(source) => Arc::new(source),
            Err(e) => {
                eprintln!("Failed to initialize RPC settlement source: {e}");
                std::process::exit(1);
            }
        };

    let signer = match std::env::var("WAKQ_PLATFORM_KEY") {
        Ok(key) => match ReceiptSigner::from_key(&key) {
            Ok(s) => {
                info!("Receipt signer address: {}", s.address());
                Some(Arc::new(s))
            }
            Err(e) => {
                eprintln!("WAKQ_PLATFORM_KEY is set but invalid: {e}");
                std::process::exit(1);
            }
        },
        Err(_) => None,
    };

    let rate_limiter = {
        let enabled = std::env::var("RL_ENABLED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);
        Some(RateLimiterFacade::new(
            InMemoryRateLimiter::new(enabled),
            RateLimitConfig::from_env(),
        ))
    };

    let openapi = ApiDoc::openapi();
    info!("OpenAPI spec generated");

    let state = AppState {
        repo: Arc::new(repo),
        settlement,
        signer,
        chain: chain_cfg,
        rate_limiter,
    };

    let server = HttpServer::new(move || {
        let cors = {
            let mut c = Cors::default()
                // local Next.js dev server defaults
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allow_any_header()
                .allowed_methods(["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
                .supports_credentials()
                .max_age(3600);
            if let Ok(front) = std::env::var("FRONTEND_URL") {
                c = c.allowed_origin(&front);
            }
            c
        };

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::from_env())
            .wrap(cors)
            .configure(config)
            .service(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi.clone()))
            .app_data(web::Data::new(state.clone()))
    })
    .bind(("0.0.0.0", 8080))?;

    info!("Listening on http://0.0.0.0:8080 (all interfaces)");

    server.run().await
}

/// Validate that required environment variables are set
fn validate_env_vars() {
    use std::env;

    let required = vec!["JWT_SECRET"];

    let mut missing = Vec::new();
    for var in required {
        if env::var(var).is_err() {
            missing.push(var);
        }
    }

    if !missing.is_empty() {
        eprintln!("Missing required environment variables: {:?}", missing);
        eprintln!("Please copy .env.example to .env and configure it");
        std::process::exit(1);
    }

    if let Ok(secret) = env::var("JWT_SECRET") {
        if secret.len() < 32 {
            eprintln!("JWT_SECRET must be at least 32 characters long for security");
            std::process::exit(1);
        }
    }

    if env::var("WAKQ_RPC_URL").is_err() {
        eprintln!("Warning: WAKQ_RPC_URL not set; receipts will degrade to off-chain defaults");
    }
}
