mod config;

use axum::http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use rand::Rng;
use rand::distr::Alphanumeric;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use bookswap_api::AppStateInner;
use bookswap_api::auth::hash_password;
use bookswap_db::Database;
use bookswap_db::seed::{DEMO_SELLER_EMAIL, seed_demo};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookswap=debug,bookswap_api=debug,bookswap_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.using_dev_secret {
        warn!("BOOKSWAP_JWT_SECRET is unset; signing tokens with the development secret");
    }
    bookswap_api::error::expose_internal_details(!config.is_production());

    // Init database
    let db = Database::open(&config.db_path)?;
    if config.db_path.as_os_str() == bookswap_db::IN_MEMORY {
        warn!("Using an in-memory database: all data is lost on restart");
    }

    if config.seed_demo {
        let password: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        let new_seller = db.get_user_by_email(DEMO_SELLER_EMAIL)?.is_none();
        let created = seed_demo(&db, &hash_password(&password)?)?;
        if created > 0 && new_seller {
            info!("Demo seller login: {} / {}", DEMO_SELLER_EMAIL, password);
        }
    }

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    info!("Serving uploads from {}", config.upload_dir.display());

    let state = AppStateInner::new(db, config.jwt_secret.clone(), config.upload_dir.clone());

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let app = bookswap_api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("Bookswap server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
