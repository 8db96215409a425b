pub mod auth;
pub mod error;
pub mod extract;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod products;
pub mod state;
pub mod uploads;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, OriginalUri},
    middleware::from_fn_with_state,
    routing::{any, get, post},
};
use tower_http::services::ServeDir;

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

/// Every bookswap route, with the bearer-token check applied to the private ones.
/// CORS and request tracing are left to the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(|| async { "API is running..." }))
        .route("/health", get(|| async { Json(serde_json::json!({ "status": "ok" })) }))
        .route("/api/users", post(auth::register))
        .route("/api/users/login", post(auth::login))
        .route("/api/products", get(products::list_products))
        .route("/api/products/{id}", get(products::get_product))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/users/profile", get(auth::profile))
        .route("/api/users/notifications", get(notifications::list_notifications))
        .route("/api/users/notifications/read", post(notifications::mark_all_read))
        .route("/api/products", post(products::create_product))
        .route("/api/products/myproducts", get(products::my_products))
        .route("/api/products/matched", get(products::matched_products))
        .route("/api/products/{id}/request", post(products::request_product))
        .route("/api/products/{id}/match", post(products::match_product))
        .route("/api/products/{id}/messages", get(messages::get_messages))
        .route("/api/products/{id}/messages", post(messages::send_message))
        .route(
            "/api/upload",
            post(uploads::upload_image).layer(DefaultBodyLimit::max(uploads::MAX_UPLOAD_SIZE)),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state.clone());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service(
            uploads::UPLOADS_PREFIX,
            ServeDir::new(&state.upload_dir).not_found_service(any(not_found)),
        )
        .fallback(not_found)
}

async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::not_found(format!("Not Found - {}", uri))
}
