use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use bookswap_db::{MatchOutcome, RequestOutcome};
use bookswap_types::api::{Claims, CreateProductRequest, MatchRequest, ProductQuery, StatusMessage};
use bookswap_types::models::{Category, Product};

use crate::error::ApiError;
use crate::extract::{JsonBody, QueryParams, parse_product_id};
use crate::state::AppState;

/// GET /api/products?category= (public)
pub async fn list_products(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ProductQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let category = match query.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(code) => match code.parse::<Category>() {
            Ok(category) => Some(category),
            Err(e) => {
                // No listing can carry an unknown code.
                debug!("Product filter: {}", e);
                return Ok(Json(Vec::<Product>::new()));
            }
        },
    };

    let products = state.run_db(move |db| db.list_products(category)).await?;
    Ok(Json(products))
}

/// GET /api/products/myproducts
pub async fn my_products(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .run_db(move |db| db.list_products_by_seller(claims.id))
        .await?;
    Ok(Json(products))
}

/// GET /api/products/matched: listings the caller sold or was matched on.
pub async fn matched_products(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .run_db(move |db| db.list_matched_products(claims.id))
        .await?;
    Ok(Json(products))
}

/// GET /api/products/{id} (public)
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_product_id(&id)?;
    let product = state
        .run_db(move |db| db.get_product(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(Json(product))
}

/// POST /api/products
pub async fn create_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("Product name is required"));
    }
    let category = req
        .category
        .trim()
        .parse::<Category>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let seller = state
        .run_db(move |db| db.get_user_by_id(claims.id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let product = Product {
        id: Uuid::new_v4(),
        name,
        image: req.image,
        description: req.description,
        category,
        seller_id: seller.id,
        seller_name: seller.name,
        requesters: Vec::new(),
        is_sold: false,
        matched_user: None,
        created_at: Utc::now(),
    };

    let stored = product.clone();
    state.run_db(move |db| db.create_product(&stored)).await?;
    info!(
        "Product {} '{}' [{}] listed by {}",
        product.id, product.name, product.category, product.seller_id
    );

    Ok((StatusCode::CREATED, Json(product)))
}

/// POST /api/products/{id}/request
pub async fn request_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let product_id = parse_product_id(&id)?;
    let user_id = claims.id;

    let outcome = state
        .run_db(move |db| db.request_product(product_id, user_id, Utc::now()))
        .await?;

    match outcome {
        RequestOutcome::Added => {
            info!("User {} requested product {}", user_id, product_id);
            Ok(Json(StatusMessage::new("Request submitted")))
        }
        RequestOutcome::AlreadyRequested => Ok(Json(StatusMessage::new("Request submitted"))),
        RequestOutcome::NotFound => Err(ApiError::not_found("Product not found")),
        RequestOutcome::UnknownUser => Err(ApiError::not_found("User not found")),
        RequestOutcome::OwnListing => Err(ApiError::forbidden("You cannot request your own product")),
        RequestOutcome::AlreadyMatched => {
            Err(ApiError::forbidden("This product has already been matched"))
        }
    }
}

/// POST /api/products/{id}/match: seller picks one requester. One-way.
pub async fn match_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<MatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product_id = parse_product_id(&id)?;
    let seller_id = claims.id;
    let requester_id = req.requester_id;

    let outcome = state
        .run_db(move |db| db.match_product(product_id, seller_id, requester_id, Utc::now()))
        .await?;

    match outcome {
        MatchOutcome::Matched { product, .. } => {
            info!(
                "Product {} matched: seller {} -> requester {}",
                product.id, seller_id, requester_id
            );
            Ok(Json(StatusMessage::new("Match successful")))
        }
        MatchOutcome::NotFound => Err(ApiError::not_found("Product not found")),
        MatchOutcome::NotSeller => Err(ApiError::forbidden("You are not the seller of this product")),
        MatchOutcome::AlreadyMatched => {
            Err(ApiError::bad_request("This product has already been matched"))
        }
        MatchOutcome::NotARequester => Err(ApiError::bad_request("Requester not found in list")),
    }
}
