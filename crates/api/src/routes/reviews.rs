//! Product reviews.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ProductId, Review, ReviewId};
use serde::Deserialize;
use store::Store;

use crate::auth::Caller;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

/// GET /products/{id}/reviews
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<i64>,
) -> Result<Json<Vec<Review>>, ApiError> {
    Ok(Json(state.reviews.list(ProductId::new(product_id)).await?))
}

/// POST /products/{id}/reviews: 201 for a new review, 200 when replacing one.
#[tracing::instrument(skip(state, body), fields(owner = %caller.owner))]
pub async fn upsert<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(product_id): Path<i64>,
    ApiJson(body): ApiJson<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let saved = state
        .reviews
        .upsert(
            caller.owner,
            ProductId::new(product_id),
            body.rating,
            body.comment,
        )
        .await?;
    let status = if saved.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(saved.review)))
}

/// DELETE /reviews/{id}
#[tracing::instrument(skip(state), fields(owner = %caller.owner))]
pub async fn delete<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(review_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .reviews
        .delete(caller.owner, ReviewId::new(review_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
