use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Favorite, ProductId};
use serde::Serialize;
use store::Store;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct FavoriteCheck {
    pub product_id: ProductId,
    pub is_favorite: bool,
}

/// GET /favorites
#[tracing::instrument(skip(state), fields(owner = %caller.owner))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<Vec<Favorite>>, ApiError> {
    Ok(Json(state.favorites.list(caller.owner).await?))
}

/// GET /favorites/{product_id}
#[tracing::instrument(skip(state), fields(owner = %caller.owner))]
pub async fn check<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(product_id): Path<i64>,
) -> Result<Json<FavoriteCheck>, ApiError> {
    let product_id = ProductId::new(product_id);
    let is_favorite = state.favorites.check(caller.owner, product_id).await?;
    Ok(Json(FavoriteCheck {
        product_id,
        is_favorite,
    }))
}

/// POST /favorites/{product_id}: 201 when added, 200 when already present.
#[tracing::instrument(skip(state), fields(owner = %caller.owner))]
pub async fn add<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(product_id): Path<i64>,
) -> Result<(StatusCode, Json<Favorite>), ApiError> {
    let (favorite, created) = state
        .favorites
        .add(caller.owner, ProductId::new(product_id))
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(favorite)))
}

/// DELETE /favorites/{product_id}
#[tracing::instrument(skip(state), fields(owner = %caller.owner))]
pub async fn remove<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(product_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .favorites
        .remove(caller.owner, ProductId::new(product_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
