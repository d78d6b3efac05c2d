//! The caller's shopping cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::{CartLine, CartLineId, Money, ProductId};
use domain::{CartSummary, QuantityUpdate};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::auth::Caller;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

// -- Request types --

fn one() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: i64,
    #[serde(default = "one")]
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartLineResponse {
    pub id: CartLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
}

impl From<CartLine> for CartLineResponse {
    fn from(line: CartLine) -> Self {
        Self {
            subtotal: line.subtotal(),
            id: line.id,
            product_id: line.product_id,
            product_name: line.product_name,
            unit_price: line.unit_price,
            quantity: line.quantity,
        }
    }
}

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartLineResponse>,
    pub total: Money,
    pub count: usize,
}

impl From<CartSummary> for CartResponse {
    fn from(summary: CartSummary) -> Self {
        Self {
            items: summary.lines.into_iter().map(Into::into).collect(),
            total: summary.total,
            count: summary.count,
        }
    }
}

#[derive(Serialize)]
pub struct ClearedResponse {
    pub removed: u64,
}

// -- Handlers --

/// GET /cart
#[tracing::instrument(skip(state), fields(owner = %caller.owner))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<CartResponse>, ApiError> {
    Ok(Json(state.cart.list(caller.owner).await?.into()))
}

/// POST /cart/items: 201 for a new line, 200 when an existing line grew.
#[tracing::instrument(skip(state), fields(owner = %caller.owner))]
pub async fn add<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    ApiJson(body): ApiJson<AddItemRequest>,
) -> Result<(StatusCode, Json<CartLineResponse>), ApiError> {
    let added = state
        .cart
        .add(caller.owner, ProductId::new(body.product_id), body.quantity)
        .await?;
    let status = if added.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(added.line.into())))
}

/// PUT /cart/items/{id}: a quantity of zero or less removes the line (204).
#[tracing::instrument(skip(state), fields(owner = %caller.owner))]
pub async fn set_quantity<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(line_id): Path<i64>,
    ApiJson(body): ApiJson<SetQuantityRequest>,
) -> Result<Response, ApiError> {
    let update = state
        .cart
        .set_quantity(caller.owner, CartLineId::new(line_id), body.quantity)
        .await?;
    Ok(match update {
        QuantityUpdate::Updated(line) => Json(CartLineResponse::from(line)).into_response(),
        QuantityUpdate::Removed => StatusCode::NO_CONTENT.into_response(),
    })
}

/// DELETE /cart/items/{id}
#[tracing::instrument(skip(state), fields(owner = %caller.owner))]
pub async fn remove<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(line_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .cart
        .remove(caller.owner, CartLineId::new(line_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /cart
#[tracing::instrument(skip(state), fields(owner = %caller.owner))]
pub async fn clear<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<ClearedResponse>, ApiError> {
    let removed = state.cart.clear(caller.owner).await?;
    Ok(Json(ClearedResponse { removed }))
}
