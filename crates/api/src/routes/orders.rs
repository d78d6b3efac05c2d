//! Order placement, history and cancellation for the caller.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Order, OrderId};
use domain::OrderIntake;
use store::Store;

use crate::auth::Caller;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

/// POST /orders: converts the caller's cart into an order.
#[tracing::instrument(skip(state, intake), fields(owner = %caller.owner))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    ApiJson(intake): ApiJson<OrderIntake>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.orders.create_order(caller.owner, intake).await?;
    tracing::info!(order_number = %order.order_number, total = %order.total_amount, "order placed");
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders: newest first.
#[tracing::instrument(skip(state), fields(owner = %caller.owner))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.list_for_owner(caller.owner).await?))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state), fields(owner = %caller.owner))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.get(caller.owner, OrderId::new(id)).await?))
}

/// POST /orders/{id}/cancel: cancels and restocks.
#[tracing::instrument(skip(state), fields(owner = %caller.owner))]
pub async fn cancel<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(
        state
            .orders
            .cancel_order(caller.owner, OrderId::new(id))
            .await?,
    ))
}
