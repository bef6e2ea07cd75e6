//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, OrderStatus};
use domain::{CancellationReceipt, CreateOrderRequest, OrderView, OrderWorkflow};
use market_store::MarketStore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthPrincipal;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: MarketStore> {
    pub workflow: OrderWorkflow<S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderView>,
}

// -- Handlers --

/// POST /orders - place a new order from the request payload.
#[tracing::instrument(skip(state, req, principal))]
pub async fn create<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthPrincipal(principal): AuthPrincipal,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let order = state.workflow.create_order(req, &principal).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders - list orders visible to the principal.
#[tracing::instrument(skip(state, principal))]
pub async fn list<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<OrderListResponse>, ApiError> {
    let orders = state.workflow.list_orders(&principal).await?;
    Ok(Json(OrderListResponse { orders }))
}

/// GET /orders/:id - load one order, subject to visibility scoping.
#[tracing::instrument(skip(state, principal))]
pub async fn get<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderView>, ApiError> {
    let order = state
        .workflow
        .get_order(OrderId::from_uuid(id), &principal)
        .await?;
    Ok(Json(order))
}

/// PATCH /orders/:id/status - move an order to a new status.
#[tracing::instrument(skip(state, principal, req))]
pub async fn update_status<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderView>, ApiError> {
    let status = OrderStatus::parse(&req.status)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown order status: {}", req.status)))?;

    let order = state
        .workflow
        .update_order_status(OrderId::from_uuid(id), status, &principal)
        .await?;
    Ok(Json(order))
}

/// PATCH /orders/:id/cancel - cancel an order, restoring stock.
#[tracing::instrument(skip(state, principal, req))]
pub async fn cancel<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<CancellationReceipt>, ApiError> {
    let receipt = state
        .workflow
        .cancel_order(OrderId::from_uuid(id), req.reason.as_deref(), &principal)
        .await?;
    Ok(Json(receipt))
}
