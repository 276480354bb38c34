use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
    routing::{get, patch, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{
    common::{created_response, PaginatedResponse},
    tracking::{CheckpointView, LedgerView},
};
use crate::{
    auth::Caller,
    entities::{order, OrderStatus, PaymentMethod},
    errors::ServiceError,
    services::{
        lifecycle::{TransitionOutcome, TransitionRequest},
        orders::{OrderFilter, Pagination, PlaceOrderRequest},
    },
    ApiResponse, ApiResult, AppState,
};

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(place_order).get(list_orders))
        .route("/mine", get(my_orders))
        .route("/number/:order_number", get(get_order_by_number))
        .route("/:id", get(get_order))
        .route("/:id/approve", patch(approve_order))
        .route("/:id/reject", patch(reject_order))
        .route("/:id/cancel", patch(cancel_order))
        .route("/:id/transition", post(transition_order))
}

/// Order as returned over HTTP.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderView {
    pub id: Uuid,
    pub order_number: String,
    pub buyer_id: Uuid,
    pub product_id: Uuid,
    pub product_title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact_number: String,
    pub delivery_address: String,
    pub additional_notes: Option<String>,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

impl From<order::Model> for OrderView {
    fn from(m: order::Model) -> Self {
        Self {
            id: m.id,
            order_number: m.order_number,
            buyer_id: m.buyer_id,
            product_id: m.product_id,
            product_title: m.product_title,
            quantity: m.quantity,
            unit_price: m.unit_price,
            total_price: m.total_price,
            first_name: m.first_name,
            last_name: m.last_name,
            email: m.email,
            contact_number: m.contact_number,
            delivery_address: m.delivery_address,
            additional_notes: m.additional_notes,
            status: m.status,
            payment_method: m.payment_method,
            payment_status: m.payment_status,
            approved_at: m.approved_at,
            rejected_at: m.rejected_at,
            cancelled_at: m.cancelled_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
            version: m.version,
        }
    }
}

/// An order with its tracking history.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: OrderView,
    pub tracking: Option<LedgerView>,
}

/// Result of a lifecycle change.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransitionView {
    pub order: OrderView,
    pub checkpoint: CheckpointView,
}

impl From<TransitionOutcome> for TransitionView {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            order: outcome.order.into(),
            checkpoint: outcome.checkpoint.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListOrdersQuery {
    /// Exact status match, e.g. `Pending` or `Quality Check`
    pub status: Option<OrderStatus>,
    /// Rows to skip (default: 0)
    pub skip: Option<u64>,
    /// Rows to return (default: 10, capped by configuration)
    pub limit: Option<u64>,
}

/// Optional reason attached to a reject or cancel.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DecisionNote {
    pub reason: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = ApiResponse<OrderView>),
        (status = 400, description = "Invalid quantity or order details", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Only approved buyers may order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 503, description = "Catalog unavailable", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn place_order(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<Response, ServiceError> {
    let order = state.services.orders.create(&caller, request).await?;
    Ok(created_response(OrderView::from(order)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "Orders, newest first", body = ApiResponse<PaginatedResponse<OrderView>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Staff only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListOrdersQuery>,
) -> ApiResult<PaginatedResponse<OrderView>> {
    caller.require_staff()?;

    let pagination = Pagination {
        skip: query.skip.unwrap_or(0),
        limit: state.config.clamp_page_size(query.limit),
    };
    let filter = OrderFilter {
        status: query.status,
        buyer_id: None,
    };

    let page = state.services.orders.list(filter, pagination).await?;
    let items = page.items.into_iter().map(OrderView::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, page.total, page.skip, page.limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/mine",
    responses(
        (status = 200, description = "The caller's orders", body = ApiResponse<Vec<OrderView>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn my_orders(State(state): State<AppState>, caller: Caller) -> ApiResult<Vec<OrderView>> {
    let orders = state.services.orders.list_for_buyer(caller.id).await?;
    Ok(Json(ApiResponse::success(
        orders.into_iter().map(OrderView::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order and tracking history", body = ApiResponse<OrderDetail>),
        (status = 403, description = "Not the buyer or staff", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    let order = state.services.orders.get_for_caller(&caller, id).await?;
    let tracking = match state.services.tracking.get_ledger(id).await {
        Ok(ledger) => Some(LedgerView::from(ledger)),
        Err(ServiceError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    Ok(Json(ApiResponse::success(OrderDetail {
        order: order.into(),
        tracking,
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/number/{order_number}",
    params(("order_number" = String, Path, description = "Human-readable order number, e.g. ORD-1741944600000-00A1B2")),
    responses(
        (status = 200, description = "Order", body = ApiResponse<OrderView>),
        (status = 403, description = "Not the buyer or staff", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order_by_number(
    State(state): State<AppState>,
    caller: Caller,
    Path(order_number): Path<String>,
) -> ApiResult<OrderView> {
    let order = state.services.orders.get_by_order_number(&order_number).await?;
    if !caller.can_view(order.buyer_id) {
        return Err(ServiceError::Forbidden(
            "You do not have access to this order".to_string(),
        ));
    }
    Ok(Json(ApiResponse::success(order.into())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/approve",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order approved", body = ApiResponse<TransitionView>),
        (status = 400, description = "Order is not pending", body = crate::errors::ErrorResponse),
        (status = 403, description = "Staff only", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order changed concurrently", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn approve_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<TransitionView> {
    let outcome = state.services.lifecycle.approve(&caller, id).await?;
    Ok(Json(ApiResponse::success(outcome.into())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/reject",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body(content = Option<DecisionNote>, description = "Optional rejection reason"),
    responses(
        (status = 200, description = "Order rejected", body = ApiResponse<TransitionView>),
        (status = 400, description = "Order is not pending", body = crate::errors::ErrorResponse),
        (status = 403, description = "Staff only", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order changed concurrently", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn reject_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    body: Option<Json<DecisionNote>>,
) -> ApiResult<TransitionView> {
    let reason = body.and_then(|Json(note)| note.reason);
    let outcome = state.services.lifecycle.reject(&caller, id, reason).await?;
    Ok(Json(ApiResponse::success(outcome.into())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body(content = Option<DecisionNote>, description = "Optional cancellation reason"),
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<TransitionView>),
        (status = 400, description = "Order can no longer be cancelled", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not allowed to cancel this order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order changed concurrently", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    body: Option<Json<DecisionNote>>,
) -> ApiResult<TransitionView> {
    let reason = body.and_then(|Json(note)| note.reason);
    let outcome = state.services.lifecycle.cancel(&caller, id, reason).await?;
    Ok(Json(ApiResponse::success(outcome.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/transition",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Order moved to the requested status", body = ApiResponse<TransitionView>),
        (status = 400, description = "Illegal transition", body = crate::errors::ErrorResponse),
        (status = 403, description = "Caller may not request this transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order changed concurrently", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn transition_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<TransitionView> {
    let outcome = state.services.lifecycle.transition(&caller, id, request).await?;
    Ok(Json(ApiResponse::success(outcome.into())))
}
