use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::attachment_response;
use crate::{
    auth::Caller,
    entities::OrderStatus,
    errors::ServiceError,
    services::{export::UserDataExport, orders::OrderFilter},
    ApiResponse, ApiResult, AppState,
};

pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/orders.csv", get(export_orders))
        .route("/products.json", get(export_products))
        .route("/users/:id", get(export_user_data))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ExportOrdersQuery {
    /// Only export orders in this status
    pub status: Option<OrderStatus>,
}

#[utoipa::path(
    get,
    path = "/api/v1/exports/orders.csv",
    params(ExportOrdersQuery),
    responses(
        (status = 200, description = "Orders as CSV", content_type = "text/csv", body = String),
        (status = 403, description = "Staff only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Exports"
)]
pub async fn export_orders(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ExportOrdersQuery>,
) -> Result<Response, ServiceError> {
    let filter = OrderFilter {
        status: query.status,
        buyer_id: None,
    };
    let csv = state.services.exports.orders_csv(&caller, filter).await?;
    Ok(attachment_response(csv, "text/csv; charset=utf-8", "orders.csv"))
}

#[utoipa::path(
    get,
    path = "/api/v1/exports/products.json",
    responses(
        (status = 200, description = "Products with their creators", content_type = "application/json", body = String),
        (status = 403, description = "Staff only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Exports"
)]
pub async fn export_products(State(state): State<AppState>, caller: Caller) -> Result<Response, ServiceError> {
    let json = state.services.exports.products_json(&caller).await?;
    Ok(attachment_response(json, "application/json", "products.json"))
}

#[utoipa::path(
    get,
    path = "/api/v1/exports/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Everything held about the user"),
        (status = 403, description = "Only the user or an admin", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Exports"
)]
pub async fn export_user_data(
    State(state): State<AppState>,
    caller: Caller,
    Path(user_id): Path<Uuid>,
) -> ApiResult<UserDataExport> {
    let export = state.services.exports.user_data(&caller, user_id).await?;
    Ok(Json(ApiResponse::success(export)))
}
