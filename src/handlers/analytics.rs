use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    auth::Caller,
    errors::ServiceError,
    services::analytics::{
        AnalyticsReport, DateRange, ManagerPerformance, PopularProduct, RevenueStats, StatusCount,
    },
    ApiResponse, ApiResult, AppState,
};

/// Build the analytics Router scoped under `/api/v1/analytics`.
pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/revenue", get(get_revenue))
        .route("/order-status", get(get_order_status))
        .route("/popular-products", get(get_popular_products))
        .route("/managers/:id/performance", get(get_manager_performance))
        .route("/report", get(get_report))
}

/// Creation-time window; defaults to the last 30 days.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RangeQuery {
    /// RFC 3339 start, inclusive
    pub start: Option<DateTime<Utc>>,
    /// RFC 3339 end, inclusive
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct TopQuery {
    /// Number of products to return (default: 5)
    #[param(minimum = 1)]
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/revenue",
    params(RangeQuery),
    responses(
        (status = 200, description = "Revenue from delivered orders", body = ApiResponse<RevenueStats>),
        (status = 403, description = "Staff only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Analytics"
)]
pub async fn get_revenue(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<RangeQuery>,
) -> ApiResult<RevenueStats> {
    caller.require_staff()?;
    let range = DateRange::resolve(query.start, query.end)?;
    let stats = state.services.analytics.revenue_stats(range).await?;
    Ok(Json(ApiResponse::success(stats)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/order-status",
    responses(
        (status = 200, description = "Order count per status", body = ApiResponse<Vec<StatusCount>>),
        (status = 403, description = "Staff only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Analytics"
)]
pub async fn get_order_status(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Vec<StatusCount>> {
    caller.require_staff()?;
    let histogram = state.services.analytics.order_status_histogram().await?;
    Ok(Json(ApiResponse::success(histogram)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/popular-products",
    params(TopQuery),
    responses(
        (status = 200, description = "Products ranked by order count", body = ApiResponse<Vec<PopularProduct>>),
        (status = 403, description = "Staff only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Analytics"
)]
pub async fn get_popular_products(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<TopQuery>,
) -> ApiResult<Vec<PopularProduct>> {
    caller.require_staff()?;
    let products = state.services.analytics.popular_products(query.limit).await?;
    Ok(Json(ApiResponse::success(products)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/managers/{id}/performance",
    params(("id" = Uuid, Path, description = "Manager user id")),
    responses(
        (status = 200, description = "Delivery figures for the manager's products", body = ApiResponse<ManagerPerformance>),
        (status = 403, description = "Admins, or the manager themselves", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Analytics"
)]
pub async fn get_manager_performance(
    State(state): State<AppState>,
    caller: Caller,
    Path(manager_id): Path<Uuid>,
) -> ApiResult<ManagerPerformance> {
    if !caller.is_admin() && caller.id != manager_id {
        return Err(ServiceError::Forbidden(
            "Managers can only view their own performance".to_string(),
        ));
    }
    caller.require_staff()?;
    let performance = state.services.analytics.manager_performance(manager_id).await?;
    Ok(Json(ApiResponse::success(performance)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/report",
    params(RangeQuery),
    responses(
        (status = 200, description = "Period summary", body = ApiResponse<AnalyticsReport>),
        (status = 403, description = "Staff only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Analytics"
)]
pub async fn get_report(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<RangeQuery>,
) -> ApiResult<AnalyticsReport> {
    caller.require_staff()?;
    let range = DateRange::resolve(query.start, query.end)?;
    let report = state.services.analytics.analytics_report(range).await?;
    Ok(Json(ApiResponse::success(report)))
}
