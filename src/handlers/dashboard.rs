use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::Caller,
    services::analytics::{ActivityItem, DashboardStats},
    ApiResponse, ApiResult, AppState,
};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/activity", get(get_activity))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ActivityQuery {
    /// Number of orders to return (default: 10)
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/stats",
    responses(
        (status = 200, description = "Counters for the caller's role", body = ApiResponse<DashboardStats>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Dashboard"
)]
pub async fn get_stats(State(state): State<AppState>, caller: Caller) -> ApiResult<DashboardStats> {
    let stats = state.services.analytics.dashboard_stats(&caller).await?;
    Ok(Json(ApiResponse::success(stats)))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/activity",
    params(ActivityQuery),
    responses(
        (status = 200, description = "The caller's latest orders", body = ApiResponse<Vec<ActivityItem>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Dashboard"
)]
pub async fn get_activity(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Vec<ActivityItem>> {
    let limit = query.limit.map(|l| state.config.clamp_page_size(Some(l)));
    let activity = state.services.analytics.recent_activity(&caller, limit).await?;
    Ok(Json(ApiResponse::success(activity)))
}
