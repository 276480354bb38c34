use axum::{
    extract::{Path, State},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{common::created_response, orders::TransitionView};
use crate::{
    auth::Caller,
    entities::{tracking_checkpoint, OrderStatus},
    errors::ServiceError,
    services::{lifecycle::TransitionRequest, tracking::Ledger},
    ApiResponse, ApiResult, AppState,
};

pub fn tracking_routes() -> Router<AppState> {
    Router::new()
        .route("/:id", get(get_tracking))
        .route("/:id/update", post(update_tracking))
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckpointView {
    /// Append sequence; strictly increasing within a ledger.
    pub sequence: i32,
    pub status: OrderStatus,
    pub location: String,
    pub notes: Option<String>,
    pub image: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<tracking_checkpoint::Model> for CheckpointView {
    fn from(m: tracking_checkpoint::Model) -> Self {
        Self {
            sequence: m.id,
            status: m.status,
            location: m.location,
            notes: m.notes,
            image: m.image,
            timestamp: m.recorded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LedgerView {
    pub order_id: Uuid,
    pub current_status: Option<OrderStatus>,
    pub checkpoints: Vec<CheckpointView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Ledger> for LedgerView {
    fn from(ledger: Ledger) -> Self {
        Self {
            order_id: ledger.order_id,
            current_status: ledger.latest().map(|c| c.status),
            created_at: ledger.created_at,
            updated_at: ledger.updated_at,
            checkpoints: ledger.checkpoints.into_iter().map(CheckpointView::from).collect(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/tracking/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Checkpoints in append order", body = ApiResponse<LedgerView>),
        (status = 403, description = "Not the buyer or staff", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or tracking not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Tracking"
)]
pub async fn get_tracking(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<LedgerView> {
    let ledger = state.services.tracking.get_ledger_for(&caller, id).await?;
    Ok(Json(ApiResponse::success(ledger.into())))
}

/// Records a staff tracking update. A new status moves the order; the
/// current status adds a progress note.
#[utoipa::path(
    post,
    path = "/api/v1/tracking/{id}/update",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = TransitionRequest,
    responses(
        (status = 201, description = "Checkpoint recorded", body = ApiResponse<TransitionView>),
        (status = 400, description = "Illegal transition or invalid body", body = crate::errors::ErrorResponse),
        (status = 403, description = "Staff only", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order changed concurrently", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Tracking"
)]
pub async fn update_tracking(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Response, ServiceError> {
    let outcome = state
        .services
        .lifecycle
        .record_progress(&caller, id, request)
        .await?;
    Ok(created_response(TransitionView::from(outcome)))
}
