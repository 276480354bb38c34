use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
    routing::{get, patch},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common::{created_response, PaginatedResponse};
use crate::{
    auth::Caller,
    entities::{user, AccountStatus, UserRole},
    errors::ServiceError,
    services::accounts::{NewUser, SuspendRequest, UserFilter},
    ApiResponse, ApiResult, AppState,
};

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(register_user))
        .route("/:id/approve", patch(approve_user))
        .route("/:id/suspend", patch(suspend_user))
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub status: AccountStatus,
    pub suspend_reason: Option<String>,
    pub suspend_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<user::Model> for UserView {
    fn from(m: user::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            role: m.role,
            status: m.status,
            suspend_reason: m.suspend_reason,
            suspend_feedback: m.suspend_feedback,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    pub role: Option<UserRole>,
    pub status: Option<AccountStatus>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

/// Sign-up. Accounts start `pending` until an admin approves them.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = NewUser,
    responses(
        (status = 201, description = "Account registered", body = ApiResponse<UserView>),
        (status = 400, description = "Invalid name or email", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse),
    ),
    tag = "Users"
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<NewUser>,
) -> Result<Response, ServiceError> {
    let user = state.services.accounts.register(request).await?;
    Ok(created_response(UserView::from(user)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Accounts, newest first", body = ApiResponse<PaginatedResponse<UserView>>),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<PaginatedResponse<UserView>> {
    let skip = query.skip.unwrap_or(0);
    let limit = state.config.clamp_page_size(query.limit);
    let filter = UserFilter {
        role: query.role,
        status: query.status,
    };

    let (users, total) = state
        .services
        .accounts
        .list_users(&caller, filter, skip, limit)
        .await?;
    let items = users.into_iter().map(UserView::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, skip, limit,
    ))))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}/approve",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Account approved", body = ApiResponse<UserView>),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn approve_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<UserView> {
    let user = state.services.accounts.approve(&caller, id).await?;
    Ok(Json(ApiResponse::success(user.into()).with_message("Account approved")))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}/suspend",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = SuspendRequest,
    responses(
        (status = 200, description = "Account suspended", body = ApiResponse<UserView>),
        (status = 400, description = "Missing reason or self-suspension", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn suspend_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(request): Json<SuspendRequest>,
) -> ApiResult<UserView> {
    let user = state.services.accounts.suspend(&caller, id, request).await?;
    Ok(Json(ApiResponse::success(user.into()).with_message("Account suspended")))
}
