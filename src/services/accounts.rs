use crate::{
    auth::Caller,
    db::DbPool,
    entities::{
        user::{self, Entity as User},
        AccountStatus, UserRole,
    },
    errors::ServiceError,
    events::{publish, Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewUser {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SuspendRequest {
    #[validate(length(min = 1, message = "Suspension reason is required"))]
    pub reason: String,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub status: Option<AccountStatus>,
}

/// User account administration.
#[derive(Clone)]
pub struct AccountService {
    db_pool: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

impl AccountService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Registers an account in `pending` status.
    #[instrument(skip(self, request), fields(role = %request.role))]
    pub async fn register(&self, request: NewUser) -> Result<user::Model, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        let exists = User::find()
            .filter(user::Column::Email.eq(email.clone()))
            .count(&*self.db_pool)
            .await?
            > 0;
        if exists {
            return Err(ServiceError::Conflict("Email is already registered".to_string()));
        }

        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            email: Set(email),
            role: Set(request.role),
            status: Set(AccountStatus::Pending),
            suspend_reason: Set(None),
            suspend_feedback: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(user_id = %model.id, "User registered");
        Ok(model)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        User::find_by_id(user_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    pub async fn list_users(
        &self,
        caller: &Caller,
        filter: UserFilter,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<user::Model>, u64), ServiceError> {
        caller.require_admin()?;

        let mut query = User::find().order_by_desc(user::Column::CreatedAt);
        if let Some(role) = filter.role {
            query = query.filter(user::Column::Role.eq(role));
        }
        if let Some(status) = filter.status {
            query = query.filter(user::Column::Status.eq(status));
        }

        let total = query.clone().count(&*self.db_pool).await?;
        let items = query
            .offset(skip)
            .limit(limit)
            .all(&*self.db_pool)
            .await?;
        Ok((items, total))
    }

    #[instrument(skip(self), fields(caller_id = %caller.id))]
    pub async fn approve(&self, caller: &Caller, user_id: Uuid) -> Result<user::Model, ServiceError> {
        caller.ensure_active()?;
        caller.require_admin()?;

        let mut active = self.get_user(user_id).await?.into_active_model();
        active.status = Set(AccountStatus::Approved);
        active.suspend_reason = Set(None);
        active.suspend_feedback = Set(None);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db_pool).await?;

        info!(user_id = %updated.id, "User approved");
        publish(
            self.event_sender.as_ref(),
            Event::AccountApproved {
                user_id: updated.id,
                email: updated.email.clone(),
            },
        );
        Ok(updated)
    }

    #[instrument(skip(self, request), fields(caller_id = %caller.id))]
    pub async fn suspend(
        &self,
        caller: &Caller,
        user_id: Uuid,
        request: SuspendRequest,
    ) -> Result<user::Model, ServiceError> {
        caller.ensure_active()?;
        caller.require_admin()?;
        request.validate()?;
        if caller.id == user_id {
            return Err(ServiceError::ValidationError(
                "Admins cannot suspend their own account".to_string(),
            ));
        }

        let mut active = self.get_user(user_id).await?.into_active_model();
        active.status = Set(AccountStatus::Suspended);
        active.suspend_reason = Set(Some(request.reason.clone()));
        active.suspend_feedback = Set(request.feedback.clone());
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db_pool).await?;

        info!(user_id = %updated.id, "User suspended");
        publish(
            self.event_sender.as_ref(),
            Event::AccountSuspended {
                user_id: updated.id,
                email: updated.email.clone(),
                reason: request.reason,
                feedback: request.feedback,
            },
        );
        Ok(updated)
    }
}
