use crate::{
    auth::Caller,
    db::DbPool,
    entities::{
        order::Entity as Order,
        tracking_checkpoint::{self, Entity as TrackingCheckpoint},
        tracking_ledger::{self, Entity as TrackingLedger},
        OrderStatus,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

pub const DEFAULT_LOCATION: &str = "Warehouse";

/// Values for one checkpoint append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCheckpoint {
    pub status: OrderStatus,
    pub location: String,
    pub notes: Option<String>,
    pub image: Option<String>,
}

impl NewCheckpoint {
    pub fn new(status: OrderStatus) -> Self {
        Self {
            status,
            location: DEFAULT_LOCATION.to_string(),
            notes: None,
            image: None,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// An order's full tracking history, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct Ledger {
    pub order_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub checkpoints: Vec<tracking_checkpoint::Model>,
}

impl Ledger {
    pub fn latest(&self) -> Option<&tracking_checkpoint::Model> {
        self.checkpoints.last()
    }
}

/// Returns the ledger row for `order_id`, creating it if absent.
pub async fn ensure_ledger<C>(
    conn: &C,
    order_id: Uuid,
    at: DateTime<Utc>,
) -> Result<tracking_ledger::Model, ServiceError>
where
    C: ConnectionTrait,
{
    TrackingLedger::insert(tracking_ledger::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        created_at: Set(at),
        updated_at: Set(at),
    })
    .on_conflict(
        OnConflict::column(tracking_ledger::Column::OrderId)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;

    TrackingLedger::find()
        .filter(tracking_ledger::Column::OrderId.eq(order_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::InternalError(format!("ledger for order {} vanished", order_id)))
}

/// Appends a checkpoint to an order's ledger on `conn`.
///
/// No ordering checks are made here; callers that need the order status and
/// the ledger to agree run this inside the same transaction as the status
/// write.
pub async fn append_checkpoint<C>(
    conn: &C,
    order_id: Uuid,
    entry: NewCheckpoint,
    at: DateTime<Utc>,
) -> Result<tracking_checkpoint::Model, ServiceError>
where
    C: ConnectionTrait,
{
    if Order::find_by_id(order_id).one(conn).await?.is_none() {
        return Err(ServiceError::NotFound("Order not found".to_string()));
    }

    let ledger = ensure_ledger(conn, order_id, at).await?;

    let checkpoint = tracking_checkpoint::ActiveModel {
        ledger_id: Set(ledger.id),
        status: Set(entry.status),
        location: Set(entry.location),
        notes: Set(entry.notes),
        image: Set(entry.image),
        recorded_at: Set(at),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    TrackingLedger::update_many()
        .col_expr(
            tracking_ledger::Column::UpdatedAt,
            sea_orm::sea_query::Expr::value(at),
        )
        .filter(tracking_ledger::Column::Id.eq(ledger.id))
        .exec(conn)
        .await?;

    metrics::counter!("garmentflow_checkpoints_appended_total", 1, "status" => entry.status.to_string());
    debug!(order_id = %order_id, sequence = checkpoint.id, status = %entry.status, "checkpoint appended");
    Ok(checkpoint)
}

/// Read access to tracking ledgers.
#[derive(Clone)]
pub struct TrackingService {
    db_pool: Arc<DbPool>,
}

impl TrackingService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Full ledger for an order, ordered by append sequence.
    pub async fn get_ledger(&self, order_id: Uuid) -> Result<Ledger, ServiceError> {
        let db = &*self.db_pool;

        if Order::find_by_id(order_id).one(db).await?.is_none() {
            return Err(ServiceError::NotFound("Order not found".to_string()));
        }

        let ledger = TrackingLedger::find()
            .filter(tracking_ledger::Column::OrderId.eq(order_id))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Tracking not found for order".to_string()))?;

        let checkpoints = TrackingCheckpoint::find()
            .filter(tracking_checkpoint::Column::LedgerId.eq(ledger.id))
            .order_by_asc(tracking_checkpoint::Column::Id)
            .all(db)
            .await?;

        Ok(Ledger {
            order_id,
            created_at: ledger.created_at,
            updated_at: ledger.updated_at,
            checkpoints,
        })
    }

    /// Like [`get_ledger`](Self::get_ledger), restricted to the order's buyer and staff.
    #[instrument(skip(self), fields(caller_id = %caller.id))]
    pub async fn get_ledger_for(&self, caller: &Caller, order_id: Uuid) -> Result<Ledger, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if !caller.can_view(order.buyer_id) {
            return Err(ServiceError::Forbidden(
                "You do not have access to this order's tracking".to_string(),
            ));
        }

        self.get_ledger(order_id).await
    }
}
