//! Order lifecycle: the legal transition graph, the capability check layered
//! on top of it, and the transactional transition that keeps an order's
//! status and its tracking ledger in step.

use crate::{
    auth::Caller,
    db::DbPool,
    entities::{
        order::{self, Entity as Order, Model as OrderModel},
        tracking_checkpoint, OrderStatus,
    },
    errors::ServiceError,
    events::{publish, Event, EventSender},
    services::{
        orders::update_status,
        tracking::{append_checkpoint, NewCheckpoint, DEFAULT_LOCATION},
    },
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use OrderStatus::*;

/// Statuses reachable from `from` in one step. Empty for terminal statuses.
pub fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    match from {
        Pending => &[Approved, Rejected, Cancelled],
        Approved => &[Cutting, Cancelled],
        Cutting => &[Sewing],
        Sewing => &[QualityCheck],
        QualityCheck => &[Shipped],
        Shipped => &[InDelivery],
        InDelivery => &[Delivered],
        Rejected | Cancelled | Delivered => &[],
    }
}

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }

    /// Statuses at which staff may log progress notes without moving the order.
    pub fn accepts_progress_notes(self) -> bool {
        !matches!(self, Pending | Rejected | Cancelled)
    }
}

/// Note recorded on a checkpoint when the caller supplies none.
pub fn default_note(status: OrderStatus) -> &'static str {
    match status {
        Pending => "Order placed",
        Approved => "Order approved",
        Rejected => "Order rejected",
        Cancelled => "Order cancelled",
        Cutting => "Fabric cutting started",
        Sewing => "Sewing in progress",
        QualityCheck => "Quality check in progress",
        Shipped => "Order shipped",
        InDelivery => "Out for delivery",
        Delivered => "Order delivered",
    }
}

/// Decides whether `caller` may move `order` to `to`.
///
/// Pairs outside the transition graph fail `IllegalTransition` regardless of
/// who asks. Legal pairs then require an approved account and the right role:
/// only the order's own buyer may cancel a Pending order; every other move is
/// for managers and admins.
pub fn authorize(caller: &Caller, order: &OrderModel, to: OrderStatus) -> Result<(), ServiceError> {
    let from = order.status;
    if !can_transition(from, to) {
        return Err(ServiceError::IllegalTransition { from, to });
    }

    caller.ensure_active()?;

    let allowed = match (from, to) {
        (Pending, Cancelled) => caller.id == order.buyer_id,
        _ => caller.is_staff(),
    };

    if allowed {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "{} cannot move order {} from {} to {}",
            caller.role, order.order_number, from, to
        )))
    }
}

/// Requested status change, with optional checkpoint details.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct TransitionRequest {
    pub status: OrderStatus,
    #[validate(length(min = 1, max = 200, message = "Location must be 1-200 characters"))]
    pub location: Option<String>,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
    pub image: Option<String>,
}

impl TransitionRequest {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            location: None,
            notes: None,
            image: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    fn checkpoint(&self) -> NewCheckpoint {
        let notes = self
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(default_note(self.status))
            .to_string();
        NewCheckpoint {
            status: self.status,
            location: self
                .location
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .unwrap_or(DEFAULT_LOCATION)
                .to_string(),
            notes: Some(notes),
            image: self.image.clone(),
        }
    }
}

/// The order after a change and the checkpoint that recorded it.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub order: OrderModel,
    pub checkpoint: tracking_checkpoint::Model,
}

#[derive(Clone)]
pub struct LifecycleService {
    db_pool: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

impl LifecycleService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Moves an order to `request.status`.
    ///
    /// The status write and the mirroring checkpoint commit together. The
    /// write is conditional on the status read at the start, so a concurrent
    /// change turns this call into `Conflict`.
    #[instrument(skip(self, request), fields(caller_id = %caller.id, order_id = %order_id, to = %request.status))]
    pub async fn transition(
        &self,
        caller: &Caller,
        order_id: Uuid,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, ServiceError> {
        request.validate()?;
        let to = request.status;
        let now = Utc::now();

        let current = find_order(&*self.db_pool, order_id).await?;
        let from = current.status;
        authorize(caller, &current, to)?;

        // The guarded write opens the transaction so SQLite takes the write
        // lock before any read snapshot exists.
        let txn = self.db_pool.begin().await?;
        let updated = update_status(&txn, order_id, from, to, now).await;
        if !contention_as_lost(updated)? {
            warn!(order_id = %order_id, from = %from, to = %to, "status changed underneath transition");
            metrics::counter!("garmentflow_transition_conflicts_total", 1);
            if let Err(e) = txn.rollback().await {
                warn!(error = %e, order_id = %order_id, "rollback after lost race failed");
            }
            return Err(ServiceError::Conflict(format!(
                "Order {} was modified concurrently; reload and retry",
                current.order_number
            )));
        }

        let checkpoint = append_checkpoint(&txn, order_id, request.checkpoint(), now).await?;
        let order = find_order(&txn, order_id).await?;

        txn.commit().await?;

        info!(order_id = %order_id, from = %from, to = %to, "order transitioned");
        metrics::counter!(
            "garmentflow_transitions_total",
            1,
            "from" => from.to_string(),
            "to" => to.to_string()
        );

        self.notify(&order, &checkpoint, true);
        Ok(TransitionOutcome { order, checkpoint })
    }

    pub async fn approve(&self, caller: &Caller, order_id: Uuid) -> Result<TransitionOutcome, ServiceError> {
        self.transition(caller, order_id, TransitionRequest::to(Approved))
            .await
    }

    pub async fn reject(
        &self,
        caller: &Caller,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<TransitionOutcome, ServiceError> {
        let mut request = TransitionRequest::to(Rejected);
        request.notes = reason;
        self.transition(caller, order_id, request).await
    }

    pub async fn cancel(
        &self,
        caller: &Caller,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<TransitionOutcome, ServiceError> {
        let mut request = TransitionRequest::to(Cancelled);
        request.notes = reason;
        self.transition(caller, order_id, request).await
    }

    /// Staff tracking update.
    ///
    /// A status different from the order's current one is a transition. The
    /// same status appends a progress note, guarded by a conditional touch of
    /// the order row so it cannot slip past a concurrent transition.
    #[instrument(skip(self, request), fields(caller_id = %caller.id, order_id = %order_id, status = %request.status))]
    pub async fn record_progress(
        &self,
        caller: &Caller,
        order_id: Uuid,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, ServiceError> {
        let current = find_order(&*self.db_pool, order_id).await?;
        if request.status != current.status {
            return self.transition(caller, order_id, request).await;
        }

        request.validate()?;
        let status = current.status;
        if !status.accepts_progress_notes() {
            return Err(ServiceError::IllegalTransition {
                from: status,
                to: status,
            });
        }
        caller.ensure_active()?;
        caller.require_staff()?;

        let now = Utc::now();
        let txn = self.db_pool.begin().await?;

        let touched = Order::update_many()
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(status))
            .exec(&txn)
            .await
            .map(|r| r.rows_affected == 1)
            .map_err(ServiceError::from);
        if !contention_as_lost(touched)? {
            metrics::counter!("garmentflow_transition_conflicts_total", 1);
            if let Err(e) = txn.rollback().await {
                warn!(error = %e, order_id = %order_id, "rollback after lost race failed");
            }
            return Err(ServiceError::Conflict(format!(
                "Order {} changed status while recording progress",
                current.order_number
            )));
        }

        let checkpoint = append_checkpoint(&txn, order_id, request.checkpoint(), now).await?;
        let order = find_order(&txn, order_id).await?;
        txn.commit().await?;

        info!(order_id = %order_id, status = %status, sequence = checkpoint.id, "progress recorded");
        self.notify(&order, &checkpoint, false);
        Ok(TransitionOutcome { order, checkpoint })
    }

    fn notify(&self, order: &OrderModel, checkpoint: &tracking_checkpoint::Model, transitioned: bool) {
        let event = match checkpoint.status {
            Approved if transitioned => Event::OrderApproved {
                order_id: order.id,
                order_number: order.order_number.clone(),
                buyer_email: order.email.clone(),
                customer_name: order.customer_name(),
                product_title: order.product_title.clone(),
            },
            status => Event::CheckpointAppended {
                order_id: order.id,
                order_number: order.order_number.clone(),
                buyer_email: order.email.clone(),
                customer_name: order.customer_name(),
                status,
                location: checkpoint.location.clone(),
                notes: checkpoint.notes.clone(),
            },
        };
        publish(self.event_sender.as_ref(), event);
    }
}

/// Treats a writer locked out by a competing transaction as a lost race.
///
/// SQLite reports the competing writer as "database is locked" instead of
/// waiting for the conditional update to see the new status.
fn contention_as_lost(result: Result<bool, ServiceError>) -> Result<bool, ServiceError> {
    match result {
        Err(ServiceError::DatabaseError(err)) if is_lock_contention(&err) => {
            warn!(error = %err, "write lock contention on guarded order update");
            Ok(false)
        }
        other => other,
    }
}

fn is_lock_contention(err: &DbErr) -> bool {
    let message = err.to_string();
    message.contains("database is locked") || message.contains("database table is locked")
}

async fn find_order<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> Result<OrderModel, ServiceError> {
    Order::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AccountStatus, PaymentMethod, UserRole};
    use rust_decimal_macros::dec;

    fn order_in(status: OrderStatus, buyer_id: Uuid) -> OrderModel {
        let now = Utc::now();
        OrderModel {
            id: Uuid::new_v4(),
            order_number: "ORD-1-000000".into(),
            buyer_id,
            product_id: Uuid::new_v4(),
            product_title: "Wool Sweater".into(),
            quantity: 10,
            unit_price: dec!(20),
            total_price: dec!(200),
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: "grace@example.com".into(),
            contact_number: "555-0100".into(),
            delivery_address: "1 Navy Yard".into(),
            additional_notes: None,
            status,
            payment_method: PaymentMethod::CashOnDelivery,
            payment_status: "Pending".into(),
            approved_at: None,
            rejected_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    fn caller(role: UserRole) -> Caller {
        Caller::new(Uuid::new_v4(), role, AccountStatus::Approved)
    }

    #[test]
    fn terminal_statuses_have_no_successors() {
        assert!(Rejected.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(Delivered.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!InDelivery.is_terminal());
    }

    #[test]
    fn production_runs_in_order() {
        let chain = [Approved, Cutting, Sewing, QualityCheck, Shipped, InDelivery, Delivered];
        for pair in chain.windows(2) {
            assert!(can_transition(pair[0], pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
        assert!(!can_transition(Cutting, QualityCheck));
        assert!(!can_transition(Sewing, Cutting));
    }

    #[test]
    fn only_owner_cancels_pending() {
        let buyer = caller(UserRole::Buyer);
        let order = order_in(Pending, buyer.id);

        assert!(authorize(&buyer, &order, Cancelled).is_ok());
        assert!(matches!(
            authorize(&caller(UserRole::Buyer), &order, Cancelled),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            authorize(&caller(UserRole::Manager), &order, Cancelled),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn buyer_cannot_cancel_after_approval() {
        let buyer = caller(UserRole::Buyer);
        let order = order_in(Approved, buyer.id);
        assert!(matches!(
            authorize(&buyer, &order, Cancelled),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(authorize(&caller(UserRole::Admin), &order, Cancelled).is_ok());
    }

    #[test]
    fn illegal_pair_wins_over_role() {
        let admin = caller(UserRole::Admin);
        let order = order_in(Delivered, Uuid::new_v4());
        assert!(matches!(
            authorize(&admin, &order, Cancelled),
            Err(ServiceError::IllegalTransition {
                from: Delivered,
                to: Cancelled
            })
        ));
    }

    #[test]
    fn locked_database_counts_as_a_lost_race() {
        let locked = DbErr::Custom("error returned from database: (code: 5) database is locked".into());
        assert!(matches!(
            contention_as_lost(Err(ServiceError::DatabaseError(locked))),
            Ok(false)
        ));

        let other = DbErr::Custom("disk I/O error".into());
        assert!(matches!(
            contention_as_lost(Err(ServiceError::DatabaseError(other))),
            Err(ServiceError::DatabaseError(_))
        ));
        assert!(matches!(contention_as_lost(Ok(true)), Ok(true)));
    }

    #[test]
    fn suspended_staff_cannot_approve() {
        let manager = Caller::new(Uuid::new_v4(), UserRole::Manager, AccountStatus::Suspended);
        let order = order_in(Pending, Uuid::new_v4());
        assert!(matches!(
            authorize(&manager, &order, Approved),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn checkpoint_defaults_fill_location_and_note() {
        let cp = TransitionRequest::to(Sewing).checkpoint();
        assert_eq!(cp.location, "Warehouse");
        assert_eq!(cp.notes.as_deref(), Some("Sewing in progress"));

        let cp = TransitionRequest::to(Shipped)
            .at("Dock 4")
            .with_notes("  Courier booked ")
            .checkpoint();
        assert_eq!(cp.location, "Dock 4");
        assert_eq!(cp.notes.as_deref(), Some("Courier booked"));
    }
}
