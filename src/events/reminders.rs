//! Periodic reminder to managers about orders still waiting for a decision.

use std::{sync::Arc, time::Duration};

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{error, info};

use super::{publish, Event, EventSender};
use crate::{
    db::DbPool,
    entities::{
        order::{self, Entity as Order},
        user::{self, Entity as User},
        AccountStatus, OrderStatus, UserRole,
    },
    errors::ServiceError,
};

/// Order numbers listed in one reminder; the rest are summarised as a count.
pub const REMINDER_LISTED_ORDERS: u64 = 20;

/// Publishes one reminder per approved manager when any order is Pending.
/// Returns the number of reminders published.
pub async fn send_pending_order_reminders(
    db: &DbPool,
    sender: Option<&EventSender>,
) -> Result<usize, ServiceError> {
    let pending = Order::find().filter(order::Column::Status.eq(OrderStatus::Pending));

    let pending_orders = pending.clone().count(db).await?;
    if pending_orders == 0 {
        return Ok(0);
    }

    let order_numbers: Vec<String> = pending
        .select_only()
        .column(order::Column::OrderNumber)
        .order_by_asc(order::Column::CreatedAt)
        .limit(REMINDER_LISTED_ORDERS)
        .into_tuple()
        .all(db)
        .await?;

    let managers = User::find()
        .filter(user::Column::Role.eq(UserRole::Manager))
        .filter(user::Column::Status.eq(AccountStatus::Approved))
        .all(db)
        .await?;

    for manager in &managers {
        publish(
            sender,
            Event::PendingOrdersReminder {
                manager_email: manager.email.clone(),
                manager_name: manager.name.clone(),
                pending_orders,
                order_numbers: order_numbers.clone(),
            },
        );
    }

    info!(pending_orders, managers = managers.len(), "Sent pending order reminders");
    Ok(managers.len())
}

/// Spawns the reminder loop. The first reminder goes out one `every` after
/// start. Returns `None` when `every` is zero.
pub fn start_reminder_worker(
    db: Arc<DbPool>,
    sender: EventSender,
    every: Duration,
) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        info!("Pending order reminders disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = send_pending_order_reminders(&db, Some(&sender)).await {
                error!(error = %e, "pending order reminder run failed");
            }
        }
    }))
}
