use crate::entities::OrderStatus;
use crate::notifications::{Notification, Notifier};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub mod reminders;

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event channel is full")]
    ChannelFull,
    #[error("event channel is closed")]
    ChannelClosed,
}

/// Handle for publishing domain events to the background processor.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a bounded channel and returns both ends.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Enqueues an event without waiting for channel capacity.
    pub fn send(&self, event: Event) -> Result<(), EventError> {
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EventError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => EventError::ChannelClosed,
        })
    }
}

/// Publishes `event` if a sender is configured. Failures are logged only.
pub fn publish(sender: Option<&EventSender>, event: Event) {
    let Some(sender) = sender else {
        return;
    };
    let kind = event.kind();
    if let Err(e) = sender.send(event) {
        warn!(error = %e, event = kind, "dropping notification event");
        metrics::counter!("garmentflow_events_dropped_total", 1, "event" => kind);
    }
}

/// Domain events that trigger user notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced {
        order_id: Uuid,
        order_number: String,
        buyer_email: String,
        customer_name: String,
        product_title: String,
        quantity: i32,
        total_price: Decimal,
    },
    OrderApproved {
        order_id: Uuid,
        order_number: String,
        buyer_email: String,
        customer_name: String,
        product_title: String,
    },
    CheckpointAppended {
        order_id: Uuid,
        order_number: String,
        buyer_email: String,
        customer_name: String,
        status: OrderStatus,
        location: String,
        notes: Option<String>,
    },
    AccountApproved {
        user_id: Uuid,
        email: String,
    },
    AccountSuspended {
        user_id: Uuid,
        email: String,
        reason: String,
        feedback: Option<String>,
    },
    PendingOrdersReminder {
        manager_email: String,
        manager_name: String,
        pending_orders: u64,
        order_numbers: Vec<String>,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::OrderPlaced { .. } => "order_placed",
            Event::OrderApproved { .. } => "order_approved",
            Event::CheckpointAppended { .. } => "checkpoint_appended",
            Event::AccountApproved { .. } => "account_approved",
            Event::AccountSuspended { .. } => "account_suspended",
            Event::PendingOrdersReminder { .. } => "pending_orders_reminder",
        }
    }
}

/// Drains the event channel, rendering and delivering one notification per
/// event until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, notifier: Arc<dyn Notifier>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!(event = event.kind(), "received event");
        let notification = Notification::from(&event);

        match notifier.deliver(&notification).await {
            Ok(()) => {
                metrics::counter!("garmentflow_notifications_sent_total", 1, "event" => event.kind());
            }
            Err(e) => {
                error!(
                    error = %e,
                    event = event.kind(),
                    recipient = %notification.to,
                    "Failed to deliver notification"
                );
                metrics::counter!("garmentflow_notifications_failed_total", 1, "event" => event.kind());
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approved_event() -> Event {
        Event::AccountApproved {
            user_id: Uuid::new_v4(),
            email: "buyer@example.com".into(),
        }
    }

    #[test]
    fn full_channel_does_not_block() {
        let (sender, _rx) = EventSender::channel(1);
        assert!(sender.send(approved_event()).is_ok());
        assert!(matches!(
            sender.send(approved_event()),
            Err(EventError::ChannelFull)
        ));
        // publish swallows the failure
        publish(Some(&sender), approved_event());
    }

    #[test]
    fn closed_channel_is_reported() {
        let (sender, rx) = EventSender::channel(4);
        drop(rx);
        assert!(matches!(
            sender.send(approved_event()),
            Err(EventError::ChannelClosed)
        ));
    }
}
