use crate::events::Event;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub kind: &'static str,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Webhook rejected notification with status {0}")]
    Rejected(u16),
}

/// Delivery backend for notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Writes notifications to the log. Used when no webhook is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError> {
        info!(
            to = %notification.to,
            subject = %notification.subject,
            kind = notification.kind,
            "notification"
        );
        Ok(())
    }
}

/// POSTs each notification as JSON to a configured endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotificationError::Rejected(response.status().as_u16()))
        }
    }
}

impl From<&Event> for Notification {
    fn from(event: &Event) -> Self {
        let kind = event.kind();
        match event {
            Event::OrderPlaced {
                order_number,
                buyer_email,
                customer_name,
                product_title,
                quantity,
                total_price,
                ..
            } => Notification {
                to: buyer_email.clone(),
                subject: format!("Order Confirmation - {}", order_number),
                body: format!(
                    "Hello {},\n\nThank you for your order {}.\nProduct: {}\nQuantity: {}\nTotal: ${:.2}\n\nYour order is pending review by our team.",
                    customer_name, order_number, product_title, quantity, total_price
                ),
                kind,
            },
            Event::OrderApproved {
                order_number,
                buyer_email,
                customer_name,
                product_title,
                ..
            } => Notification {
                to: buyer_email.clone(),
                subject: format!("Order Approved - {}", order_number),
                body: format!(
                    "Hello {},\n\nYour order {} for {} has been approved and will move into production.",
                    customer_name, order_number, product_title
                ),
                kind,
            },
            Event::CheckpointAppended {
                order_number,
                buyer_email,
                customer_name,
                status,
                location,
                notes,
                ..
            } => {
                let mut body = format!(
                    "Hello {},\n\nYour order {} has a new update.\nStatus: {}\nLocation: {}",
                    customer_name, order_number, status, location
                );
                if let Some(notes) = notes {
                    body.push_str(&format!("\nNotes: {}", notes));
                }
                Notification {
                    to: buyer_email.clone(),
                    subject: format!("Order Update - {}", order_number),
                    body,
                    kind,
                }
            }
            Event::AccountApproved { email, .. } => Notification {
                to: email.clone(),
                subject: "Account Approved - GarmentFlow".to_string(),
                body: "Your GarmentFlow account has been approved. You can now place and manage orders."
                    .to_string(),
                kind,
            },
            Event::AccountSuspended {
                email,
                reason,
                feedback,
                ..
            } => {
                let mut body = format!("Your GarmentFlow account has been suspended.\nReason: {}", reason);
                if let Some(feedback) = feedback {
                    body.push_str(&format!("\nFeedback: {}", feedback));
                }
                Notification {
                    to: email.clone(),
                    subject: "Account Suspension - GarmentFlow".to_string(),
                    body,
                    kind,
                }
            }
            Event::PendingOrdersReminder {
                manager_email,
                manager_name,
                pending_orders,
                order_numbers,
            } => {
                let mut body = format!(
                    "Hello {},\n\n{} order(s) are waiting for review:",
                    manager_name, pending_orders
                );
                for number in order_numbers {
                    body.push_str(&format!("\n- {}", number));
                }
                if *pending_orders > order_numbers.len() as u64 {
                    body.push_str(&format!(
                        "\n...and {} more",
                        *pending_orders - order_numbers.len() as u64
                    ));
                }
                Notification {
                    to: manager_email.clone(),
                    subject: "Pending Orders Reminder - GarmentFlow".to_string(),
                    body,
                    kind,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::OrderStatus;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn order_placed_renders_confirmation() {
        let event = Event::OrderPlaced {
            order_id: Uuid::new_v4(),
            order_number: "ORD-1-ABCDEF".into(),
            buyer_email: "buyer@example.com".into(),
            customer_name: "Ada Lovelace".into(),
            product_title: "Linen Shirt".into(),
            quantity: 12,
            total_price: dec!(150),
        };
        let n = Notification::from(&event);
        assert_eq!(n.to, "buyer@example.com");
        assert_eq!(n.subject, "Order Confirmation - ORD-1-ABCDEF");
        assert!(n.body.contains("Total: $150.00"));
    }

    #[test]
    fn checkpoint_update_uses_status_label() {
        let event = Event::CheckpointAppended {
            order_id: Uuid::new_v4(),
            order_number: "ORD-2-000001".into(),
            buyer_email: "buyer@example.com".into(),
            customer_name: "Ada Lovelace".into(),
            status: OrderStatus::QualityCheck,
            location: "Line 3".into(),
            notes: None,
        };
        let n = Notification::from(&event);
        assert_eq!(n.subject, "Order Update - ORD-2-000001");
        assert!(n.body.contains("Status: Quality Check"));
        assert!(!n.body.contains("Notes:"));
    }

    #[test]
    fn suspension_includes_reason_and_feedback() {
        let n = Notification::from(&Event::AccountSuspended {
            user_id: Uuid::new_v4(),
            email: "m@example.com".into(),
            reason: "Policy violation".into(),
            feedback: Some("Contact support".into()),
        });
        assert_eq!(n.subject, "Account Suspension - GarmentFlow");
        assert!(n.body.contains("Reason: Policy violation"));
        assert!(n.body.contains("Feedback: Contact support"));
    }

    #[test]
    fn reminder_lists_orders_and_the_overflow() {
        let n = Notification::from(&Event::PendingOrdersReminder {
            manager_email: "lead@example.com".into(),
            manager_name: "Coco".into(),
            pending_orders: 3,
            order_numbers: vec!["ORD-1-000001".into(), "ORD-1-000002".into()],
        });
        assert_eq!(n.to, "lead@example.com");
        assert_eq!(n.subject, "Pending Orders Reminder - GarmentFlow");
        assert!(n.body.contains("3 order(s) are waiting for review"));
        assert!(n.body.contains("- ORD-1-000002"));
        assert!(n.body.ends_with("...and 1 more"));
    }
}
