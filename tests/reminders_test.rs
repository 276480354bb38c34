mod common;

use std::time::Duration;

use common::TestApp;
use garmentflow_api::{
    entities::{AccountStatus, UserRole},
    events::reminders::{send_pending_order_reminders, start_reminder_worker},
    notifications::Notification,
};
use rust_decimal_macros::dec;

const REMINDER_SUBJECT: &str = "Pending Orders Reminder - GarmentFlow";

fn reminders(delivered: Vec<Notification>) -> Vec<Notification> {
    delivered
        .into_iter()
        .filter(|n| n.subject == REMINDER_SUBJECT)
        .collect()
}

#[tokio::test]
async fn nothing_is_sent_without_pending_orders() {
    let app = TestApp::new().await;
    app.manager().await;

    let sent = send_pending_order_reminders(app.db(), Some(&app.events))
        .await
        .unwrap();
    assert_eq!(sent, 0);
}

#[tokio::test]
async fn approved_managers_hear_about_pending_orders() {
    let app = TestApp::new().await;
    let manager = app.manager().await;
    app.seed_user(UserRole::Manager, AccountStatus::Suspended).await;
    let buyer = app.buyer().await;
    let product = app.seed_product(&manager, "Raincoat", dec!(70.00), 100, 1).await;

    let oldest = app.place_order(&buyer, product.id, 1).await;
    let newer = app.place_order(&buyer, product.id, 1).await;
    let approved = app.place_order(&buyer, product.id, 1).await;
    app.services()
        .lifecycle
        .approve(&manager.caller, approved.id)
        .await
        .unwrap();

    let sent = send_pending_order_reminders(app.db(), Some(&app.events))
        .await
        .unwrap();
    assert_eq!(sent, 1);

    // three confirmations, one approval, one reminder
    let delivered = reminders(app.wait_for_notifications(5).await);
    assert_eq!(delivered.len(), 1);
    let reminder = &delivered[0];
    assert_eq!(reminder.to, manager.user.email);
    assert!(reminder.body.contains("2 order(s) are waiting for review"));
    let oldest_at = reminder.body.find(&oldest.order_number).unwrap();
    let newer_at = reminder.body.find(&newer.order_number).unwrap();
    assert!(oldest_at < newer_at);
    assert!(!reminder.body.contains(&approved.order_number));
}

#[tokio::test]
async fn worker_runs_on_its_interval_and_can_be_disabled() {
    let app = TestApp::new().await;
    let manager = app.manager().await;
    let buyer = app.buyer().await;
    let product = app.seed_product(&manager, "Fleece", dec!(35.00), 100, 1).await;
    app.place_order(&buyer, product.id, 1).await;

    assert!(start_reminder_worker(app.state.db.clone(), app.events.clone(), Duration::ZERO).is_none());

    let worker = start_reminder_worker(
        app.state.db.clone(),
        app.events.clone(),
        Duration::from_millis(50),
    )
    .unwrap();

    let mut seen = Vec::new();
    for _ in 0..100 {
        seen = reminders(app.notifier.delivered());
        if !seen.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    worker.abort();

    assert!(!seen.is_empty());
    assert_eq!(seen[0].to, manager.user.email);
}
