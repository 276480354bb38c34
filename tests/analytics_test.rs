mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{Account, TestApp};
use garmentflow_api::{
    entities::{AccountStatus, OrderStatus, UserRole},
    errors::ServiceError,
    services::{analytics::DashboardStats, analytics::DateRange, lifecycle::TransitionRequest},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

async fn deliver(app: &TestApp, staff: &Account, order_id: Uuid) {
    for status in [
        OrderStatus::Approved,
        OrderStatus::Cutting,
        OrderStatus::Sewing,
        OrderStatus::QualityCheck,
        OrderStatus::Shipped,
        OrderStatus::InDelivery,
        OrderStatus::Delivered,
    ] {
        app.services()
            .lifecycle
            .transition(&staff.caller, order_id, TransitionRequest::to(status))
            .await
            .unwrap();
    }
}

fn around_now() -> DateRange {
    let now = Utc::now();
    DateRange::new(now - Duration::days(1), now + Duration::days(1))
}

#[tokio::test]
async fn popular_products_rank_by_order_count() {
    let app = TestApp::new().await;
    let manager = app.manager().await;
    let buyer = app.buyer().await;
    let shirt = app.seed_product(&manager, "Oxford Shirt", dec!(20.00), 100, 1).await;
    let coat = app.seed_product(&manager, "Pea Coat", dec!(90.00), 100, 1).await;

    for quantity in [2, 3, 1] {
        app.place_order(&buyer, shirt.id, quantity).await;
    }
    app.place_order(&buyer, coat.id, 5).await;

    let top = app.services().analytics.popular_products(Some(1)).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].product_id, shirt.id);
    assert_eq!(top[0].product_title, "Oxford Shirt");
    assert_eq!(top[0].order_count, 3);
    assert_eq!(top[0].total_quantity, 6);
    assert_eq!(top[0].revenue, dec!(120.00));

    let all = app.services().analytics.popular_products(None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].product_id, coat.id);
    assert_eq!(all[1].revenue, dec!(450.00));
}

#[tokio::test]
async fn popular_products_break_ties_on_revenue_and_default_to_five() {
    let app = TestApp::new().await;
    let manager = app.manager().await;
    let buyer = app.buyer().await;

    let mut products = Vec::new();
    for (i, price) in [dec!(10.00), dec!(20.00), dec!(30.00), dec!(40.00), dec!(50.00), dec!(60.00)]
        .into_iter()
        .enumerate()
    {
        let product = app.seed_product(&manager, &format!("Scarf {i}"), price, 100, 1).await;
        app.place_order(&buyer, product.id, 1).await;
        products.push(product);
    }

    let ranked = app.services().analytics.popular_products(None).await.unwrap();
    assert_eq!(ranked.len(), 5);
    assert!(ranked.iter().all(|p| p.order_count == 1));
    let revenues: Vec<Decimal> = ranked.iter().map(|p| p.revenue).collect();
    assert_eq!(
        revenues,
        vec![dec!(60.00), dec!(50.00), dec!(40.00), dec!(30.00), dec!(20.00)]
    );
    assert_eq!(ranked[0].product_id, products[5].id);
    assert_eq!(ranked[0].product_title, "Scarf 5");
}

#[tokio::test]
async fn revenue_counts_only_delivered_orders() {
    let app = TestApp::new().await;
    let manager = app.manager().await;
    let buyer = app.buyer().await;
    let product = app.seed_product(&manager, "Chore Jacket", dec!(50.00), 100, 1).await;

    let delivered = app.place_order(&buyer, product.id, 2).await;
    let also_delivered = app.place_order(&buyer, product.id, 1).await;
    app.place_order(&buyer, product.id, 4).await;
    deliver(&app, &manager, delivered.id).await;
    deliver(&app, &manager, also_delivered.id).await;

    let stats = app.services().analytics.revenue_stats(around_now()).await.unwrap();
    assert_eq!(stats.total_orders, 2);
    assert_eq!(stats.total_revenue, dec!(150.00));
    assert_eq!(stats.average_order_value, dec!(75.00));
}

#[tokio::test]
async fn revenue_over_an_empty_range_is_zero() {
    let app = TestApp::new().await;
    let manager = app.manager().await;
    let buyer = app.buyer().await;
    let product = app.seed_product(&manager, "Gilet", dec!(30.00), 100, 1).await;
    let order = app.place_order(&buyer, product.id, 1).await;
    deliver(&app, &manager, order.id).await;

    let long_ago = DateRange::new(
        Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2000, 1, 2, 0, 0, 0).unwrap(),
    );
    let stats = app.services().analytics.revenue_stats(long_ago).await.unwrap();
    assert_eq!(stats.total_orders, 0);
    assert_eq!(stats.total_revenue, Decimal::ZERO);
    assert_eq!(stats.average_order_value, Decimal::ZERO);
}

#[tokio::test]
async fn status_histogram_counts_each_status() {
    let app = TestApp::new().await;
    let manager = app.manager().await;
    let buyer = app.buyer().await;
    let product = app.seed_product(&manager, "Henley", dec!(18.00), 100, 1).await;

    let first = app.place_order(&buyer, product.id, 1).await;
    let second = app.place_order(&buyer, product.id, 1).await;
    app.place_order(&buyer, product.id, 1).await;
    app.services().lifecycle.approve(&manager.caller, first.id).await.unwrap();
    app.services()
        .lifecycle
        .reject(&manager.caller, second.id, None)
        .await
        .unwrap();

    let histogram = app.services().analytics.order_status_histogram().await.unwrap();
    let pairs: Vec<_> = histogram.iter().map(|c| (c.status, c.count)).collect();
    assert_eq!(
        pairs,
        vec![
            (OrderStatus::Pending, 1),
            (OrderStatus::Approved, 1),
            (OrderStatus::Rejected, 1),
        ]
    );
}

#[tokio::test]
async fn manager_performance_covers_their_products_only() {
    let app = TestApp::new().await;
    let manager = app.manager().await;
    let other_manager = app.manager().await;
    let buyer = app.buyer().await;
    let mine = app.seed_product(&manager, "Field Jacket", dec!(75.00), 100, 1).await;
    let theirs = app.seed_product(&other_manager, "Bomber", dec!(85.00), 100, 1).await;

    let delivered = app.place_order(&buyer, mine.id, 1).await;
    app.place_order(&buyer, mine.id, 1).await;
    app.place_order(&buyer, mine.id, 1).await;
    app.place_order(&buyer, theirs.id, 1).await;
    deliver(&app, &manager, delivered.id).await;

    let perf = app
        .services()
        .analytics
        .manager_performance(manager.id())
        .await
        .unwrap();
    assert_eq!(perf.total_products, 1);
    assert_eq!(perf.total_orders, 3);
    assert_eq!(perf.delivered_orders, 1);
    assert_eq!(perf.delivery_rate, "33.33");

    let idle = app.manager().await;
    let perf = app.services().analytics.manager_performance(idle.id()).await.unwrap();
    assert_eq!(perf.total_orders, 0);
    assert_eq!(perf.delivery_rate, "0.00");
}

#[tokio::test]
async fn report_summarises_every_status_in_range() {
    let app = TestApp::new().await;
    let manager = app.manager().await;
    let buyer = app.buyer().await;
    let product = app.seed_product(&manager, "Shacket", dec!(40.00), 100, 1).await;

    let delivered = app.place_order(&buyer, product.id, 1).await;
    app.place_order(&buyer, product.id, 2).await;
    deliver(&app, &manager, delivered.id).await;

    let report = app.services().analytics.analytics_report(around_now()).await.unwrap();
    assert_eq!(report.summary.total_orders, 2);
    assert_eq!(report.summary.total_revenue, dec!(120.00));
    assert_eq!(report.summary.average_order_value, dec!(60.00));
    assert_eq!(report.summary.delivered_orders, 1);
    assert_eq!(report.summary.pending_orders, 1);
    assert_eq!(report.summary.delivery_rate, "50.00");
    assert_eq!(report.orders_by_status.len(), 2);
}

#[tokio::test]
async fn dashboard_depends_on_role() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let manager = app.manager().await;
    let buyer = app.buyer().await;
    app.seed_user(UserRole::Buyer, AccountStatus::Pending).await;
    let product = app.seed_product(&manager, "Cape", dec!(55.00), 100, 1).await;

    let pending = app.place_order(&buyer, product.id, 1).await;
    let in_production = app.place_order(&buyer, product.id, 1).await;
    let delivered = app.place_order(&buyer, product.id, 1).await;
    app.services()
        .lifecycle
        .approve(&manager.caller, in_production.id)
        .await
        .unwrap();
    deliver(&app, &manager, delivered.id).await;
    let analytics = &app.services().analytics;

    assert_eq!(
        analytics.dashboard_stats(&admin.caller).await.unwrap(),
        DashboardStats::Admin {
            total_users: 4,
            total_orders: 3,
            total_products: 1,
            approved_users: 3,
            pending_approvals: 1,
        }
    );
    assert_eq!(
        analytics.dashboard_stats(&manager.caller).await.unwrap(),
        DashboardStats::Manager {
            my_products: 1,
            pending_orders: 1,
            completed_orders: 1,
            active_orders: 1,
        }
    );
    assert_eq!(
        analytics.dashboard_stats(&buyer.caller).await.unwrap(),
        DashboardStats::Buyer {
            my_orders: 3,
            pending_orders: 1,
            completed_orders: 1,
        }
    );

    let activity = analytics.recent_activity(&buyer.caller, Some(2)).await.unwrap();
    assert_eq!(activity.len(), 2);
    assert!(activity.iter().all(|a| a.order_id != pending.id));
}

#[tokio::test]
async fn inverted_range_is_a_validation_error() {
    let now = Utc::now();
    let err = DateRange::resolve(Some(now), Some(now - Duration::hours(1))).unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}
