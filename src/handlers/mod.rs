pub mod analytics;
pub mod common;
pub mod dashboard;
pub mod exports;
pub mod orders;
pub mod products;
pub mod tracking;
pub mod users;

use crate::{
    db::DbPool,
    events::EventSender,
    services::{
        accounts::AccountService, analytics::AnalyticsService, catalog::CatalogService,
        export::ExportService, lifecycle::LifecycleService, orders::OrderService,
        tracking::TrackingService,
    },
};
use std::sync::Arc;

pub use crate::AppState;

/// Services layer used by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub orders: Arc<OrderService>,
    pub lifecycle: Arc<LifecycleService>,
    pub tracking: Arc<TrackingService>,
    pub analytics: Arc<AnalyticsService>,
    pub exports: Arc<ExportService>,
    pub accounts: Arc<AccountService>,
}

impl AppServices {
    /// Wires every service over one pool. With no sender, events are dropped.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<EventSender>) -> Self {
        let catalog = Arc::new(CatalogService::new(db_pool.clone()));
        let orders = Arc::new(OrderService::new(
            db_pool.clone(),
            catalog.clone(),
            event_sender.clone(),
        ));

        Self {
            catalog,
            orders,
            lifecycle: Arc::new(LifecycleService::new(db_pool.clone(), event_sender.clone())),
            tracking: Arc::new(TrackingService::new(db_pool.clone())),
            analytics: Arc::new(AnalyticsService::new(db_pool.clone())),
            exports: Arc::new(ExportService::new(db_pool.clone())),
            accounts: Arc::new(AccountService::new(db_pool, event_sender)),
        }
    }
}
