#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use garmentflow_api::{
    app_router,
    auth::{AuthConfig, AuthService, Caller},
    config::AppConfig,
    db::{self, DbConfig, DbPool},
    entities::{order, product, user, AccountStatus, ProductCategory, UserRole},
    events::{self, EventSender},
    handlers::AppServices,
    notifications::{Notification, NotificationError, Notifier},
    services::{catalog::NewProduct, orders::PlaceOrderRequest},
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Captures every delivered notification.
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError> {
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// A seeded account with a ready-to-use caller and bearer token.
#[derive(Clone)]
pub struct Account {
    pub user: user::Model,
    pub caller: Caller,
    pub token: String,
}

impl Account {
    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

/// Application state over a fresh SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
    pub events: EventSender,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_database(DbConfig::in_memory_sqlite()).await
    }

    /// SQLite file under `dir` behind a pool of `max_connections`, so
    /// concurrent calls really run on separate connections.
    pub async fn file_backed(dir: &tempfile::TempDir, max_connections: u32) -> Self {
        let path = dir.path().join("garmentflow-test.db");
        Self::with_database(DbConfig {
            url: format!("sqlite://{}?mode=rwc", path.display()),
            max_connections,
            min_connections: 1,
            ..Default::default()
        })
        .await
    }

    pub async fn with_database(db_config: DbConfig) -> Self {
        let mut cfg = AppConfig::new(
            db_config.url.clone(),
            TEST_JWT_SECRET.to_string(),
            "test".to_string(),
        );
        cfg.db_max_connections = db_config.max_connections;
        cfg.db_min_connections = db_config.min_connections;

        let pool = db::establish_connection_with_config(&db_config)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let notifier = Arc::new(RecordingNotifier::default());
        let (event_sender, event_rx) = EventSender::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx, notifier.clone()));

        let auth = Arc::new(AuthService::new(AuthConfig::from(&cfg)));
        let services = AppServices::new(db_arc.clone(), Some(event_sender.clone()));

        let state = AppState {
            db: db_arc,
            config: cfg,
            auth,
            services,
        };

        Self {
            router: app_router(state.clone()),
            state,
            notifier,
            events: event_sender,
            _event_task: event_task,
        }
    }

    pub fn db(&self) -> &DbPool {
        &self.state.db
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    /// Inserts an account directly, bypassing registration.
    pub async fn seed_user(&self, role: UserRole, status: AccountStatus) -> Account {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let user = user::ActiveModel {
            id: Set(id),
            name: Set(format!("{} {}", role, &id.to_string()[..8])),
            email: Set(format!("{}-{}@example.com", role, id.simple())),
            role: Set(role),
            status: Set(status),
            suspend_reason: Set(None),
            suspend_feedback: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await
        .expect("seed user");

        let token = self.state.auth.issue_token(&user).expect("issue token");
        Account {
            caller: Caller::from(&user),
            user,
            token,
        }
    }

    pub async fn admin(&self) -> Account {
        self.seed_user(UserRole::Admin, AccountStatus::Approved).await
    }

    pub async fn manager(&self) -> Account {
        self.seed_user(UserRole::Manager, AccountStatus::Approved).await
    }

    pub async fn buyer(&self) -> Account {
        self.seed_user(UserRole::Buyer, AccountStatus::Approved).await
    }

    pub async fn seed_product(
        &self,
        creator: &Account,
        name: &str,
        price: Decimal,
        available_quantity: i32,
        minimum_order_quantity: i32,
    ) -> product::Model {
        self.services()
            .catalog
            .create_product(
                &creator.caller,
                NewProduct {
                    name: name.to_string(),
                    description: format!("{} for integration tests", name),
                    category: ProductCategory::Shirt,
                    price,
                    available_quantity,
                    minimum_order_quantity,
                    images: vec![],
                    demo_video_link: None,
                    payment_options: vec![],
                    show_on_home: false,
                },
            )
            .await
            .expect("seed product")
    }

    pub fn order_request(product_id: Uuid, quantity: i32) -> PlaceOrderRequest {
        PlaceOrderRequest {
            product_id,
            quantity,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            contact_number: "555-0101".to_string(),
            delivery_address: "12 St James's Square, London".to_string(),
            additional_notes: None,
            payment_method: Default::default(),
        }
    }

    pub async fn place_order(&self, buyer: &Account, product_id: Uuid, quantity: i32) -> order::Model {
        self.services()
            .orders
            .create(&buyer.caller, Self::order_request(product_id, quantity))
            .await
            .expect("place order")
    }

    /// Polls until at least `count` notifications were delivered.
    pub async fn wait_for_notifications(&self, count: usize) -> Vec<Notification> {
        for _ in 0..100 {
            let delivered = self.notifier.delivered();
            if delivered.len() >= count {
                return delivered;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.notifier.delivered()
    }

    /// Sends a request through the full router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_text(response: Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn response_json(response: Response) -> Value {
    let text = response_text(response).await;
    serde_json::from_str(&text).expect("json response")
}
