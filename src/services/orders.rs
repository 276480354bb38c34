use crate::{
    auth::Caller,
    db::DbPool,
    entities::{
        order::{self, Entity as Order, Model as OrderModel},
        OrderStatus, PaymentMethod, UserRole,
    },
    errors::ServiceError,
    events::{publish, Event, EventSender},
    services::{
        catalog::Catalog,
        tracking::{append_checkpoint, NewCheckpoint},
    },
};
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Order placement request from a buyer.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PlaceOrderRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Valid quantity is required"))]
    pub quantity: i32,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Contact number is required"))]
    pub contact_number: String,
    #[validate(length(min = 1, message = "Delivery address is required"))]
    pub delivery_address: String,
    pub additional_notes: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

impl PlaceOrderRequest {
    fn normalized(mut self) -> Self {
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.contact_number = self.contact_number.trim().to_string();
        self.delivery_address = self.delivery_address.trim().to_string();
        self.additional_notes = self
            .additional_notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub buyer_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub skip: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { skip: 0, limit: 10 }
    }
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub items: Vec<OrderModel>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

/// `round(unit_price * quantity, 2)`, halves rounded away from zero.
pub fn order_total(unit_price: Decimal, quantity: i32) -> Decimal {
    (unit_price * Decimal::from(quantity))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Generates `ORD-<unix-millis>-<6 uppercase hex>`.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..0x100_0000);
    format!("ORD-{}-{:06X}", now.timestamp_millis(), suffix)
}

fn stamp_column(status: OrderStatus) -> Option<order::Column> {
    match status {
        OrderStatus::Approved => Some(order::Column::ApprovedAt),
        OrderStatus::Rejected => Some(order::Column::RejectedAt),
        OrderStatus::Cancelled => Some(order::Column::CancelledAt),
        _ => None,
    }
}

/// Moves order `id` from `expected` to `new` if it is still in `expected`.
///
/// No legality check is made. Bumps `version` and `updated_at`, and stamps
/// the decision column for Approved, Rejected and Cancelled. Returns whether
/// the row was updated.
pub async fn update_status<C>(
    conn: &C,
    id: Uuid,
    expected: OrderStatus,
    new: OrderStatus,
    at: DateTime<Utc>,
) -> Result<bool, ServiceError>
where
    C: ConnectionTrait,
{
    let mut update = Order::update_many()
        .col_expr(order::Column::Status, Expr::value(new))
        .col_expr(order::Column::UpdatedAt, Expr::value(at))
        .col_expr(
            order::Column::Version,
            Expr::col(order::Column::Version).add(1),
        );
    if let Some(column) = stamp_column(new) {
        update = update.col_expr(column, Expr::value(at));
    }

    let result = update
        .filter(order::Column::Id.eq(id))
        .filter(order::Column::Status.eq(expected))
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Durable order records.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    catalog: Arc<dyn Catalog>,
    event_sender: Option<EventSender>,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        catalog: Arc<dyn Catalog>,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db_pool,
            catalog,
            event_sender,
        }
    }

    /// Places an order and seeds its ledger with a Pending checkpoint.
    ///
    /// Quantity is checked once against the catalog's minimum order quantity
    /// and available stock; stock is not reserved.
    #[instrument(skip(self, request), fields(caller_id = %caller.id, product_id = %request.product_id))]
    pub async fn create(
        &self,
        caller: &Caller,
        request: PlaceOrderRequest,
    ) -> Result<OrderModel, ServiceError> {
        caller.ensure_active()?;
        if caller.role != UserRole::Buyer {
            return Err(ServiceError::Forbidden(
                "Only buyers can place orders".to_string(),
            ));
        }

        let request = request.normalized();
        request.validate()?;

        let product = self.catalog.snapshot(request.product_id).await?;
        if request.quantity < product.minimum_order_quantity {
            return Err(ServiceError::ValidationError(format!(
                "Minimum order quantity is {}",
                product.minimum_order_quantity
            )));
        }
        if request.quantity > product.available_quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} items available",
                product.available_quantity
            )));
        }

        let buyer_email = match caller.email.clone() {
            Some(email) => email,
            None => crate::entities::User::find_by_id(caller.id)
                .one(&*self.db_pool)
                .await?
                .map(|u| u.email)
                .ok_or_else(|| ServiceError::Unauthorized("Unknown buyer account".to_string()))?,
        };

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let total_price = order_total(product.price, request.quantity);

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number(now)),
            buyer_id: Set(caller.id),
            product_id: Set(product.product_id),
            product_title: Set(product.title.clone()),
            quantity: Set(request.quantity),
            unit_price: Set(product.price),
            total_price: Set(total_price),
            first_name: Set(request.first_name),
            last_name: Set(request.last_name),
            email: Set(buyer_email),
            contact_number: Set(request.contact_number),
            delivery_address: Set(request.delivery_address),
            additional_notes: Set(request.additional_notes),
            status: Set(OrderStatus::Pending),
            payment_method: Set(request.payment_method),
            payment_status: Set("Pending".to_string()),
            approved_at: Set(None),
            rejected_at: Set(None),
            cancelled_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            version: Set(1),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to create order in database");
            ServiceError::DatabaseError(e)
        })?;

        append_checkpoint(
            &txn,
            order.id,
            NewCheckpoint::new(OrderStatus::Pending).with_notes("Order placed"),
            now,
        )
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order.id, order_number = %order.order_number, "Order placed");
        metrics::counter!("garmentflow_orders_placed_total", 1);

        publish(
            self.event_sender.as_ref(),
            Event::OrderPlaced {
                order_id: order.id,
                order_number: order.order_number.clone(),
                buyer_email: order.email.clone(),
                customer_name: order.customer_name(),
                product_title: order.product_title.clone(),
                quantity: order.quantity,
                total_price: order.total_price,
            },
        );

        Ok(order)
    }

    pub async fn get(&self, id: Uuid) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
    }

    pub async fn get_by_order_number(&self, order_number: &str) -> Result<OrderModel, ServiceError> {
        Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
    }

    /// Fetches an order the caller is allowed to see.
    pub async fn get_for_caller(&self, caller: &Caller, id: Uuid) -> Result<OrderModel, ServiceError> {
        let order = self.get(id).await?;
        if !caller.can_view(order.buyer_id) {
            return Err(ServiceError::Forbidden(
                "You do not have access to this order".to_string(),
            ));
        }
        Ok(order)
    }

    /// Filtered page of orders, newest first.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: OrderFilter,
        pagination: Pagination,
    ) -> Result<OrderPage, ServiceError> {
        let db = &*self.db_pool;

        let mut query = Order::find();
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(buyer_id) = filter.buyer_id {
            query = query.filter(order::Column::BuyerId.eq(buyer_id));
        }

        let total = query.clone().count(db).await?;
        let items = query
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::OrderNumber)
            .offset(pagination.skip)
            .limit(pagination.limit)
            .all(db)
            .await?;

        Ok(OrderPage {
            items,
            total,
            skip: pagination.skip,
            limit: pagination.limit,
        })
    }

    /// Every order placed by `buyer_id`, newest first.
    pub async fn list_for_buyer(&self, buyer_id: Uuid) -> Result<Vec<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::BuyerId.eq(buyer_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }
}
