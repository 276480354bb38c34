use crate::{
    auth::Caller,
    db::DbPool,
    entities::{
        order::{self, Entity as Order},
        product::{self, Entity as Product},
        user::{self, Entity as User},
        AccountStatus, OrderStatus, UserRole,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    sea_query::Expr, ColumnTrait, EntityTrait, Order as SortOrder, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_POPULAR_LIMIT: u64 = 5;
pub const DEFAULT_ACTIVITY_LIMIT: u64 = 10;
const DEFAULT_RANGE_DAYS: i64 = 30;

/// Inclusive creation-time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Missing bounds default to the last thirty days ending now.
    pub fn resolve(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<Self, ServiceError> {
        let end = end.unwrap_or_else(Utc::now);
        let start = start.unwrap_or(end - Duration::days(DEFAULT_RANGE_DAYS));
        if start > end {
            return Err(ServiceError::ValidationError(
                "Start date must not be after end date".to_string(),
            ));
        }
        Ok(Self { start, end })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RevenueStats {
    pub total_revenue: Decimal,
    pub total_orders: u64,
    pub average_order_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PopularProduct {
    pub product_id: Uuid,
    pub product_title: String,
    pub order_count: u64,
    pub total_quantity: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ManagerPerformance {
    pub manager_id: Uuid,
    pub total_products: u64,
    pub total_orders: u64,
    pub delivered_orders: u64,
    /// Percentage with two decimals, e.g. `"66.67"`.
    pub delivery_rate: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReportSummary {
    pub total_orders: u64,
    pub total_revenue: Decimal,
    pub average_order_value: Decimal,
    pub delivered_orders: u64,
    pub pending_orders: u64,
    pub delivery_rate: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnalyticsReport {
    pub period: DateRange,
    pub summary: ReportSummary,
    pub orders_by_status: Vec<StatusCount>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum DashboardStats {
    Admin {
        total_users: u64,
        total_orders: u64,
        total_products: u64,
        approved_users: u64,
        pending_approvals: u64,
    },
    Manager {
        my_products: u64,
        pending_orders: u64,
        completed_orders: u64,
        active_orders: u64,
    },
    Buyer {
        my_orders: u64,
        pending_orders: u64,
        completed_orders: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ActivityItem {
    pub order_id: Uuid,
    pub order_number: String,
    pub product_title: String,
    pub status: OrderStatus,
    pub quantity: i32,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<order::Model> for ActivityItem {
    fn from(order: order::Model) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number,
            product_title: order.product_title,
            status: order.status,
            quantity: order.quantity,
            total_price: order.total_price,
            created_at: order.created_at,
        }
    }
}

/// Orders between approval and delivery.
const IN_PRODUCTION: [OrderStatus; 6] = [
    OrderStatus::Approved,
    OrderStatus::Cutting,
    OrderStatus::Sewing,
    OrderStatus::QualityCheck,
    OrderStatus::Shipped,
    OrderStatus::InDelivery,
];

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn average(total: Decimal, count: u64) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        money(total / Decimal::from(count))
    }
}

/// `part / whole` as a percentage with two decimals; `"0.00"` when `whole` is 0.
pub fn percentage(part: u64, whole: u64) -> String {
    if whole == 0 {
        return "0.00".to_string();
    }
    let rate = money(Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(whole));
    format!("{:.2}", rate)
}

/// Read-only aggregations over orders, products and users. Nothing is cached.
#[derive(Clone)]
pub struct AnalyticsService {
    db_pool: Arc<DbPool>,
}

impl AnalyticsService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    fn created_within(range: DateRange) -> Select<Order> {
        Order::find().filter(order::Column::CreatedAt.between(range.start, range.end))
    }

    async fn totals(&self, query: Select<Order>) -> Result<Vec<Decimal>, ServiceError> {
        Ok(query
            .select_only()
            .column(order::Column::TotalPrice)
            .into_tuple::<Decimal>()
            .all(&*self.db_pool)
            .await?)
    }

    /// Revenue from Delivered orders created within `range`.
    #[instrument(skip(self))]
    pub async fn revenue_stats(&self, range: DateRange) -> Result<RevenueStats, ServiceError> {
        let totals = self
            .totals(
                Self::created_within(range)
                    .filter(order::Column::Status.eq(OrderStatus::Delivered)),
            )
            .await?;

        let total_orders = totals.len() as u64;
        let total_revenue: Decimal = totals.into_iter().sum();

        Ok(RevenueStats {
            total_revenue: money(total_revenue),
            total_orders,
            average_order_value: average(total_revenue, total_orders),
        })
    }

    /// Order count per observed status.
    pub async fn order_status_histogram(&self) -> Result<Vec<StatusCount>, ServiceError> {
        self.histogram(Order::find()).await
    }

    async fn histogram(&self, query: Select<Order>) -> Result<Vec<StatusCount>, ServiceError> {
        let rows: Vec<(OrderStatus, i64)> = query
            .select_only()
            .column(order::Column::Status)
            .column_as(Expr::col(order::Column::Id).count(), "count")
            .group_by(order::Column::Status)
            .into_tuple()
            .all(&*self.db_pool)
            .await?;

        let mut counts: Vec<StatusCount> = rows
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect();
        counts.sort_by_key(|c| c.status);
        Ok(counts)
    }

    /// Top `limit` products by order count. Ties go to higher revenue, then
    /// the product id.
    #[instrument(skip(self))]
    pub async fn popular_products(&self, limit: Option<u64>) -> Result<Vec<PopularProduct>, ServiceError> {
        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_POPULAR_LIMIT);

        let order_count = Expr::col(order::Column::Id).count();
        let revenue = Expr::col(order::Column::TotalPrice).sum();

        let rows: Vec<(Uuid, String, i64, i64, Decimal)> = Order::find()
            .select_only()
            .column(order::Column::ProductId)
            .column_as(Expr::col(order::Column::ProductTitle).max(), "product_title")
            .column_as(order_count.clone(), "order_count")
            .column_as(Expr::col(order::Column::Quantity).sum(), "total_quantity")
            .column_as(revenue.clone(), "revenue")
            .group_by(order::Column::ProductId)
            .order_by(order_count, SortOrder::Desc)
            .order_by(revenue, SortOrder::Desc)
            .order_by_asc(order::Column::ProductId)
            .limit(limit)
            .into_tuple()
            .all(&*self.db_pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(product_id, product_title, order_count, total_quantity, revenue)| PopularProduct {
                    product_id,
                    product_title,
                    order_count: order_count as u64,
                    total_quantity,
                    revenue: money(revenue),
                },
            )
            .collect())
    }

    /// Delivery figures for orders placed against products the manager created.
    #[instrument(skip(self))]
    pub async fn manager_performance(&self, manager_id: Uuid) -> Result<ManagerPerformance, ServiceError> {
        let db = &*self.db_pool;

        let product_ids: Vec<Uuid> = Product::find()
            .select_only()
            .column(product::Column::Id)
            .filter(product::Column::CreatedBy.eq(manager_id))
            .into_tuple()
            .all(db)
            .await?;

        let (total_orders, delivered_orders) = if product_ids.is_empty() {
            (0, 0)
        } else {
            let against = Order::find().filter(order::Column::ProductId.is_in(product_ids.clone()));
            let total = against.clone().count(db).await?;
            let delivered = against
                .filter(order::Column::Status.eq(OrderStatus::Delivered))
                .count(db)
                .await?;
            (total, delivered)
        };

        Ok(ManagerPerformance {
            manager_id,
            total_products: product_ids.len() as u64,
            total_orders,
            delivered_orders,
            delivery_rate: percentage(delivered_orders, total_orders),
        })
    }

    /// Summary of every order created within `range`, whatever its status.
    #[instrument(skip(self))]
    pub async fn analytics_report(&self, range: DateRange) -> Result<AnalyticsReport, ServiceError> {
        let totals = self.totals(Self::created_within(range)).await?;
        let orders_by_status = self.histogram(Self::created_within(range)).await?;

        let count_of = |status: OrderStatus| -> u64 {
            orders_by_status
                .iter()
                .find(|c| c.status == status)
                .map(|c| c.count as u64)
                .unwrap_or(0)
        };

        let total_orders = totals.len() as u64;
        let total_revenue: Decimal = totals.into_iter().sum();
        let delivered_orders = count_of(OrderStatus::Delivered);
        let pending_orders = count_of(OrderStatus::Pending);

        Ok(AnalyticsReport {
            period: range,
            summary: ReportSummary {
                total_orders,
                total_revenue: money(total_revenue),
                average_order_value: average(total_revenue, total_orders),
                delivered_orders,
                pending_orders,
                delivery_rate: percentage(delivered_orders, total_orders),
            },
            orders_by_status,
            generated_at: Utc::now(),
        })
    }

    /// Counters shaped by the caller's role.
    #[instrument(skip(self), fields(caller_id = %caller.id, role = %caller.role))]
    pub async fn dashboard_stats(&self, caller: &Caller) -> Result<DashboardStats, ServiceError> {
        let db = &*self.db_pool;

        let stats = match caller.role {
            UserRole::Admin => {
                let total_users = User::find().count(db).await?;
                let approved_users = User::find()
                    .filter(user::Column::Status.eq(AccountStatus::Approved))
                    .count(db)
                    .await?;
                DashboardStats::Admin {
                    total_users,
                    total_orders: Order::find().count(db).await?,
                    total_products: Product::find().count(db).await?,
                    approved_users,
                    pending_approvals: total_users.saturating_sub(approved_users),
                }
            }
            UserRole::Manager => DashboardStats::Manager {
                my_products: Product::find()
                    .filter(product::Column::CreatedBy.eq(caller.id))
                    .count(db)
                    .await?,
                pending_orders: Order::find()
                    .filter(order::Column::Status.eq(OrderStatus::Pending))
                    .count(db)
                    .await?,
                completed_orders: Order::find()
                    .filter(order::Column::Status.eq(OrderStatus::Delivered))
                    .count(db)
                    .await?,
                active_orders: Order::find()
                    .filter(order::Column::Status.is_in(IN_PRODUCTION))
                    .count(db)
                    .await?,
            },
            UserRole::Buyer => {
                let mine = Order::find().filter(order::Column::BuyerId.eq(caller.id));
                DashboardStats::Buyer {
                    my_orders: mine.clone().count(db).await?,
                    pending_orders: mine
                        .clone()
                        .filter(order::Column::Status.eq(OrderStatus::Pending))
                        .count(db)
                        .await?,
                    completed_orders: mine
                        .filter(order::Column::Status.eq(OrderStatus::Delivered))
                        .count(db)
                        .await?,
                }
            }
        };
        Ok(stats)
    }

    /// The caller's most recent orders, newest first.
    pub async fn recent_activity(&self, caller: &Caller, limit: Option<u64>) -> Result<Vec<ActivityItem>, ServiceError> {
        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_ACTIVITY_LIMIT);
        let orders = Order::find()
            .filter(order::Column::BuyerId.eq(caller.id))
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::OrderNumber)
            .limit(limit)
            .all(&*self.db_pool)
            .await?;
        Ok(orders.into_iter().map(ActivityItem::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn percentage_formats_two_decimals() {
        assert_eq!(percentage(0, 0), "0.00");
        assert_eq!(percentage(1, 3), "33.33");
        assert_eq!(percentage(2, 3), "66.67");
        assert_eq!(percentage(4, 4), "100.00");
    }

    #[test]
    fn average_of_nothing_is_zero() {
        assert_eq!(average(dec!(0), 0), Decimal::ZERO);
        assert_eq!(average(dec!(100), 3), dec!(33.33));
    }

    #[test]
    fn range_defaults_to_last_thirty_days() {
        let range = DateRange::resolve(None, None).unwrap();
        assert_eq!(range.end - range.start, Duration::days(30));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let now = Utc::now();
        let err = DateRange::resolve(Some(now), Some(now - Duration::days(1))).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }
}
