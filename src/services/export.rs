use crate::{
    auth::Caller,
    db::DbPool,
    entities::{
        order::{self, Entity as Order},
        product::{self, Entity as Product},
        user::{self, Entity as User},
        ProductCategory,
    },
    errors::ServiceError,
    services::orders::OrderFilter,
};
use chrono::{DateTime, Utc};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub const ORDERS_CSV_HEADER: &str = "Order ID,Customer,Email,Product,Quantity,Unit Price,Total,Status,Date";
pub const DATA_CONTROLLER: &str = "GarmentFlow";
const MISSING: &str = "N/A";

/// Product creator as it appears in exports.
#[derive(Debug, Clone, Serialize)]
pub struct Creator {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// One product in the JSON export, with its creator inlined.
#[derive(Debug, Clone, Serialize)]
pub struct ProductExport {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: ProductCategory,
    pub price: Decimal,
    pub available_quantity: i32,
    pub minimum_order_quantity: i32,
    pub images: serde_json::Value,
    pub demo_video_link: Option<String>,
    pub payment_options: serde_json::Value,
    pub show_on_home: bool,
    pub created_by: Creator,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductExport {
    fn new(product: product::Model, creator: Option<user::Model>) -> Self {
        let created_by = match creator {
            Some(user) => Creator {
                id: user.id,
                name: user.name,
                email: user.email,
            },
            None => Creator {
                id: product.created_by,
                name: MISSING.to_string(),
                email: MISSING.to_string(),
            },
        };
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            category: product.category,
            price: product.price,
            available_quantity: product.available_quantity,
            minimum_order_quantity: product.minimum_order_quantity,
            images: product.images,
            demo_video_link: product.demo_video_link,
            payment_options: product.payment_options,
            show_on_home: product.show_on_home,
            created_by,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

/// Everything held about one user.
#[derive(Debug, Clone, Serialize)]
pub struct UserDataExport {
    pub user: user::Model,
    pub orders: Vec<order::Model>,
    pub reviews: Vec<serde_json::Value>,
    pub export_date: DateTime<Utc>,
    pub data_controller: String,
}

/// Renders orders, each with its buyer if the account still exists, as CSV.
///
/// Every data cell is quoted; the header is not.
pub fn render_orders_csv(rows: &[(order::Model, Option<user::Model>)]) -> Result<String, ServiceError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for (order, buyer) in rows {
        writer.write_record([
            order.order_number.clone(),
            buyer.as_ref().map_or_else(|| MISSING.to_string(), |b| b.name.clone()),
            buyer.as_ref().map_or_else(|| MISSING.to_string(), |b| b.email.clone()),
            order.product_title.clone(),
            order.quantity.to_string(),
            format!("{:.2}", order.unit_price),
            format!("{:.2}", order.total_price),
            order.status.to_string(),
            order.created_at.format("%Y-%m-%d").to_string(),
        ])?;
    }

    let body = writer
        .into_inner()
        .map_err(|e| ServiceError::InternalError(format!("CSV buffer flush failed: {}", e)))?;
    let body = String::from_utf8(body)
        .map_err(|e| ServiceError::InternalError(format!("CSV output was not UTF-8: {}", e)))?;

    Ok(format!("{}\n{}", ORDERS_CSV_HEADER, body))
}

/// Read-only exports. Nothing here writes to the store.
#[derive(Clone)]
pub struct ExportService {
    db_pool: Arc<DbPool>,
}

impl ExportService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self), fields(caller_id = %caller.id))]
    pub async fn orders_csv(&self, caller: &Caller, filter: OrderFilter) -> Result<String, ServiceError> {
        caller.require_staff()?;

        let mut query = Order::find()
            .find_also_related(User)
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::OrderNumber);
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(buyer_id) = filter.buyer_id {
            query = query.filter(order::Column::BuyerId.eq(buyer_id));
        }

        let rows = query.all(&*self.db_pool).await?;
        info!(rows = rows.len(), "Exporting orders as CSV");
        render_orders_csv(&rows)
    }

    pub async fn products_json(&self, caller: &Caller) -> Result<String, ServiceError> {
        caller.require_staff()?;

        let rows = Product::find()
            .find_also_related(User)
            .order_by_desc(product::Column::CreatedAt)
            .order_by_asc(product::Column::Name)
            .all(&*self.db_pool)
            .await?;

        let products: Vec<ProductExport> = rows
            .into_iter()
            .map(|(product, creator)| ProductExport::new(product, creator))
            .collect();

        Ok(serde_json::to_string_pretty(&products)?)
    }

    /// Compliance export of a user's account and orders. Users may export
    /// themselves; admins may export anyone.
    #[instrument(skip(self), fields(caller_id = %caller.id))]
    pub async fn user_data(&self, caller: &Caller, user_id: Uuid) -> Result<UserDataExport, ServiceError> {
        if caller.id != user_id && !caller.is_admin() {
            return Err(ServiceError::Forbidden(
                "You can only export your own data".to_string(),
            ));
        }

        let user = User::find_by_id(user_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let orders = Order::find()
            .filter(order::Column::BuyerId.eq(user_id))
            .order_by_asc(order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;

        Ok(UserDataExport {
            user,
            orders,
            reviews: Vec::new(),
            export_date: Utc::now(),
            data_controller: DATA_CONTROLLER.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AccountStatus, OrderStatus, PaymentMethod, UserRole};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample_order(buyer_id: Uuid) -> order::Model {
        let created = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap();
        order::Model {
            id: Uuid::new_v4(),
            order_number: "ORD-1741944600000-00A1B2".into(),
            buyer_id,
            product_id: Uuid::new_v4(),
            product_title: "Linen Shirt, Slim".into(),
            quantity: 12,
            unit_price: dec!(12.5),
            total_price: dec!(150),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            contact_number: "555-0101".into(),
            delivery_address: "12 St James's Square".into(),
            additional_notes: None,
            status: OrderStatus::QualityCheck,
            payment_method: PaymentMethod::BankTransfer,
            payment_status: "Pending".into(),
            approved_at: None,
            rejected_at: None,
            cancelled_at: None,
            created_at: created,
            updated_at: created,
            version: 4,
        }
    }

    fn sample_user(id: Uuid) -> user::Model {
        let now = Utc::now();
        user::Model {
            id,
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            role: UserRole::Buyer,
            status: AccountStatus::Approved,
            suspend_reason: None,
            suspend_feedback: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn csv_quotes_every_cell() {
        let buyer_id = Uuid::new_v4();
        let rows = vec![(sample_order(buyer_id), Some(sample_user(buyer_id)))];
        let csv = render_orders_csv(&rows).unwrap();

        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(ORDERS_CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some(
                "\"ORD-1741944600000-00A1B2\",\"Ada Lovelace\",\"ada@example.com\",\"Linen Shirt, Slim\",\"12\",\"12.50\",\"150.00\",\"Quality Check\",\"2025-03-14\""
            )
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn csv_marks_missing_buyer() {
        let rows = vec![(sample_order(Uuid::new_v4()), None)];
        let csv = render_orders_csv(&rows).unwrap();
        assert!(csv.contains("\"N/A\",\"N/A\""));
    }

    #[test]
    fn empty_export_is_header_only() {
        let csv = render_orders_csv(&[]).unwrap();
        assert_eq!(csv, format!("{}\n", ORDERS_CSV_HEADER));
    }
}
