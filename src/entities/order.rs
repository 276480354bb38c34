use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A buyer's order for a single catalog product.
///
/// `product_title` and `unit_price` are copied from the catalog when the order
/// is placed and are never re-joined afterwards. `total_price` is computed
/// once at creation.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub buyer_id: Uuid,
    pub product_id: Uuid,
    pub product_title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact_number: String,
    #[sea_orm(column_type = "Text")]
    pub delivery_address: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub additional_notes: Option<String>,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::BuyerId",
        to = "super::user::Column::Id"
    )]
    Buyer,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(has_one = "super::tracking_ledger::Entity")]
    TrackingLedger,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Buyer.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::tracking_ledger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrackingLedger.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn customer_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Lifecycle status shared by orders and tracking checkpoints.
///
/// Stored and serialized in PascalCase; the spaced labels used in customer
/// facing text ("Quality Check", "In Delivery") are accepted on input and are
/// what `Display` renders.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum OrderStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Approved")]
    Approved,
    #[sea_orm(string_value = "Rejected")]
    Rejected,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
    #[sea_orm(string_value = "Cutting")]
    Cutting,
    #[sea_orm(string_value = "Sewing")]
    Sewing,
    #[sea_orm(string_value = "QualityCheck")]
    #[serde(alias = "Quality Check")]
    #[strum(to_string = "Quality Check")]
    QualityCheck,
    #[sea_orm(string_value = "Shipped")]
    Shipped,
    #[sea_orm(string_value = "InDelivery")]
    #[serde(alias = "In Delivery")]
    #[strum(to_string = "In Delivery")]
    InDelivery,
    #[sea_orm(string_value = "Delivered")]
    Delivered,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(30))")]
pub enum PaymentMethod {
    #[default]
    #[sea_orm(string_value = "Cash on Delivery")]
    #[serde(rename = "Cash on Delivery")]
    #[strum(to_string = "Cash on Delivery")]
    CashOnDelivery,
    #[sea_orm(string_value = "Online Payment")]
    #[serde(rename = "Online Payment")]
    #[strum(to_string = "Online Payment")]
    OnlinePayment,
    #[sea_orm(string_value = "Bank Transfer")]
    #[serde(rename = "Bank Transfer")]
    #[strum(to_string = "Bank Transfer")]
    BankTransfer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accepts_human_labels() {
        let parsed: OrderStatus = serde_json::from_str("\"Quality Check\"").unwrap();
        assert_eq!(parsed, OrderStatus::QualityCheck);
        let parsed: OrderStatus = serde_json::from_str("\"InDelivery\"").unwrap();
        assert_eq!(parsed, OrderStatus::InDelivery);
        assert_eq!(
            serde_json::to_string(&OrderStatus::InDelivery).unwrap(),
            "\"InDelivery\""
        );
    }

    #[test]
    fn status_display_uses_labels() {
        assert_eq!(OrderStatus::QualityCheck.to_string(), "Quality Check");
        assert_eq!(OrderStatus::Pending.to_string(), "Pending");
    }

    #[test]
    fn payment_method_round_trips_label() {
        let method: PaymentMethod = serde_json::from_str("\"Bank Transfer\"").unwrap();
        assert_eq!(method, PaymentMethod::BankTransfer);
        assert_eq!(PaymentMethod::default(), PaymentMethod::CashOnDelivery);
    }
}
