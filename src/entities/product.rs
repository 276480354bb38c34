use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Catalog product offered by a manager.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub category: ProductCategory,
    pub price: Decimal,
    pub available_quantity: i32,
    pub minimum_order_quantity: i32,
    /// Image references as a JSON array of strings
    #[sea_orm(column_type = "Json")]
    pub images: Json,
    pub demo_video_link: Option<String>,
    /// Accepted payment method labels as a JSON array of strings
    #[sea_orm(column_type = "Json")]
    pub payment_options: Json,
    pub show_on_home: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id"
    )]
    Creator,
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum ProductCategory {
    #[sea_orm(string_value = "Shirt")]
    Shirt,
    #[sea_orm(string_value = "Pant")]
    Pant,
    #[sea_orm(string_value = "Jacket")]
    Jacket,
    #[sea_orm(string_value = "Accessories")]
    Accessories,
    #[sea_orm(string_value = "Dress")]
    Dress,
    #[sea_orm(string_value = "Sweater")]
    Sweater,
}
