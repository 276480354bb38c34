use super::order::OrderStatus;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only ledger entry. The auto-increment `id` is the append sequence.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tracking_checkpoints")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub ledger_id: Uuid,
    pub status: OrderStatus,
    pub location: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub image: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tracking_ledger::Entity",
        from = "Column::LedgerId",
        to = "super::tracking_ledger::Column::Id"
    )]
    Ledger,
}

impl Related<super::tracking_ledger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ledger.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
