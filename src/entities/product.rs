use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Sellable product
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "products")]
#[schema(as = Product)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub sku: String,
    pub category: String,
    pub description: Option<String>,
    /// Selling unit (piece, kg, dozen, ...)
    pub unit: String,
    pub price: Decimal,
    pub cost: Decimal,
    pub is_active: bool,
    /// Path under the uploads mount, e.g. `products/ab12.png`
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_many = "super::production_item::Entity")]
    ProductionItem,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::production_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductionItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Gross margin per unit
    pub fn margin(&self) -> Decimal {
        self.price - self.cost
    }
}
